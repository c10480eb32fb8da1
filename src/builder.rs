//! Builder pattern for `StereoSync`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::channel::{CallbackBufferPool, FrameChannel, GroupId};
use crate::frame::{DataSource, SourceMask};
use crate::pipeline::{CallbackAdapter, PairedSynchronizer};
use crate::session::{Session, SessionState};
use crate::slot::SingleSourceSlot;
use crate::store::{FrameStore, FrameTarget};
use crate::{event_callback, EventCallback, PairingMode, StereoSyncError, SyncConfig, SyncEvent};

/// Main entry point for stereo-sync.
///
/// Use [`StereoSync::builder()`] to configure and start a session.
pub struct StereoSync;

impl StereoSync {
    /// Creates a new builder for configuring a synchronization session.
    pub fn builder() -> StereoSyncBuilder {
        StereoSyncBuilder::new()
    }
}

/// Shape of one registered source-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupLayout {
    Pair {
        first: DataSource,
        second: DataSource,
    },
    Single(DataSource),
}

impl GroupLayout {
    fn sources(self) -> Vec<DataSource> {
        match self {
            Self::Pair { first, second } => vec![first, second],
            Self::Single(source) => vec![source],
        }
    }
}

/// Builder for configuring and starting frame synchronization.
///
/// Use [`StereoSync::builder()`] to create a new builder.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stereo_sync::{DataSource, MockChannel, StereoSync, SyncEvent};
///
/// let channel = Arc::new(MockChannel::new());
///
/// let session = StereoSync::builder()
///     .add_pair("left", DataSource::LumaLeft, DataSource::ChromaLeft)
///     .add_single("disparity", DataSource::Disparity)
///     .on_event(|e| {
///         if let SyncEvent::FrameDiscarded { group, frame_id, .. } = e {
///             eprintln!("{group}: frame {frame_id} never matched");
///         }
///     })
///     .start(channel.clone())
///     .unwrap();
///
/// assert_eq!(channel.callback_count(), 2);
/// # session.stop().unwrap();
/// ```
///
/// [`StereoSync::builder()`]: crate::StereoSync::builder
#[must_use]
pub struct StereoSyncBuilder {
    /// Registered groups in registration order.
    groups: Vec<(GroupId, GroupLayout)>,
    /// Event callback.
    event_callback: Option<EventCallback>,
    /// Synchronization configuration.
    config: SyncConfig,
}

impl Default for StereoSyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StereoSyncBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            event_callback: None,
            config: SyncConfig::default(),
        }
    }

    /// Adds a group whose two sources are published only as a matched pair.
    ///
    /// `first` is the primary source. With [`PairingMode::Unpaired`] only
    /// `first` is streamed and `second` is ignored.
    pub fn add_pair(mut self, id: impl Into<GroupId>, first: DataSource, second: DataSource) -> Self {
        self.groups.push((id.into(), GroupLayout::Pair { first, second }));
        self
    }

    /// Adds a standalone source, published on every frame.
    pub fn add_single(mut self, id: impl Into<GroupId>, source: DataSource) -> Self {
        self.groups.push((id.into(), GroupLayout::Single(source)));
        self
    }

    /// Sets the pairing mode for every pair group.
    ///
    /// Default: [`PairingMode::Paired`]. Use the value chosen by
    /// [`configure_sensor`](crate::configure_sensor), which picks `Unpaired`
    /// for monochrome imagers.
    pub fn pairing(mut self, pairing: PairingMode) -> Self {
        self.config.pairing = pairing;
        self
    }

    /// Set custom synchronization configuration.
    ///
    /// Replaces any pairing mode set earlier with [`pairing()`](Self::pairing).
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include discarded frames, configuration warnings and fatal
    /// invariant violations.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(SyncEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Returns the configured group IDs.
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), StereoSyncError> {
        if self.groups.is_empty() {
            return Err(StereoSyncError::NoGroupsConfigured);
        }

        let mut seen_ids = HashSet::new();
        let mut seen_sources = HashSet::new();
        for (id, layout) in &self.groups {
            if !seen_ids.insert(id) {
                return Err(StereoSyncError::DuplicateGroupId { group: id.clone() });
            }
            if let GroupLayout::Pair { first, second } = *layout {
                if first == second {
                    return Err(StereoSyncError::InvalidPair {
                        group: id.clone(),
                        data_source: first,
                    });
                }
            }
            for source in layout.sources() {
                if !seen_sources.insert(source) {
                    return Err(StereoSyncError::DuplicateSource {
                        data_source: source,
                    });
                }
            }
        }

        Ok(())
    }

    fn build_targets(&self, pool: &Arc<dyn CallbackBufferPool>) -> Vec<FrameTarget> {
        self.groups
            .iter()
            .map(|(id, layout)| match *layout {
                GroupLayout::Pair { first, second } => FrameTarget::Pair(Arc::new(
                    PairedSynchronizer::new(id, first, second, Arc::clone(pool), &self.config),
                )),
                GroupLayout::Single(source) => FrameTarget::Single(Arc::new(
                    SingleSourceSlot::new(id, source, Arc::clone(pool)),
                )),
            })
            .collect()
    }

    /// Registers one callback per group with the channel and starts streaming.
    ///
    /// Returns a [`Session`] handle to read frames and shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No groups are configured
    /// - A group ID or source is registered twice
    /// - A pair uses the same source on both sides
    /// - The channel rejects a callback or the stream start
    pub fn start<C>(self, channel: Arc<C>) -> Result<Session, StereoSyncError>
    where
        C: FrameChannel + 'static,
    {
        self.validate()?;

        let pool: Arc<dyn CallbackBufferPool> = channel.clone();
        let state = Arc::new(SessionState::new(self.event_callback.clone()));
        let store = Arc::new(FrameStore::new(self.build_targets(&pool)));

        // Dropping the session on an early return closes every slot, so
        // callbacks registered before the failure never reserve a buffer.
        let session = Session::new(Arc::clone(&state), Arc::clone(&store));

        let mut streams = SourceMask::empty();
        for target in store.targets() {
            let adapter = CallbackAdapter::new(target.clone(), Arc::clone(&state));
            let mask = adapter.mask();
            channel
                .add_isolated_callback(adapter.into_callback(), mask)
                .map_err(StereoSyncError::protocol("add_isolated_callback"))?;
            tracing::info!(group = %target.group(), sources = %mask, "callback registered");
            streams |= mask;
        }

        channel
            .start_streams(streams)
            .map_err(StereoSyncError::protocol("start_streams"))?;
        tracing::info!(sources = %streams, pairing = ?self.config.pairing, "streams started");

        for target in store.targets() {
            state.emit(SyncEvent::GroupStarted {
                group: target.group().clone(),
                sources: target.accepted_sources(),
            });
        }

        Ok(session)
    }
}
