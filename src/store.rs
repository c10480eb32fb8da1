//! Registry of the slots and synchronizers a session owns.

use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::GroupId;
use crate::error::StereoSyncError;
use crate::frame::{DataSource, FrameHeader, SourceMask};
use crate::pipeline::PairedSynchronizer;
use crate::slot::{FrameUpdate, SingleSourceSlot};

/// What one source-group's callback writes into.
#[derive(Clone)]
pub(crate) enum FrameTarget {
    Single(Arc<SingleSourceSlot>),
    Pair(Arc<PairedSynchronizer>),
}

impl FrameTarget {
    pub fn group(&self) -> &GroupId {
        match self {
            Self::Single(slot) => slot.group(),
            Self::Pair(sync) => sync.group(),
        }
    }

    /// Sources the group's callback is registered for.
    pub fn accepted_sources(&self) -> SourceMask {
        match self {
            Self::Single(slot) => slot.source().into(),
            Self::Pair(sync) => sync.accepted_sources(),
        }
    }

    pub fn on_frame(&self, header: FrameHeader) -> Result<FrameUpdate, StereoSyncError> {
        match self {
            Self::Single(slot) => slot.update(header),
            Self::Pair(sync) => sync.on_frame(header),
        }
    }

    pub fn release_all(&self) -> (usize, Option<StereoSyncError>) {
        match self {
            Self::Single(slot) => slot.release_all(),
            Self::Pair(sync) => sync.release_all(),
        }
    }
}

/// Every target of a session, indexed by group and by source.
///
/// Built once at start and never modified afterwards, so lookups need no lock.
pub(crate) struct FrameStore {
    targets: Vec<FrameTarget>,
    by_group: HashMap<GroupId, usize>,
    by_source: HashMap<DataSource, usize>,
}

impl FrameStore {
    pub fn new(targets: Vec<FrameTarget>) -> Self {
        let mut by_group = HashMap::new();
        let mut by_source = HashMap::new();
        for (index, target) in targets.iter().enumerate() {
            by_group.insert(target.group().clone(), index);
            let sources = match target {
                FrameTarget::Single(slot) => SourceMask::from(slot.source()),
                FrameTarget::Pair(sync) => {
                    let [first, second] = sync.sources();
                    first | second
                }
            };
            for source in sources.iter() {
                by_source.insert(source, index);
            }
        }

        Self {
            targets,
            by_group,
            by_source,
        }
    }

    pub fn targets(&self) -> &[FrameTarget] {
        &self.targets
    }

    pub fn group(&self, group: &str) -> Option<&FrameTarget> {
        self.by_group.get(group).map(|&index| &self.targets[index])
    }

    /// The target a source was registered in, including the unused partner of
    /// an unpaired group.
    pub fn source(&self, source: DataSource) -> Option<&FrameTarget> {
        self.by_source.get(&source).map(|&index| &self.targets[index])
    }

    /// Closes and releases every target.
    ///
    /// Keeps going past failures; returns the number of buffers released and
    /// the first error met.
    pub fn release_all(&self) -> (usize, Option<StereoSyncError>) {
        let mut released = 0;
        let mut first_error = None;
        for target in &self.targets {
            let (count, error) = target.release_all();
            released += count;
            if let Some(error) = error {
                tracing::error!(group = %target.group(), %error, "buffer release failed");
                first_error.get_or_insert(error);
            }
        }
        (released, first_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CallbackBufferPool, MockChannel};
    use crate::config::SyncConfig;

    fn store(channel: &Arc<MockChannel>) -> FrameStore {
        let pool: Arc<dyn CallbackBufferPool> = channel.clone();
        FrameStore::new(vec![
            FrameTarget::Pair(Arc::new(PairedSynchronizer::new(
                "left",
                DataSource::LumaLeft,
                DataSource::ChromaLeft,
                pool.clone(),
                &SyncConfig::default(),
            ))),
            FrameTarget::Single(Arc::new(SingleSourceSlot::new(
                "disparity",
                DataSource::Disparity,
                pool,
            ))),
        ])
    }

    #[test]
    fn test_lookup_by_group_and_source() {
        let channel = Arc::new(MockChannel::new());
        let store = store(&channel);

        assert_eq!(store.group("left").unwrap().group().as_str(), "left");
        assert!(store.group("right").is_none());
        assert_eq!(
            store.source(DataSource::ChromaLeft).unwrap().group().as_str(),
            "left"
        );
        assert_eq!(
            store.source(DataSource::Disparity).unwrap().group().as_str(),
            "disparity"
        );
        assert!(store.source(DataSource::LumaRight).is_none());
    }

    #[test]
    fn test_release_all_counts_every_target() {
        let channel = Arc::new(MockChannel::new());
        let store = store(&channel);

        let left = store.group("left").unwrap();
        left.on_frame(MockChannel::synthetic_frame(DataSource::LumaLeft, 1, 4, 4))
            .unwrap();
        let disparity = store.group("disparity").unwrap();
        disparity
            .on_frame(MockChannel::synthetic_frame(DataSource::Disparity, 1, 4, 4))
            .unwrap();

        let (released, error) = store.release_all();
        assert_eq!(released, 2);
        assert!(error.is_none());
        assert_eq!(channel.pool_stats().held, 0);
    }

    #[test]
    fn test_release_all_continues_past_failure() {
        let channel = Arc::new(MockChannel::new());
        let store = store(&channel);

        store
            .group("left")
            .unwrap()
            .on_frame(MockChannel::synthetic_frame(DataSource::LumaLeft, 1, 4, 4))
            .unwrap();
        store
            .group("disparity")
            .unwrap()
            .on_frame(MockChannel::synthetic_frame(DataSource::Disparity, 1, 4, 4))
            .unwrap();

        channel.fail_next_release();
        let (released, error) = store.release_all();

        assert_eq!(released, 1);
        assert!(matches!(error, Some(StereoSyncError::Pool(_))));
    }

    #[test]
    fn test_release_all_counts_within_failing_group() {
        let channel = Arc::new(MockChannel::new());
        let store = store(&channel);

        let left = store.group("left").unwrap();
        for header in [
            MockChannel::synthetic_frame(DataSource::LumaLeft, 1, 4, 4),
            MockChannel::synthetic_frame(DataSource::ChromaLeft, 1, 4, 4),
            MockChannel::synthetic_frame(DataSource::LumaLeft, 2, 4, 4),
        ] {
            left.on_frame(header).unwrap();
        }

        // The pair group fails on its first release but still returns the
        // other two buffers.
        channel.fail_next_release();
        let (released, error) = store.release_all();

        assert_eq!(released, 2);
        assert!(error.is_some());
        assert_eq!(channel.pool_stats().held, 1);
    }
}
