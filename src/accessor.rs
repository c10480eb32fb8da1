//! Consumer-side reads of the published views.

use std::sync::Arc;

use crate::channel::GroupId;
use crate::error::AccessError;
use crate::frame::{DataSource, FrameHeader};
use crate::pipeline::MatchedPair;
use crate::store::{FrameStore, FrameTarget};

/// Reads the latest published frames from any thread.
///
/// Every read copies headers out under the owning target's lock and returns
/// immediately; pixel data is shared, never copied. Pending, unmatched frames
/// are never visible here.
///
/// Reads are single-buffered: a returned header describes the frame that was
/// current at the time of the call. Its bytes stay alive through the `Arc`, but
/// the channel may already consider the buffer recycled once the next frame
/// replaces it.
///
/// Cloning an accessor is cheap.
#[derive(Clone)]
pub struct FrameAccessor {
    store: Arc<FrameStore>,
}

impl FrameAccessor {
    pub(crate) fn new(store: Arc<FrameStore>) -> Self {
        Self { store }
    }

    /// Returns the latest matched pair of a pair group.
    ///
    /// # Errors
    ///
    /// `NotReady` before the first pair is published, `UnknownGroup` for an
    /// unregistered group and `NotAPair` for a single-source group.
    pub fn matched_pair(&self, group: &str) -> Result<MatchedPair, AccessError> {
        match self.store.group(group) {
            Some(FrameTarget::Pair(sync)) => sync.matched().ok_or_else(|| AccessError::NotReady {
                group: sync.group().clone(),
            }),
            Some(FrameTarget::Single(slot)) => Err(AccessError::NotAPair {
                group: slot.group().clone(),
            }),
            None => Err(AccessError::UnknownGroup {
                group: GroupId::new(group),
            }),
        }
    }

    /// Returns the latest frame of a standalone source.
    ///
    /// # Errors
    ///
    /// `NotReady` before the first frame, `UnknownSource` for an unregistered
    /// source and `NotSingleSource` for a source that belongs to a pair.
    pub fn latest_single(&self, source: DataSource) -> Result<FrameHeader, AccessError> {
        match self.store.source(source) {
            Some(FrameTarget::Single(slot)) => slot.latest().ok_or_else(|| AccessError::NotReady {
                group: slot.group().clone(),
            }),
            Some(FrameTarget::Pair(sync)) => Err(AccessError::NotSingleSource {
                data_source: source,
                group: sync.group().clone(),
            }),
            None => Err(AccessError::UnknownSource {
                data_source: source,
            }),
        }
    }

    /// IDs of every registered group, in registration order.
    pub fn groups(&self) -> Vec<GroupId> {
        self.store
            .targets()
            .iter()
            .map(|target| target.group().clone())
            .collect()
    }
}

impl std::fmt::Debug for FrameAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAccessor")
            .field("groups", &self.groups())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CallbackBufferPool, MockChannel};
    use crate::config::SyncConfig;
    use crate::pipeline::PairedSynchronizer;
    use crate::slot::SingleSourceSlot;

    fn accessor(channel: &Arc<MockChannel>) -> FrameAccessor {
        let pool: Arc<dyn CallbackBufferPool> = channel.clone();
        let store = FrameStore::new(vec![
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
        ]);
        FrameAccessor::new(Arc::new(store))
    }

    fn deliver(accessor: &FrameAccessor, source: DataSource, id: i64) {
        let target = accessor.store.source(source).unwrap();
        target
            .on_frame(MockChannel::synthetic_frame(source, id, 4, 4))
            .unwrap();
    }

    #[test]
    fn test_not_ready_before_first_frame() {
        let channel = Arc::new(MockChannel::new());
        let accessor = accessor(&channel);

        assert!(matches!(
            accessor.matched_pair("left"),
            Err(AccessError::NotReady { .. })
        ));
        assert!(matches!(
            accessor.latest_single(DataSource::Disparity),
            Err(AccessError::NotReady { .. })
        ));
    }

    #[test]
    fn test_pending_frames_are_not_visible() {
        let channel = Arc::new(MockChannel::new());
        let accessor = accessor(&channel);

        deliver(&accessor, DataSource::LumaLeft, 3);
        assert!(accessor.matched_pair("left").is_err());

        deliver(&accessor, DataSource::ChromaLeft, 3);
        let pair = accessor.matched_pair("left").unwrap();
        assert_eq!(pair.first.source, DataSource::LumaLeft);
        assert_eq!(pair.second.unwrap().source, DataSource::ChromaLeft);
    }

    #[test]
    fn test_latest_single() {
        let channel = Arc::new(MockChannel::new());
        let accessor = accessor(&channel);

        deliver(&accessor, DataSource::Disparity, 1);
        deliver(&accessor, DataSource::Disparity, 2);

        let header = accessor.latest_single(DataSource::Disparity).unwrap();
        assert_eq!(header.frame_id, 2);
    }

    #[test]
    fn test_wrong_view_errors() {
        let channel = Arc::new(MockChannel::new());
        let accessor = accessor(&channel);

        assert_eq!(
            accessor.matched_pair("disparity").unwrap_err(),
            AccessError::NotAPair {
                group: GroupId::new("disparity"),
            }
        );
        assert_eq!(
            accessor.latest_single(DataSource::ChromaLeft).unwrap_err(),
            AccessError::NotSingleSource {
                data_source: DataSource::ChromaLeft,
                group: GroupId::new("left"),
            }
        );
        assert!(matches!(
            accessor.matched_pair("right"),
            Err(AccessError::UnknownGroup { .. })
        ));
        assert!(matches!(
            accessor.latest_single(DataSource::DisparityCost),
            Err(AccessError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_groups_in_registration_order() {
        let channel = Arc::new(MockChannel::new());
        let accessor = accessor(&channel);
        let groups: Vec<String> = accessor.groups().iter().map(ToString::to_string).collect();
        assert_eq!(groups, vec!["left", "disparity"]);
    }
}
