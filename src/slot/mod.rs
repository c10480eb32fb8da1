//! Latest-frame slots and their buffer reservations.
//!
//! A [`Slot`] holds one frame header plus the [`BufferHandle`] that keeps the
//! header's pixels reserved. Slots are last-writer-wins: storing a frame
//! releases the previous frame's buffer before reserving the new one.
//!
//! Locking follows two variants of the same operation:
//!
//! - [`Slot::update`] takes `&mut self`. Callers reach it through a lock they
//!   already hold (the synchronizer locks both of its pending slots and its
//!   matched slot together), so it never locks anything itself.
//! - [`SingleSourceSlot::update`] is the locking entry point for a standalone
//!   source such as the disparity map.

mod handle;

pub use handle::BufferHandle;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{CallbackBufferPool, GroupId};
use crate::error::StereoSyncError;
use crate::frame::{DataSource, FrameHeader};

/// What an update did with the incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Buffered; waiting for the partner source.
    Pending,
    /// Completed a pair; the matched view now shows this frame id.
    Matched(i64),
    /// Published directly (single source or unpaired group).
    Promoted(i64),
    /// The target was closed by shutdown; nothing was reserved.
    Closed,
}

impl FrameOutcome {
    /// Returns the frame id that became visible to consumers, if any.
    pub fn published(self) -> Option<i64> {
        match self {
            Self::Matched(id) | Self::Promoted(id) => Some(id),
            Self::Pending | Self::Closed => None,
        }
    }
}

/// Result of delivering one frame to a slot or synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameUpdate {
    /// What happened to the incoming frame.
    pub outcome: FrameOutcome,
    /// Id of a pending frame that was overwritten unmatched.
    pub discarded: Option<i64>,
}

impl FrameUpdate {
    pub(crate) fn closed() -> Self {
        Self {
            outcome: FrameOutcome::Closed,
            discarded: None,
        }
    }
}

/// One frame header and the reservation backing it.
pub(crate) struct Slot {
    header: FrameHeader,
    handle: Option<BufferHandle>,
}

impl Slot {
    /// An empty slot carrying the sentinel frame id.
    pub(crate) fn empty(source: DataSource) -> Self {
        Self {
            header: FrameHeader::sentinel(source),
            handle: None,
        }
    }

    pub(crate) fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub(crate) fn frame_id(&self) -> i64 {
        self.header.frame_id
    }

    pub(crate) fn is_held(&self) -> bool {
        self.handle.is_some()
    }

    /// Stores `header`, releasing the previous reservation and reserving the
    /// new frame's buffer.
    ///
    /// Returns the id of the frame whose buffer was released, if the slot held
    /// one. On failure the slot is left empty.
    pub(crate) fn update(
        &mut self,
        header: FrameHeader,
        pool: &Arc<dyn CallbackBufferPool>,
    ) -> Result<Option<i64>, StereoSyncError> {
        let released = match self.handle.take() {
            Some(previous) => {
                let previous_id = self.header.frame_id;
                if let Err(e) = previous.release() {
                    self.reset();
                    return Err(e.into());
                }
                Some(previous_id)
            }
            None => None,
        };

        match BufferHandle::reserve(pool, &header) {
            Ok(handle) => {
                tracing::trace!(
                    source = %header.source,
                    frame_id = header.frame_id,
                    token = %handle.token(),
                    "slot updated"
                );
                self.header = header;
                self.handle = Some(handle);
                Ok(released)
            }
            Err(e) => {
                self.reset();
                Err(e.into())
            }
        }
    }

    /// Moves this slot's header and reservation into `target`, releasing
    /// whatever `target` held. This slot keeps its header but no longer owns a
    /// buffer.
    ///
    /// If the release fails `target` is left empty and this slot keeps its
    /// reservation.
    pub(crate) fn promote_into(&mut self, target: &mut Slot) -> Result<(), StereoSyncError> {
        target.release()?;
        self.move_into(target);
        Ok(())
    }

    /// Moves header and reservation into an already released `target`.
    pub(crate) fn move_into(&mut self, target: &mut Slot) {
        debug_assert!(!target.is_held());
        target.header = self.header.clone();
        target.handle = self.handle.take();
    }

    /// Releases the held reservation, if any, and empties the slot. Returns
    /// whether a reservation was held.
    pub(crate) fn release(&mut self) -> Result<bool, StereoSyncError> {
        let handle = self.handle.take();
        self.reset();
        match handle {
            Some(handle) => {
                handle.release()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reset(&mut self) {
        self.header = FrameHeader::sentinel(self.header.source);
        self.handle = None;
    }
}

struct SingleState {
    slot: Slot,
    closed: bool,
}

/// A standalone source's latest frame, guarded by its own lock.
///
/// Used for sources that need no partner, such as the disparity and
/// disparity-cost maps. Every update replaces the previous frame.
pub struct SingleSourceSlot {
    group: GroupId,
    source: DataSource,
    pool: Arc<dyn CallbackBufferPool>,
    state: Mutex<SingleState>,
}

impl SingleSourceSlot {
    /// Creates an empty slot for `source`.
    pub fn new(
        group: impl Into<GroupId>,
        source: DataSource,
        pool: Arc<dyn CallbackBufferPool>,
    ) -> Self {
        Self {
            group: group.into(),
            source,
            pool,
            state: Mutex::new(SingleState {
                slot: Slot::empty(source),
                closed: false,
            }),
        }
    }

    /// The group this slot belongs to.
    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// The source this slot accepts.
    pub fn source(&self) -> DataSource {
        self.source
    }

    /// Stores `header` as the latest frame.
    ///
    /// # Errors
    ///
    /// `UnexpectedSource` if the header comes from another source, or a pool
    /// error if the previous buffer could not be released or the new one
    /// reserved.
    pub fn update(&self, header: FrameHeader) -> Result<FrameUpdate, StereoSyncError> {
        if header.source != self.source {
            return Err(StereoSyncError::UnexpectedSource {
                group: self.group.clone(),
                data_source: header.source,
            });
        }

        let mut state = self.state.lock();
        if state.closed {
            return Ok(FrameUpdate::closed());
        }

        let frame_id = header.frame_id;
        state.slot.update(header, &self.pool)?;
        Ok(FrameUpdate {
            outcome: FrameOutcome::Promoted(frame_id),
            discarded: None,
        })
    }

    /// Copies out the latest header, or `None` before the first frame.
    pub fn latest(&self) -> Option<FrameHeader> {
        let state = self.state.lock();
        let header = state.slot.header();
        (!header.is_sentinel()).then(|| header.clone())
    }

    /// Closes the slot to further updates and releases its buffer.
    ///
    /// Returns the number of buffers released (0 or 1) and the release error,
    /// if any.
    pub fn release_all(&self) -> (usize, Option<StereoSyncError>) {
        let mut state = self.state.lock();
        state.closed = true;
        match state.slot.release() {
            Ok(held) => (usize::from(held), None),
            Err(e) => (0, Some(e)),
        }
    }

    /// Returns `true` while the slot owns a reservation.
    pub fn is_held(&self) -> bool {
        self.state.lock().slot.is_held()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use crate::error::PoolError;

    fn setup() -> (Arc<MockChannel>, Arc<dyn CallbackBufferPool>) {
        let channel = Arc::new(MockChannel::new());
        let pool: Arc<dyn CallbackBufferPool> = channel.clone();
        (channel, pool)
    }

    fn frame(id: i64) -> FrameHeader {
        MockChannel::synthetic_frame(DataSource::Disparity, id, 8, 4)
    }

    #[test]
    fn test_empty_slot_is_sentinel() {
        let slot = Slot::empty(DataSource::LumaLeft);
        assert!(slot.header().is_sentinel());
        assert!(!slot.is_held());
    }

    #[test]
    fn test_update_holds_exactly_latest() {
        let (channel, pool) = setup();
        let mut slot = Slot::empty(DataSource::Disparity);

        for id in 0..10 {
            slot.update(frame(id), &pool).unwrap();
            let stats = channel.pool_stats();
            assert_eq!(stats.held, 1);
            assert_eq!(stats.reserved, stats.released + stats.held);
        }

        assert_eq!(slot.frame_id(), 9);
        assert!(slot.is_held());
        assert_eq!(channel.pool_stats().released, 9);
    }

    #[test]
    fn test_update_reports_released_frame() {
        let (_channel, pool) = setup();
        let mut slot = Slot::empty(DataSource::Disparity);

        assert_eq!(slot.update(frame(1), &pool).unwrap(), None);
        assert_eq!(slot.update(frame(2), &pool).unwrap(), Some(1));
    }

    #[test]
    fn test_update_failure_resets_slot() {
        let (channel, pool) = setup();
        let mut slot = Slot::empty(DataSource::Disparity);
        slot.update(frame(1), &pool).unwrap();

        channel.fail_next_release();
        let err = slot.update(frame(2), &pool).unwrap_err();

        assert!(matches!(
            err,
            StereoSyncError::Pool(PoolError::ReleaseFailed { .. })
        ));
        assert!(slot.header().is_sentinel());
        assert!(!slot.is_held());
    }

    #[test]
    fn test_reserve_failure_resets_slot() {
        let (channel, pool) = setup();
        let mut slot = Slot::empty(DataSource::Disparity);
        slot.update(frame(1), &pool).unwrap();

        channel.fail_next_reserve();
        assert!(slot.update(frame(2), &pool).is_err());
        assert!(slot.header().is_sentinel());

        let stats = channel.pool_stats();
        assert_eq!(stats.held, 0);
        assert_eq!(stats.reserved, stats.released);
    }

    #[test]
    fn test_promote_moves_reservation() {
        let (channel, pool) = setup();
        let mut pending = Slot::empty(DataSource::Disparity);
        let mut shown = Slot::empty(DataSource::Disparity);

        pending.update(frame(1), &pool).unwrap();
        pending.promote_into(&mut shown).unwrap();
        assert!(!pending.is_held());
        assert_eq!(pending.frame_id(), 1);
        assert!(shown.is_held());
        assert_eq!(shown.frame_id(), 1);

        pending.update(frame(2), &pool).unwrap();
        pending.promote_into(&mut shown).unwrap();
        assert_eq!(shown.frame_id(), 2);

        let stats = channel.pool_stats();
        assert_eq!(stats.held, 1);
        assert_eq!(stats.released, 1);
    }

    #[test]
    fn test_promote_failure_empties_target() {
        let (channel, pool) = setup();
        let mut pending = Slot::empty(DataSource::Disparity);
        let mut shown = Slot::empty(DataSource::Disparity);

        pending.update(frame(1), &pool).unwrap();
        pending.promote_into(&mut shown).unwrap();
        pending.update(frame(2), &pool).unwrap();

        channel.fail_next_release();
        assert!(pending.promote_into(&mut shown).is_err());

        assert!(shown.header().is_sentinel());
        assert!(!shown.is_held());
        assert!(pending.is_held());
        assert_eq!(pending.frame_id(), 2);
    }

    #[test]
    fn test_single_slot_release_failure_reported() {
        let (channel, pool) = setup();
        let slot = SingleSourceSlot::new("disparity", DataSource::Disparity, pool);
        slot.update(frame(1)).unwrap();

        channel.fail_next_release();
        let (released, error) = slot.release_all();

        assert_eq!(released, 0);
        assert!(matches!(
            error,
            Some(StereoSyncError::Pool(PoolError::ReleaseFailed { .. }))
        ));
        assert!(slot.latest().is_none());
    }

    #[test]
    fn test_single_slot_latest() {
        let (_channel, pool) = setup();
        let slot = SingleSourceSlot::new("disparity", DataSource::Disparity, pool);
        assert!(slot.latest().is_none());

        let update = slot.update(frame(4)).unwrap();
        assert_eq!(update.outcome, FrameOutcome::Promoted(4));
        assert_eq!(slot.latest().unwrap().frame_id, 4);
    }

    #[test]
    fn test_single_slot_rejects_other_source() {
        let (channel, pool) = setup();
        let slot = SingleSourceSlot::new("disparity", DataSource::Disparity, pool);

        let header = MockChannel::synthetic_frame(DataSource::DisparityCost, 1, 8, 4);
        let err = slot.update(header).unwrap_err();

        assert!(err.is_invariant_violation());
        assert_eq!(channel.pool_stats().reserved, 0);
    }

    #[test]
    fn test_single_slot_release_all_closes() {
        let (channel, pool) = setup();
        let slot = SingleSourceSlot::new("disparity", DataSource::Disparity, pool);
        slot.update(frame(1)).unwrap();

        assert_eq!(slot.release_all(), (1, None));
        assert!(slot.latest().is_none());
        assert_eq!(slot.release_all(), (0, None));
        assert_eq!(slot.update(frame(2)).unwrap().outcome, FrameOutcome::Closed);

        let stats = channel.pool_stats();
        assert_eq!(stats.reserved, 1);
        assert_eq!(stats.released, 1);
    }
}
