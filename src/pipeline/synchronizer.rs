//! Frame-id matching for two sources that must be consumed together.
//!
//! Luma and chroma planes of one imager arrive on independent paths in no
//! particular order. The synchronizer buffers the latest frame of each in a
//! pending slot and promotes both into the matched view once their frame ids
//! agree, so a consumer never sees luma from one capture and chroma from
//! another.
//!
//! ```text
//! first  ──► pending[0] ─┐
//!                        ├─ equal ids ─► matched[0], matched[1] ─► consumers
//! second ──► pending[1] ─┘
//! ```
//!
//! One lock covers both pending slots and the matched view, so a reader never
//! observes a half-replaced pair.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{CallbackBufferPool, GroupId};
use crate::config::{PairingMode, SyncConfig};
use crate::error::StereoSyncError;
use crate::frame::{DataSource, FrameHeader, SourceMask};
use crate::slot::{FrameOutcome, FrameUpdate, Slot};

/// The most recent published pair of a synchronizer.
///
/// In [`PairingMode::Paired`] both headers carry the same frame id. In
/// [`PairingMode::Unpaired`] only `first` is present.
#[derive(Debug, Clone)]
pub struct MatchedPair {
    /// Frame from the group's primary source.
    pub first: FrameHeader,
    /// Frame from the partner source, `None` for unpaired groups.
    pub second: Option<FrameHeader>,
}

impl MatchedPair {
    /// Frame id shared by the pair.
    pub fn frame_id(&self) -> i64 {
        self.first.frame_id
    }
}

struct PairState {
    pending: [Slot; 2],
    matched: [Slot; 2],
    closed: bool,
}

/// Coordinates two related sources so they are published as a matched pair.
pub struct PairedSynchronizer {
    group: GroupId,
    sources: [DataSource; 2],
    pairing: PairingMode,
    strict_frame_order: bool,
    pool: Arc<dyn CallbackBufferPool>,
    state: Mutex<PairState>,
}

impl PairedSynchronizer {
    /// Creates a synchronizer for `first` and `second`.
    ///
    /// `first` is the primary source: in unpaired mode it is the only source
    /// accepted.
    pub fn new(
        group: impl Into<GroupId>,
        first: DataSource,
        second: DataSource,
        pool: Arc<dyn CallbackBufferPool>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            group: group.into(),
            sources: [first, second],
            pairing: config.pairing,
            strict_frame_order: config.strict_frame_order,
            pool,
            state: Mutex::new(PairState {
                pending: [Slot::empty(first), Slot::empty(second)],
                matched: [Slot::empty(first), Slot::empty(second)],
                closed: false,
            }),
        }
    }

    /// The group this synchronizer belongs to.
    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// The primary and partner sources.
    pub fn sources(&self) -> [DataSource; 2] {
        self.sources
    }

    /// The pairing mode in effect.
    pub fn pairing(&self) -> PairingMode {
        self.pairing
    }

    /// Sources this synchronizer accepts frames from.
    pub fn accepted_sources(&self) -> SourceMask {
        match self.pairing {
            PairingMode::Paired => self.sources[0] | self.sources[1],
            PairingMode::Unpaired => SourceMask::from(self.sources[0]),
        }
    }

    /// Buffers `header` and publishes a new pair if it completes one.
    ///
    /// Whichever source arrives second triggers the match. A pending frame
    /// that is overwritten before its partner arrives is released and reported
    /// in [`FrameUpdate::discarded`].
    ///
    /// Pending slots keep their header after a match, so a single repeat of
    /// the published frame id from either source is already a duplicate.
    ///
    /// If a pool call fails while publishing, the matched view is emptied
    /// rather than left holding frames from two captures.
    ///
    /// # Errors
    ///
    /// - `UnexpectedSource` for a source this synchronizer does not accept
    /// - `FrameIdRegressed` when strict ordering is on and the id went backwards
    /// - `DuplicateMatch` when the completed pair is the one already published
    /// - `Pool` when a buffer could not be released or reserved
    pub fn on_frame(&self, header: FrameHeader) -> Result<FrameUpdate, StereoSyncError> {
        let side = self.side(header.source)?;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.closed {
            return Ok(FrameUpdate::closed());
        }

        self.check_order(&state.pending[side], &header)?;

        let frame_id = header.frame_id;
        let discarded = state.pending[side].update(header, &self.pool)?;

        let outcome = match self.pairing {
            PairingMode::Unpaired => {
                state.pending[side].promote_into(&mut state.matched[side])?;
                FrameOutcome::Promoted(frame_id)
            }
            PairingMode::Paired => self.try_match(state)?,
        };

        Ok(FrameUpdate { outcome, discarded })
    }

    /// Copies out the published pair, or `None` before the first one.
    pub fn matched(&self) -> Option<MatchedPair> {
        let state = self.state.lock();
        let first = state.matched[0].header();
        if first.is_sentinel() {
            return None;
        }

        let second = match self.pairing {
            PairingMode::Paired => {
                let second = state.matched[1].header();
                if second.is_sentinel() {
                    return None;
                }
                Some(second.clone())
            }
            PairingMode::Unpaired => None,
        };

        Some(MatchedPair {
            first: first.clone(),
            second,
        })
    }

    /// Closes the synchronizer to further frames and releases every buffer it
    /// holds, pending and published.
    ///
    /// All slots are released even if one release fails. Returns the number
    /// of buffers released and the first failure.
    pub fn release_all(&self) -> (usize, Option<StereoSyncError>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.closed = true;

        let mut released = 0;
        let mut first_error = None;
        for slot in state.pending.iter_mut().chain(state.matched.iter_mut()) {
            match slot.release() {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        (released, first_error)
    }

    fn side(&self, source: DataSource) -> Result<usize, StereoSyncError> {
        if source == self.sources[0] {
            Ok(0)
        } else if source == self.sources[1] && self.pairing == PairingMode::Paired {
            Ok(1)
        } else {
            Err(StereoSyncError::UnexpectedSource {
                group: self.group.clone(),
                data_source: source,
            })
        }
    }

    fn check_order(&self, pending: &Slot, header: &FrameHeader) -> Result<(), StereoSyncError> {
        if !self.strict_frame_order || pending.header().is_sentinel() {
            return Ok(());
        }
        let previous = pending.frame_id();
        if header.frame_id < previous {
            return Err(StereoSyncError::FrameIdRegressed {
                group: self.group.clone(),
                data_source: header.source,
                previous,
                received: header.frame_id,
            });
        }
        Ok(())
    }

    /// Promotes the pending pair if both sides carry the same frame id.
    fn try_match(&self, state: &mut PairState) -> Result<FrameOutcome, StereoSyncError> {
        let [first, second] = &mut state.pending;
        let frame_id = first.frame_id();
        if first.header().is_sentinel() || frame_id != second.frame_id() {
            return Ok(FrameOutcome::Pending);
        }

        let [shown_first, shown_second] = &mut state.matched;
        if frame_id == shown_first.frame_id() || frame_id == shown_second.frame_id() {
            return Err(StereoSyncError::DuplicateMatch {
                group: self.group.clone(),
                frame_id,
            });
        }

        // Release both published buffers before either side moves. On failure
        // the view stays empty.
        let cleared = shown_first.release();
        let cleared = cleared.and(shown_second.release());
        if let Err(e) = cleared {
            tracing::warn!(
                group = %self.group,
                frame_id,
                "matched view cleared after release failure"
            );
            return Err(e);
        }
        first.move_into(shown_first);
        second.move_into(shown_second);

        tracing::debug!(group = %self.group, frame_id, "pair matched");
        Ok(FrameOutcome::Matched(frame_id))
    }
}
