//! Binds a source-group's target to the channel's callback signature.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::channel::FrameCallback;
use crate::error::StereoSyncError;
use crate::frame::{FrameHeader, SourceMask};
use crate::session::SessionState;
use crate::slot::{FrameOutcome, FrameUpdate};
use crate::store::FrameTarget;
use crate::SyncEvent;

/// Runs on the channel's callback thread for one source-group.
///
/// The adapter never blocks on consumers: the only lock it takes is the
/// target's own. Errors never unwind into the channel's thread. The first
/// fatal error is recorded in the session, which stops it; every frame after
/// that is ignored without reserving a buffer.
pub(crate) struct CallbackAdapter {
    target: FrameTarget,
    mask: SourceMask,
    state: Arc<SessionState>,
}

impl CallbackAdapter {
    pub fn new(target: FrameTarget, state: Arc<SessionState>) -> Self {
        let mask = target.accepted_sources();
        Self {
            target,
            mask,
            state,
        }
    }

    /// Sources to register the callback for.
    pub fn mask(&self) -> SourceMask {
        self.mask
    }

    /// Wraps the adapter into the closure the channel invokes.
    pub fn into_callback(self) -> FrameCallback {
        Arc::new(move |header: &FrameHeader| self.handle(header))
    }

    pub fn handle(&self, header: &FrameHeader) {
        if !self.state.is_running() {
            self.state.frames_ignored.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.state.frames_received.fetch_add(1, Ordering::Relaxed);

        match self.dispatch(header) {
            Ok(update) => self.record(header, update),
            Err(error) => self.state.fail(self.target.group(), error),
        }
    }

    fn dispatch(&self, header: &FrameHeader) -> Result<FrameUpdate, StereoSyncError> {
        if !self.mask.contains(header.source) {
            return Err(StereoSyncError::UnexpectedSource {
                group: self.target.group().clone(),
                data_source: header.source,
            });
        }
        if header.is_sentinel() {
            return Err(StereoSyncError::InvalidFrameId {
                data_source: header.source,
                frame_id: header.frame_id,
            });
        }
        self.target.on_frame(header.clone())
    }

    fn record(&self, header: &FrameHeader, update: FrameUpdate) {
        let group = self.target.group();

        if let Some(frame_id) = update.discarded {
            self.state.frames_discarded.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%group, source = %header.source, frame_id, "pending frame discarded unmatched");
            self.state.emit(SyncEvent::FrameDiscarded {
                group: group.clone(),
                data_source: header.source,
                frame_id,
            });
        }

        match update.outcome {
            FrameOutcome::Matched(frame_id) => {
                self.state.pairs_matched.fetch_add(1, Ordering::Relaxed);
                self.state.notify(group, frame_id);
            }
            FrameOutcome::Promoted(frame_id) => {
                self.state.frames_promoted.fetch_add(1, Ordering::Relaxed);
                self.state.notify(group, frame_id);
            }
            FrameOutcome::Closed => {
                self.state.frames_ignored.fetch_add(1, Ordering::Relaxed);
            }
            FrameOutcome::Pending => {}
        }
    }
}
