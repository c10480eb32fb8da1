//! Synchronization session management.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::accessor::FrameAccessor;
use crate::channel::GroupId;
use crate::store::FrameStore;
use crate::{EventCallback, StereoSyncError, SyncEvent};

/// Statistics about a synchronization session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames delivered to a callback while the session was running.
    pub frames_received: u64,
    /// Pairs published by synchronizers.
    pub pairs_matched: u64,
    /// Frames published directly (single sources and unpaired groups).
    pub frames_promoted: u64,
    /// Pending frames overwritten before their partner arrived.
    pub frames_discarded: u64,
    /// Frames dropped without reserving because the session had stopped.
    pub frames_ignored: u64,
    /// Buffers returned to the pool at shutdown.
    pub handles_released: u64,
}

/// Posted to subscribers after a group publishes a new frame or pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNotice {
    /// The group whose view changed.
    pub group: GroupId,
    /// Frame id now visible in that view.
    pub frame_id: i64,
}

/// Internal state shared between the session and the channel callbacks.
pub(crate) struct SessionState {
    /// Cleared once by shutdown or the first fault; waiters subscribe to it.
    running: watch::Sender<bool>,
    fault: Mutex<Option<StereoSyncError>>,
    pub frames_received: AtomicU64,
    pub pairs_matched: AtomicU64,
    pub frames_promoted: AtomicU64,
    pub frames_discarded: AtomicU64,
    pub frames_ignored: AtomicU64,
    pub handles_released: AtomicU64,
    notices: watch::Sender<Option<FrameNotice>>,
    events: Option<EventCallback>,
}

impl SessionState {
    pub fn new(events: Option<EventCallback>) -> Self {
        let (notices, _) = watch::channel(None);
        let (running, _) = watch::channel(true);
        Self {
            running,
            fault: Mutex::new(None),
            frames_received: AtomicU64::new(0),
            pairs_matched: AtomicU64::new(0),
            frames_promoted: AtomicU64::new(0),
            frames_discarded: AtomicU64::new(0),
            frames_ignored: AtomicU64::new(0),
            handles_released: AtomicU64::new(0),
            notices,
            events,
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Clears the running flag. Returns whether it was set.
    pub fn request_shutdown(&self) -> bool {
        self.running.send_replace(false)
    }

    pub fn watch_running(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        if let Some(callback) = &self.events {
            callback(event);
        }
    }

    /// Records a fatal error raised on a callback thread and stops the session.
    ///
    /// Only the first error is kept; later ones are logged.
    pub fn fail(&self, group: &GroupId, error: StereoSyncError) {
        {
            let mut fault = self.fault.lock();
            if fault.is_some() {
                tracing::debug!(%group, %error, "further error after session fault");
                return;
            }
            *fault = Some(error.clone());
        }
        self.request_shutdown();

        tracing::error!(%group, %error, "fatal synchronization error, stopping");
        self.emit(SyncEvent::InvariantViolation {
            group: group.clone(),
            error: error.to_string(),
        });
    }

    pub fn fault(&self) -> Option<StereoSyncError> {
        self.fault.lock().clone()
    }

    pub fn notify(&self, group: &GroupId, frame_id: i64) {
        self.notices.send_replace(Some(FrameNotice {
            group: group.clone(),
            frame_id,
        }));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<FrameNotice>> {
        self.notices.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_received: self.frames_received.load(Ordering::SeqCst),
            pairs_matched: self.pairs_matched.load(Ordering::SeqCst),
            frames_promoted: self.frames_promoted.load(Ordering::SeqCst),
            frames_discarded: self.frames_discarded.load(Ordering::SeqCst),
            frames_ignored: self.frames_ignored.load(Ordering::SeqCst),
            handles_released: self.handles_released.load(Ordering::SeqCst),
        }
    }
}

/// Cloneable handle that asks a running session to stop.
///
/// Typically moved into a Ctrl-C handler or a consumer task. Requesting
/// shutdown only clears the running flag; buffers are released by
/// [`Session::stop()`] or when the session is dropped.
#[derive(Clone)]
pub struct ShutdownHandle {
    state: Arc<SessionState>,
}

impl ShutdownHandle {
    /// Requests shutdown. Frames delivered afterwards are ignored.
    pub fn shutdown(&self) {
        if self.state.request_shutdown() {
            tracing::info!("shutdown requested");
        }
    }

    /// Returns `true` until shutdown is requested or a fatal error occurs.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("running", &self.state.is_running())
            .finish()
    }
}

/// Handle to a running synchronization session.
///
/// The `Session` is returned by [`StereoSyncBuilder::start()`]. From then on
/// the channel's callback threads keep the slots current; the session is the
/// consumer's side of that arrangement.
///
/// # Lifecycle
///
/// 1. Created by [`StereoSyncBuilder::start()`]
/// 2. Frames are synchronized on the channel's threads
/// 3. [`run_until_shutdown()`](Session::run_until_shutdown) waits for a
///    shutdown request or a fatal error
/// 4. [`stop()`](Session::stop) releases every held buffer
/// 5. Dropping the `Session` also releases (but prefer explicit `stop()`)
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stereo_sync::{DataSource, MockChannel, StereoSync};
///
/// let channel = Arc::new(MockChannel::new());
/// let session = StereoSync::builder()
///     .add_pair("left", DataSource::LumaLeft, DataSource::ChromaLeft)
///     .start(channel.clone())
///     .unwrap();
///
/// channel.deliver(&MockChannel::synthetic_frame(DataSource::LumaLeft, 1, 8, 4));
/// channel.deliver(&MockChannel::synthetic_frame(DataSource::ChromaLeft, 1, 8, 4));
///
/// let pair = session.accessor().matched_pair("left").unwrap();
/// assert_eq!(pair.frame_id(), 1);
///
/// let stats = session.stop().unwrap();
/// assert_eq!(stats.pairs_matched, 1);
/// assert_eq!(channel.pool_stats().held, 0);
/// ```
///
/// [`StereoSyncBuilder::start()`]: crate::StereoSyncBuilder::start
pub struct Session {
    state: Arc<SessionState>,
    store: Arc<FrameStore>,
    stopped: bool,
}

impl Session {
    pub(crate) fn new(state: Arc<SessionState>, store: Arc<FrameStore>) -> Self {
        Self {
            state,
            store,
            stopped: false,
        }
    }

    /// Returns a reader for the published views.
    pub fn accessor(&self) -> FrameAccessor {
        FrameAccessor::new(Arc::clone(&self.store))
    }

    /// Subscribes to publication notices.
    ///
    /// The channel keeps only the latest notice; a slow subscriber sees the
    /// most recent publication, not every one.
    pub fn subscribe(&self) -> watch::Receiver<Option<FrameNotice>> {
        self.state.subscribe()
    }

    /// Returns a handle that can request shutdown from elsewhere.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Returns `true` until shutdown is requested or a fatal error occurs.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> SessionStats {
        self.state.stats()
    }

    /// The fatal error that stopped the session, if any.
    pub fn fault(&self) -> Option<StereoSyncError> {
        self.state.fault()
    }

    /// Waits until the running flag is cleared.
    ///
    /// # Errors
    ///
    /// Returns the fatal error recorded by a callback, if that is what stopped
    /// the session. A plain shutdown request returns `Ok(())`.
    pub async fn run_until_shutdown(&self) -> Result<(), StereoSyncError> {
        let mut running = self.state.watch_running();
        // The sender lives in the state `self` holds, so this cannot close early.
        let _ = running.wait_for(|running| !*running).await;

        match self.state.fault() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Stops the session and releases every buffer still held.
    ///
    /// Every slot is closed under its own lock before its buffers are released,
    /// so callbacks racing with shutdown cannot reserve new ones.
    ///
    /// # Errors
    ///
    /// Returns the first pool error met while releasing. The remaining buffers
    /// are still released.
    pub fn stop(mut self) -> Result<SessionStats, StereoSyncError> {
        self.stop_internal()?;
        Ok(self.state.stats())
    }

    fn stop_internal(&mut self) -> Result<(), StereoSyncError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.state.request_shutdown();

        let (released, error) = self.store.release_all();
        self.state
            .handles_released
            .fetch_add(released as u64, Ordering::SeqCst);

        tracing::info!(handles_released = released, "session stopped");
        self.state.emit(SyncEvent::ShutdownCompleted {
            handles_released: released,
        });

        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(error) = self.stop_internal() {
            tracing::error!(%error, "failed to release buffers on drop");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("running", &self.state.is_running())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_session_state_new() {
        let state = SessionState::new(None);
        assert!(state.is_running());
        assert_eq!(state.frames_received.load(Ordering::SeqCst), 0);
        assert!(state.fault().is_none());
    }

    #[test]
    fn test_session_stats_default() {
        let stats = SessionStats::default();
        assert_eq!(stats.frames_received, 0);
        assert_eq!(stats.pairs_matched, 0);
        assert_eq!(stats.handles_released, 0);
    }

    #[test]
    fn test_first_fault_wins() {
        let violations = Arc::new(AtomicUsize::new(0));
        let counter = violations.clone();
        let state = SessionState::new(Some(crate::event_callback(move |event| {
            if matches!(event, SyncEvent::InvariantViolation { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })));
        let group = GroupId::new("left");

        state.fail(&group, StereoSyncError::NoGroupsConfigured);
        state.fail(
            &group,
            StereoSyncError::DuplicateMatch {
                group: group.clone(),
                frame_id: 1,
            },
        );

        assert!(!state.is_running());
        assert_eq!(state.fault(), Some(StereoSyncError::NoGroupsConfigured));
        assert_eq!(violations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_keeps_latest() {
        let state = SessionState::new(None);
        let rx = state.subscribe();

        state.notify(&GroupId::new("left"), 1);
        state.notify(&GroupId::new("disparity"), 2);

        let notice = rx.borrow().clone().unwrap();
        assert_eq!(notice.group.as_str(), "disparity");
        assert_eq!(notice.frame_id, 2);
    }

    fn empty_session() -> Session {
        Session::new(
            Arc::new(SessionState::new(None)),
            Arc::new(FrameStore::new(Vec::new())),
        )
    }

    #[tokio::test]
    async fn test_run_returns_once_shutdown_requested() {
        let session = empty_session();
        let handle = session.shutdown_handle();

        let waiter = tokio::spawn(async move {
            tokio::task::yield_now().await;
            handle.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), session.run_until_shutdown())
            .await
            .unwrap()
            .unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_returns_fault_recorded_earlier() {
        let session = empty_session();
        session
            .state
            .fail(&GroupId::new("left"), StereoSyncError::NoGroupsConfigured);

        let result = tokio::time::timeout(Duration::from_secs(1), session.run_until_shutdown())
            .await
            .unwrap();
        assert_eq!(result, Err(StereoSyncError::NoGroupsConfigured));
    }

    #[test]
    fn test_shutdown_handle() {
        let state = Arc::new(SessionState::new(None));
        let handle = ShutdownHandle {
            state: state.clone(),
        };

        assert!(handle.is_running());
        handle.shutdown();
        assert!(!handle.is_running());
        assert!(!state.is_running());
        assert!(state.fault().is_none());
    }
}
