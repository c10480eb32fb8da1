//! Scope-bound reservation of a pool buffer.

use std::fmt;
use std::sync::Arc;

use crate::channel::{BufferToken, CallbackBufferPool};
use crate::error::PoolError;
use crate::frame::FrameHeader;

/// Exclusive reservation of the pool buffer behind one frame.
///
/// A `BufferHandle` is created by reserving the buffer of the frame currently
/// being delivered and returns it to the pool exactly once:
///
/// - [`release()`](BufferHandle::release) consumes the handle and reports the
///   pool's answer, so a second release cannot be written.
/// - Dropping an unreleased handle releases it. A failure on that path can only
///   be logged.
///
/// Slots store handles as `Option<BufferHandle>`, which makes "at most one live
/// handle per slot" a property of the type.
#[must_use = "dropping a BufferHandle releases the buffer immediately"]
pub struct BufferHandle {
    token: BufferToken,
    pool: Arc<dyn CallbackBufferPool>,
    released: bool,
}

impl BufferHandle {
    /// Reserves the buffer backing `header`.
    pub(crate) fn reserve(
        pool: &Arc<dyn CallbackBufferPool>,
        header: &FrameHeader,
    ) -> Result<Self, PoolError> {
        let token = pool.reserve_callback_buffer(header)?;
        Ok(Self {
            token,
            pool: Arc::clone(pool),
            released: false,
        })
    }

    /// The pool's token for this reservation.
    pub fn token(&self) -> BufferToken {
        self.token
    }

    /// Returns the buffer to the pool.
    pub fn release(mut self) -> Result<(), PoolError> {
        self.released = true;
        self.pool.release_callback_buffer(self.token)
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.pool.release_callback_buffer(self.token) {
            tracing::error!(token = %self.token, error = %e, "failed to release buffer on drop");
        }
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
