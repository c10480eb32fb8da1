//! Error types for stereo-sync.
//!
//! Errors are split into three categories:
//! - **Fatal errors** ([`StereoSyncError`]): setup failures and contract breaches
//!   between this crate and the channel. Never retried.
//! - **Pool errors** ([`PoolError`]): reservation and release failures reported by
//!   the channel's buffer pool. Surfaced, never swallowed.
//! - **Access errors** ([`AccessError`]): returned to consumers when a view is not
//!   available yet. Recoverable.
//!
//! Runtime notices that need no action are events, see [`SyncEvent`](crate::SyncEvent).

use crate::channel::{BufferToken, ChannelStatus, GroupId};
use crate::frame::{DataSource, SourceMask};

/// Fatal errors.
///
/// Setup variants are returned from [`configure_sensor`](crate::configure_sensor)
/// and [`StereoSyncBuilder::start`](crate::StereoSyncBuilder::start). The
/// invariant variants are raised on the channel's callback threads; the session
/// records the first one and [`Session::run_until_shutdown`] returns it.
///
/// [`Session::run_until_shutdown`]: crate::Session::run_until_shutdown
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StereoSyncError {
    /// A channel setup call reported a non-success status.
    #[error("{operation} failed: {status}")]
    Protocol {
        /// The call that failed.
        operation: &'static str,
        /// Status code returned by the channel.
        status: ChannelStatus,
    },

    /// No device mode streams every required source.
    #[error("device does not support the required data sources {required}")]
    NoSuitableDeviceMode {
        /// Sources that had to be supported.
        required: SourceMask,
    },

    /// No source-groups were registered before starting.
    #[error("no source groups configured - add at least one pair or single source")]
    NoGroupsConfigured,

    /// A group ID was used more than once.
    #[error("duplicate group ID: {group}")]
    DuplicateGroupId {
        /// The duplicated group ID.
        group: GroupId,
    },

    /// A source was registered in more than one group.
    #[error("source {data_source} registered in more than one group")]
    DuplicateSource {
        /// The duplicated source.
        data_source: DataSource,
    },

    /// A pair was declared with the same source on both sides.
    #[error("pair '{group}' uses {data_source} for both sides")]
    InvalidPair {
        /// The offending group.
        group: GroupId,
        /// The repeated source.
        data_source: DataSource,
    },

    /// A frame reached a group or slot that does not accept its source.
    #[error("unexpected source {data_source} delivered to '{group}'")]
    UnexpectedSource {
        /// Group that received the frame.
        group: GroupId,
        /// Source tag of the frame.
        data_source: DataSource,
    },

    /// The channel delivered a frame with a negative id.
    #[error("invalid frame id {frame_id} from {data_source}")]
    InvalidFrameId {
        /// Source tag of the frame.
        data_source: DataSource,
        /// The rejected id.
        frame_id: i64,
    },

    /// A pair with the frame id already on display was matched again.
    #[error("frame {frame_id} matched twice in '{group}'")]
    DuplicateMatch {
        /// Group whose synchronizer saw the repeat.
        group: GroupId,
        /// The repeated frame id.
        frame_id: i64,
    },

    /// A source delivered a frame id lower than its previous one.
    #[error("frame id went backwards on {data_source} in '{group}': {previous} -> {received}")]
    FrameIdRegressed {
        /// Group whose synchronizer saw the regression.
        group: GroupId,
        /// Source that regressed.
        data_source: DataSource,
        /// Last id recorded for the source.
        previous: i64,
        /// The id just delivered.
        received: i64,
    },

    /// The buffer pool failed a reservation or release.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl StereoSyncError {
    /// Returns `true` for contract breaches between this crate and the channel,
    /// as opposed to setup or pool failures.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedSource { .. }
                | Self::InvalidFrameId { .. }
                | Self::DuplicateMatch { .. }
                | Self::FrameIdRegressed { .. }
        )
    }

    pub(crate) fn protocol(operation: &'static str) -> impl FnOnce(ChannelStatus) -> Self {
        move |status| Self::Protocol { operation, status }
    }
}

/// Errors reported by the channel's buffer pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool could not reserve the buffer behind the current frame.
    #[error("buffer reservation failed: {status}")]
    ReserveFailed {
        /// Status code returned by the pool.
        status: ChannelStatus,
    },

    /// The pool refused to take a buffer back.
    #[error("release of buffer {token} failed: {status}")]
    ReleaseFailed {
        /// The buffer being released.
        token: BufferToken,
        /// Status code returned by the pool.
        status: ChannelStatus,
    },

    /// The token is not currently reserved (already released or never issued).
    #[error("buffer {token} is not reserved")]
    UnknownToken {
        /// The unknown token.
        token: BufferToken,
    },
}

/// Errors returned to consumers reading the current frame views.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// No frame has been published for this view yet.
    #[error("no frame available yet for '{group}'")]
    NotReady {
        /// Group whose view is still empty.
        group: GroupId,
    },

    /// No group with this ID was registered.
    #[error("unknown group: {group}")]
    UnknownGroup {
        /// The unknown group ID.
        group: GroupId,
    },

    /// No group was registered for this source.
    #[error("no group registered for source {data_source}")]
    UnknownSource {
        /// The unregistered source.
        data_source: DataSource,
    },

    /// The source belongs to a synchronized pair; read it through `matched_pair`.
    #[error("source {data_source} is part of pair '{group}'")]
    NotSingleSource {
        /// The requested source.
        data_source: DataSource,
        /// Pair the source belongs to.
        group: GroupId,
    },

    /// The group is a single source; read it through `latest_single`.
    #[error("group '{group}' is not a synchronized pair")]
    NotAPair {
        /// The requested group.
        group: GroupId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = StereoSyncError::protocol("set_image_config")(ChannelStatus(-4));
        assert_eq!(err.to_string(), "set_image_config failed: status -4");
        assert!(!err.is_invariant_violation());
    }

    #[test]
    fn test_duplicate_match_is_invariant_violation() {
        let err = StereoSyncError::DuplicateMatch {
            group: GroupId::new("left"),
            frame_id: 5,
        };
        assert!(err.is_invariant_violation());
        assert_eq!(err.to_string(), "frame 5 matched twice in 'left'");
    }

    #[test]
    fn test_pool_error_is_transparent() {
        let err: StereoSyncError = PoolError::UnknownToken {
            token: BufferToken(9),
        }
        .into();
        assert_eq!(err.to_string(), "buffer #9 is not reserved");
        assert!(!err.is_invariant_violation());
    }

    #[test]
    fn test_no_suitable_mode_lists_sources() {
        let err = StereoSyncError::NoSuitableDeviceMode {
            required: DataSource::LumaLeft | DataSource::Disparity,
        };
        assert!(err.to_string().contains("[luma_left|disparity]"));
    }

    #[test]
    fn test_access_error_display() {
        let err = AccessError::NotSingleSource {
            data_source: DataSource::ChromaLeft,
            group: GroupId::new("left"),
        };
        assert_eq!(err.to_string(), "source chroma_left is part of pair 'left'");
    }
}
