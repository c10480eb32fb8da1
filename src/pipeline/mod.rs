//! Frame synchronization pipeline.
//!
//! ```text
//! Channel thread → CallbackAdapter → SingleSourceSlot / PairedSynchronizer
//! ```
//!
//! - **Callback Adapter**: one per source-group, runs on the channel's thread
//!   and records fatal errors instead of unwinding
//! - **Synchronizer**: matches two sources by frame id before publishing
//!
//! Nothing here spawns a thread; the channel drives every call.

mod adapter;
mod synchronizer;

pub(crate) use adapter::CallbackAdapter;
pub use synchronizer::{MatchedPair, PairedSynchronizer};
