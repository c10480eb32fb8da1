//! Names for source-groups.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Name of a source-group: one isolated channel callback and the slots it
/// writes.
///
/// A group is either a pair whose frames are published together (left luma
/// with left chroma) or one standalone source such as the disparity map.
/// Readers look groups up by name, so `GroupId` borrows as `str` and a plain
/// `&str` works as a map key.
///
/// The name is shared, not copied, between the builder, the synchronizer,
/// events and notices.
///
/// ```
/// use stereo_sync::GroupId;
///
/// let left: GroupId = "left".into();
/// assert_eq!(left.as_str(), "left");
/// assert_eq!(format!("[{left:>6}]"), "[  left]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(Arc<str>);

impl GroupId {
    /// Wraps `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The group name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Honour width and alignment so log columns line up.
        f.pad(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for GroupId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Lets builder and synchronizer constructors take `&GroupId` as well as names.
impl From<&GroupId> for GroupId {
    fn from(id: &GroupId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for GroupId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for GroupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
