//! Frame headers and data-source tags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

/// A hardware data source that delivers frames independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataSource {
    /// Left imager, luminance plane.
    LumaLeft,
    /// Right imager, luminance plane.
    LumaRight,
    /// Left imager, chrominance plane.
    ChromaLeft,
    /// Right imager, chrominance plane.
    ChromaRight,
    /// Stereo disparity map (16-bit, 1/16 pixel units).
    Disparity,
    /// Per-pixel stereo matching cost.
    DisparityCost,
}

impl DataSource {
    /// Every source, in bit order.
    pub const ALL: [DataSource; 6] = [
        DataSource::LumaLeft,
        DataSource::LumaRight,
        DataSource::ChromaLeft,
        DataSource::ChromaRight,
        DataSource::Disparity,
        DataSource::DisparityCost,
    ];

    /// The bit this source occupies in a [`SourceMask`].
    #[must_use]
    pub const fn bit(self) -> u32 {
        match self {
            Self::LumaLeft => 1 << 0,
            Self::LumaRight => 1 << 1,
            Self::ChromaLeft => 1 << 2,
            Self::ChromaRight => 1 << 3,
            Self::Disparity => 1 << 4,
            Self::DisparityCost => 1 << 5,
        }
    }

    /// Short lowercase name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LumaLeft => "luma_left",
            Self::LumaRight => "luma_right",
            Self::ChromaLeft => "chroma_left",
            Self::ChromaRight => "chroma_right",
            Self::Disparity => "disparity",
            Self::DisparityCost => "disparity_cost",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`DataSource`]s, used for callback registration and stream control.
///
/// # Example
///
/// ```
/// use stereo_sync::{DataSource, SourceMask};
///
/// let mask = DataSource::LumaLeft | DataSource::ChromaLeft;
/// assert!(mask.contains(DataSource::ChromaLeft));
/// assert!(!mask.contains(DataSource::Disparity));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceMask(u32);

impl SourceMask {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a mask from raw bits. Bits that name no source are kept verbatim.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if `source` is a member.
    #[must_use]
    pub const fn contains(self, source: DataSource) -> bool {
        self.0 & source.bit() != 0
    }

    /// Returns `true` if every member of `other` is also a member of `self`.
    #[must_use]
    pub const fn contains_all(self, other: SourceMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no source is a member.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Adds a source to the set.
    pub fn insert(&mut self, source: DataSource) {
        self.0 |= source.bit();
    }

    /// Iterates over the member sources in bit order.
    pub fn iter(self) -> impl Iterator<Item = DataSource> {
        DataSource::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl From<DataSource> for SourceMask {
    fn from(source: DataSource) -> Self {
        Self(source.bit())
    }
}

impl FromIterator<DataSource> for SourceMask {
    fn from_iter<I: IntoIterator<Item = DataSource>>(iter: I) -> Self {
        let mut mask = Self::empty();
        for source in iter {
            mask.insert(source);
        }
        mask
    }
}

impl BitOr for DataSource {
    type Output = SourceMask;

    fn bitor(self, rhs: Self) -> SourceMask {
        SourceMask(self.bit() | rhs.bit())
    }
}

impl BitOr<DataSource> for SourceMask {
    type Output = SourceMask;

    fn bitor(self, rhs: DataSource) -> SourceMask {
        SourceMask(self.0 | rhs.bit())
    }
}

impl BitOr for SourceMask {
    type Output = SourceMask;

    fn bitor(self, rhs: Self) -> SourceMask {
        SourceMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for SourceMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for SourceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(DataSource::name).collect();
        write!(f, "[{}]", names.join("|"))
    }
}

/// Metadata for one image delivered by the channel, plus a reference to its pixels.
///
/// `FrameHeader` is the unit of data passed through the crate. Cloning is cheap:
/// the metadata is copied and the pixel data, held in an `Arc<[u8]>`, is shared.
/// The bytes themselves belong to the channel's buffer pool; a header is only
/// guaranteed to describe reserved memory while the slot that stored it still
/// holds its [`BufferHandle`](crate::BufferHandle).
///
/// # Example
///
/// ```
/// use stereo_sync::{DataSource, FrameHeader};
///
/// let header = FrameHeader::new(DataSource::LumaLeft, 7, 4, 2, 8, vec![0u8; 8]);
/// assert_eq!(header.frame_id, 7);
/// assert!(!header.is_sentinel());
///
/// let copy = header.clone(); // shares pixel data
/// assert_eq!(copy.data.len(), 8);
/// ```
#[derive(Clone)]
pub struct FrameHeader {
    /// Capture-instant identifier, comparable across sources of one sensor.
    pub frame_id: i64,
    /// Which source produced this frame.
    pub source: DataSource,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bits per pixel of `data`.
    pub bits_per_pixel: u32,
    /// Pixel bytes, owned by the channel's pool.
    pub data: Arc<[u8]>,
}

impl FrameHeader {
    /// Frame id of an empty slot. Real frames never carry a negative id.
    pub const SENTINEL_FRAME_ID: i64 = -1;

    /// Creates a header for a delivered frame.
    pub fn new(
        source: DataSource,
        frame_id: i64,
        width: u32,
        height: u32,
        bits_per_pixel: u32,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            frame_id,
            source,
            width,
            height,
            bits_per_pixel,
            data: data.into(),
        }
    }

    /// Creates the placeholder header an empty slot starts with.
    pub fn sentinel(source: DataSource) -> Self {
        Self {
            frame_id: Self::SENTINEL_FRAME_ID,
            source,
            width: 0,
            height: 0,
            bits_per_pixel: 0,
            data: Arc::from(Vec::<u8>::new()),
        }
    }

    /// Returns `true` for the empty-slot placeholder.
    pub fn is_sentinel(&self) -> bool {
        self.frame_id < 0
    }

    /// Number of pixels described by the header.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Expected byte length of `data` given the dimensions and depth.
    pub fn expected_len(&self) -> usize {
        (self.pixel_count() * self.bits_per_pixel as usize).div_ceil(8)
    }
}

impl fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHeader")
            .field("frame_id", &self.frame_id)
            .field("source", &self.source)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bits_per_pixel", &self.bits_per_pixel)
            .field("data (bytes)", &self.data.len())
            .finish()
    }
}
