//! Fixed-width bit tags for approximate, content-addressable references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits in a [`Tag`].
pub const TAG_WIDTH: u32 = 16;

/// A 16-bit label attached to instructions and modules.
///
/// Tags are never compared for exact equality at dispatch time; call sites
/// reference modules by *similarity* (Hamming distance), so a mutated tag
/// still resolves to the nearest surviving module.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tag(u16);

impl Tag {
    pub const fn new(bits: u16) -> Self {
        Tag(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Number of differing bits between two tags.
    pub fn hamming(self, other: Tag) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Copy of this tag with one bit flipped. Handy for building
    /// near-miss tags in tests and mutation operators.
    pub fn toggle(self, bit: u32) -> Tag {
        debug_assert!(bit < TAG_WIDTH);
        Tag(self.0 ^ (1u16 << bit))
    }
}

impl From<u16> for Tag {
    fn from(bits: u16) -> Self {
        Tag(bits)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016b}", self.0)
    }
}
