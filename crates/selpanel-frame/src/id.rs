use std::fmt;

/// Largest catalog the three-digit wire field can address.
pub const MAX_CATALOG_SIZE: u16 = 999;

/// Size of the media catalog, `N`. Valid ids are `1..=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Catalog {
    size: u16,
}

impl Catalog {
    /// Create a catalog of `size` entries.
    ///
    /// Returns `None` for zero or sizes that do not fit the wire format.
    pub fn new(size: u16) -> Option<Self> {
        (1..=MAX_CATALOG_SIZE)
            .contains(&size)
            .then_some(Self { size })
    }

    pub fn size(self) -> u16 {
        self.size
    }

    /// Validate a raw id against this catalog. Out-of-range ids are rejected,
    /// never clamped.
    pub fn media_id(self, raw: u32) -> Option<MediaId> {
        if raw >= 1 && raw <= u32::from(self.size) {
            Some(MediaId(raw as u16))
        } else {
            None
        }
    }

    /// All ids of the catalog in ascending order.
    pub fn ids(self) -> impl Iterator<Item = MediaId> {
        (1..=self.size).map(MediaId)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self { size: 10 }
    }
}

/// A validated media identifier (`1..=N`).
///
/// Displays zero-padded to three digits, the form used on the wire and in
/// asset file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(u16);

impl MediaId {
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}
