use derive_more::Display;
use std::num::NonZeroI64;
use std::str::FromStr;

/// Stable primary key of a bundle.
///
/// Bundle ids are always positive; zero and negative values are rejected at
/// construction, so anything holding a `BundleId` can format it straight
/// into a file name.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{_0}")]
pub struct BundleId(NonZeroI64);

impl BundleId {
    pub fn new(id: i64) -> Option<Self> {
        if id <= 0 {
            return None;
        }
        NonZeroI64::new(id).map(Self)
    }

    pub fn get(self) -> i64 {
        self.0.get()
    }
}

impl From<BundleId> for i64 {
    fn from(id: BundleId) -> Self {
        id.get()
    }
}

impl FromStr for BundleId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().ok().and_then(Self::new).ok_or(())
    }
}
