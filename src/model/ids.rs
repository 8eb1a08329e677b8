use std::fmt;

use serde::{Deserialize, Serialize};

/// An identifier for one client surface.
///
/// Assigned by the compositor; never reused while the window is mapped.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl WindowId {
    pub const fn new(id: u64) -> Self { WindowId(id) }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "w{}", self.0) }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(pub u32);

impl OutputId {
    pub const fn new(id: u32) -> Self { OutputId(id) }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "output-{}", self.0) }
}
