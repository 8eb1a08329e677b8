use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn flip(self) -> Orientation {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }

    /// The direction new windows are placed in when splitting along this axis.
    pub fn forward(self) -> Direction {
        match self {
            Orientation::Horizontal => Direction::Right,
            Orientation::Vertical => Direction::Down,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Left | Direction::Right => Orientation::Horizontal,
            Direction::Up | Direction::Down => Orientation::Vertical,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// True when the direction points towards higher child indices.
    pub fn is_forward(self) -> bool { matches!(self, Direction::Right | Direction::Down) }

    /// Index of the neighbor of `i` in this direction, if any. Does not wrap.
    pub fn step(self, i: usize, len: usize) -> Option<usize> {
        if self.is_forward() {
            (i + 1 < len).then_some(i + 1)
        } else {
            i.checked_sub(1)
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Horizontal,
    Vertical,
    /// Children share the full rect, only the selected one is shown.
    /// Navigated left/right.
    Tabbed,
    /// Like `Tabbed`, navigated up/down.
    Stacked,
}

impl LayoutKind {
    pub fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Horizontal => LayoutKind::Horizontal,
            Orientation::Vertical => LayoutKind::Vertical,
        }
    }

    pub fn orientation(self) -> Orientation {
        use LayoutKind::*;
        match self {
            Horizontal | Tabbed => Orientation::Horizontal,
            Vertical | Stacked => Orientation::Vertical,
        }
    }

    pub fn is_group(self) -> bool { matches!(self, LayoutKind::Tabbed | LayoutKind::Stacked) }

    pub fn toggle_orientation(self) -> Self {
        use LayoutKind::*;
        match self {
            Horizontal => Vertical,
            Vertical => Horizontal,
            Tabbed => Stacked,
            Stacked => Tabbed,
        }
    }
}
