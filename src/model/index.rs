use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A tile column/row within one zoom level. Ordered by `x`, then `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex2D {
    x: i64,
    y: i64,
}

impl TileIndex2D {
    pub const fn of(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub const fn x(&self) -> i64 {
        self.x
    }

    pub const fn y(&self) -> i64 {
        self.y
    }

    /// `None` when either coordinate would leave the `i64` range.
    pub const fn shift_by(&self, dx: i64, dy: i64) -> Option<Self> {
        match (self.x.checked_add(dx), self.y.checked_add(dy)) {
            (Some(x), Some(y)) => Some(Self::of(x, y)),
            _ => None,
        }
    }

    pub const fn at(&self, z: i32) -> TileIndex3D {
        TileIndex3D::new(*self, z)
    }
}

impl fmt::Display for TileIndex2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A tile address: column/row plus zoom level. Ordered by `z`, then index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileIndex3D {
    index: TileIndex2D,
    z: i32,
}

impl TileIndex3D {
    pub const fn new(index: TileIndex2D, z: i32) -> Self {
        Self { index, z }
    }

    pub const fn of(x: i64, y: i64, z: i32) -> Self {
        Self::new(TileIndex2D::of(x, y), z)
    }

    pub const fn index(&self) -> TileIndex2D {
        self.index
    }

    pub const fn x(&self) -> i64 {
        self.index.x
    }

    pub const fn y(&self) -> i64 {
        self.index.y
    }

    pub const fn z(&self) -> i32 {
        self.z
    }
}

impl Ord for TileIndex3D {
    fn cmp(&self, other: &Self) -> Ordering {
        self.z
            .cmp(&other.z)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for TileIndex3D {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileIndex3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.index.x, self.index.y, self.z)
    }
}
