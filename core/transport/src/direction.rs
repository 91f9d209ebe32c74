/// Temporal order in which successive pulls consume file frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub const fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse)
    }

    pub const fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }

    /// Encoding used when the direction is published through an atomic.
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Forward => 0,
            Self::Reverse => 1,
        }
    }

    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Reverse,
            _ => Self::Forward,
        }
    }
}
