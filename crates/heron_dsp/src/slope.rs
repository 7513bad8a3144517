//! Cut Filter Slopes
//!
//! Each slope step adds one cascaded 2nd-order section, i.e. 12 dB/octave.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DspError;

/// Number of biquad sections available to a cut filter
pub const MAX_CUT_STAGES: usize = 4;

/// Roll-off steepness of a low-cut or high-cut filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Slope {
    #[default]
    Db12,
    Db24,
    Db36,
    Db48,
}

impl Slope {
    /// All slopes in ascending order (matches the choice index)
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    /// Choice labels shown by the parameter store, indexed like `ALL`
    pub const LABELS: [&'static str; 4] = ["12 db/Oct", "24 db/Oct", "36 db/Oct", "48 db/Oct"];

    /// Position of this slope in `ALL` (0..=3)
    pub fn index(self) -> usize {
        match self {
            Slope::Db12 => 0,
            Slope::Db24 => 1,
            Slope::Db36 => 2,
            Slope::Db48 => 3,
        }
    }

    pub fn from_index(index: usize) -> Result<Self, DspError> {
        Self::ALL.get(index).copied().ok_or(DspError::InvalidChoiceIndex {
            index,
            count: Self::ALL.len(),
        })
    }

    pub fn db_per_octave(self) -> u32 {
        12 * self.stage_count() as u32
    }

    pub fn from_db_per_octave(db: u32) -> Result<Self, DspError> {
        match db {
            12 => Ok(Slope::Db12),
            24 => Ok(Slope::Db24),
            36 => Ok(Slope::Db36),
            48 => Ok(Slope::Db48),
            other => Err(DspError::InvalidSlope(other)),
        }
    }

    /// Number of active cascade stages (= filter order / 2)
    #[inline]
    pub fn stage_count(self) -> usize {
        self.index() + 1
    }

    pub fn label(self) -> &'static str {
        Self::LABELS[self.index()]
    }
}

impl fmt::Display for Slope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
