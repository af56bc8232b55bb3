//! Shared primitive types used across the engine.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stable, unique identifier for any record read from the snapshot.
pub type EntityId = String;

/// A reporting quarter, written `"Q<1-4> <YYYY>"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    // Field order matters: derived Ord sorts by year, then quarter.
    year:    i32,
    quarter: u8,
}

impl Period {
    pub fn new(quarter: u8, year: i32) -> EngineResult<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(EngineError::InvalidPeriod(format!("Q{quarter} {year}")));
        }
        if !(1000..=9999).contains(&year) {
            return Err(EngineError::InvalidPeriod(format!("Q{quarter} {year}")));
        }
        Ok(Self { year, quarter })
    }

    pub fn quarter(&self) -> u8 { self.quarter }
    pub fn year(&self) -> i32   { self.year }

    pub fn previous(&self) -> Self {
        if self.quarter == 1 {
            Self { year: self.year - 1, quarter: 4 }
        } else {
            Self { year: self.year, quarter: self.quarter - 1 }
        }
    }

    pub fn next(&self) -> Self {
        if self.quarter == 4 {
            Self { year: self.year + 1, quarter: 1 }
        } else {
            Self { year: self.year, quarter: self.quarter + 1 }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{} {}", self.quarter, self.year)
    }
}

impl FromStr for Period {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        let invalid = || EngineError::InvalidPeriod(s.to_string());
        let (q, y) = s.split_once(' ').ok_or_else(invalid)?;
        let quarter = q
            .strip_prefix('Q')
            .filter(|d| d.len() == 1)
            .and_then(|d| d.parse::<u8>().ok())
            .ok_or_else(invalid)?;
        if y.len() != 4 || !y.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = y.parse::<i32>().map_err(|_| invalid())?;
        Self::new(quarter, year).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Period {
    type Error = EngineError;

    fn try_from(value: String) -> EngineResult<Self> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.to_string()
    }
}
