use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GRID_ROWS: u8 = 4;
pub const GRID_COLS: u8 = 3;
pub const CELL_COUNT: usize = (GRID_ROWS * GRID_COLS) as usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellIdError {
    #[error("cell id {0} is outside 1..=12")]
    OutOfRange(i64),
    #[error("cell id '{0}' is not an integer")]
    NotANumber(String),
}

/// Row-major index into the 4x3 board, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "i64")]
pub struct CellId(u8);

impl CellId {
    pub fn new(id: u8) -> Result<Self, CellIdError> {
        Self::try_from(i64::from(id))
    }

    pub fn from_row_col(row: u8, col: u8) -> Option<Self> {
        if row >= GRID_ROWS || col >= GRID_COLS {
            return None;
        }
        Some(Self(row * GRID_COLS + col + 1))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn row(self) -> u8 {
        (self.0 - 1) / GRID_COLS
    }

    pub fn col(self) -> u8 {
        (self.0 - 1) % GRID_COLS
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn is_first_row(self) -> bool {
        self.row() == 0
    }

    pub fn is_last_row(self) -> bool {
        self.row() == GRID_ROWS - 1
    }

    pub fn all() -> impl Iterator<Item = CellId> {
        (1..=CELL_COUNT as u8).map(CellId)
    }
}

impl TryFrom<i64> for CellId {
    type Error = CellIdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (1..=CELL_COUNT as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(CellIdError::OutOfRange(value))
        }
    }
}

impl FromStr for CellId {
    type Err = CellIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| CellIdError::NotANumber(s.to_string()))?;
        Self::try_from(value)
    }
}

impl From<CellId> for u8 {
    fn from(value: CellId) -> Self {
        value.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    #[default]
    Empty,
    Real,
    Fake,
    R1,
}

impl CellType {
    /// `Fake` cells can never be entered.
    pub fn is_traversable(self) -> bool {
        !matches!(self, CellType::Fake)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown cell type '{0}'")]
pub struct UnknownCellType(pub String);

impl FromStr for CellType {
    type Err = UnknownCellType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Empty" => Ok(CellType::Empty),
            "Real" => Ok(CellType::Real),
            "Fake" => Ok(CellType::Fake),
            "R1" => Ok(CellType::R1),
            other => Err(UnknownCellType(other.to_string())),
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellType::Empty => "Empty",
            CellType::Real => "Real",
            CellType::Fake => "Fake",
            CellType::R1 => "R1",
        };
        f.write_str(name)
    }
}

/// Ordered, non-repeating walk from a first-row cell to a last-row cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(Vec<CellId>);

impl Route {
    pub fn cells(&self) -> &[CellId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().map(|cell| cell.get()).collect()
    }
}

impl From<Vec<CellId>> for Route {
    fn from(value: Vec<CellId>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, cell) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{cell}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_and_col_follow_row_major_layout() {
        let cell = CellId::new(8).expect("cell");
        assert_eq!(cell.row(), 2);
        assert_eq!(cell.col(), 1);
        assert_eq!(CellId::from_row_col(2, 1), Some(cell));
        assert_eq!(CellId::from_row_col(4, 0), None);
        assert_eq!(CellId::from_row_col(0, 3), None);
    }

    #[test]
    fn rejects_out_of_range_ids() {
        assert_eq!(CellId::new(0), Err(CellIdError::OutOfRange(0)));
        assert_eq!(CellId::new(13), Err(CellIdError::OutOfRange(13)));
        assert!(matches!(
            "x".parse::<CellId>(),
            Err(CellIdError::NotANumber(_))
        ));
        assert_eq!(" 12 ".parse::<CellId>().expect("cell").get(), 12);
    }

    #[test]
    fn cell_id_serializes_as_plain_number() {
        let cell = CellId::new(5).expect("cell");
        assert_eq!(serde_json::to_string(&cell).expect("json"), "5");
        let parsed: CellId = serde_json::from_str("11").expect("parse");
        assert_eq!(parsed.get(), 11);
        assert!(serde_json::from_str::<CellId>("42").is_err());
    }

    #[test]
    fn cell_type_names_match_wire_names() {
        for name in ["Empty", "Real", "Fake", "R1"] {
            let parsed: CellType = name.parse().expect("type");
            assert_eq!(parsed.to_string(), name);
        }
        assert!("Blue".parse::<CellType>().is_err());
        assert!(!CellType::Fake.is_traversable());
        assert!(CellType::R1.is_traversable());
    }
}
