//! Misconception taxonomy store.
//!
//! The taxonomy is the fixed catalogue every prediction is retrieved against.
//! It is loaded once from a two-column CSV (`MisconceptionId`,
//! `MisconceptionName`) and is read-only afterwards. Row order is preserved:
//! the search stages address misconceptions by row index and map back to ids
//! through [`Taxonomy::id_at`].

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Stable identifier of a misconception in the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MisconceptionId(u32);

impl MisconceptionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Parses an id cell, accepting float formatting (`"1672.0"`) as written
    /// by dataframe exports. Empty cells are `Ok(None)`.
    pub fn parse_cell(cell: &str) -> Result<Option<Self>, String> {
        let cell = cell.trim();
        if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        if let Ok(id) = cell.parse::<u32>() {
            return Ok(Some(Self(id)));
        }
        match cell.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => {
                Ok(Some(Self(v as u32)))
            }
            _ => Err(cell.to_string()),
        }
    }
}

impl fmt::Display for MisconceptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A taxonomy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misconception {
    pub id: MisconceptionId,
    pub text: String,
}

impl Misconception {
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id: MisconceptionId(id),
            text: text.into(),
        }
    }
}

/// Read-only misconception catalogue.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    /// Entries in file order
    rows: Vec<Misconception>,
    /// id -> row index
    by_id: HashMap<MisconceptionId, usize>,
}

impl Taxonomy {
    /// Number of semantic columns in the taxonomy file.
    pub const COLUMNS: usize = 2;

    /// Loads the taxonomy from a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// - [`LoadError::Io`] if the file is missing or unreadable
    /// - [`LoadError::ColumnCount`] if the header does not have exactly two columns
    /// - [`LoadError::InvalidId`] / [`LoadError::DuplicateId`] for bad id cells
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let taxonomy = Self::from_reader(file)?;
        info!(
            "Loaded {} misconceptions from {}",
            taxonomy.len(),
            path.display()
        );
        Ok(taxonomy)
    }

    /// Parses the taxonomy from any CSV source (header row required).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header_len = csv_reader.headers()?.len();
        if header_len != Self::COLUMNS {
            return Err(LoadError::ColumnCount {
                expected: Self::COLUMNS,
                found: header_len,
            });
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.len() != Self::COLUMNS {
                return Err(LoadError::ColumnCount {
                    expected: Self::COLUMNS,
                    found: record.len(),
                });
            }

            let raw_id = &record[0];
            let id = match MisconceptionId::parse_cell(raw_id) {
                Ok(Some(id)) => id,
                Ok(None) | Err(_) => {
                    return Err(LoadError::InvalidId {
                        value: raw_id.to_string(),
                        line,
                    })
                }
            };
            rows.push(Misconception {
                id,
                text: record[1].trim().to_string(),
            });
        }

        debug!("Parsed {} taxonomy rows", rows.len());
        Self::from_rows(rows)
    }

    /// Builds a taxonomy from in-memory entries, rejecting duplicate ids.
    pub fn from_rows(rows: Vec<Misconception>) -> Result<Self, LoadError> {
        let mut by_id = HashMap::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if by_id.insert(row.id, idx).is_some() {
                return Err(LoadError::DuplicateId(row.id.as_u32()));
            }
        }
        Ok(Self { rows, by_id })
    }

    /// Number of misconceptions.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a misconception by id.
    ///
    /// # Returns
    ///
    /// The entry, or `None` if the id is not in the taxonomy.
    pub fn get(&self, id: MisconceptionId) -> Option<&Misconception> {
        self.by_id.get(&id).map(|&idx| &self.rows[idx])
    }

    /// Whether `id` is a known misconception.
    pub fn contains(&self, id: MisconceptionId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Returns the description text for an id.
    pub fn text(&self, id: MisconceptionId) -> Option<&str> {
        self.get(id).map(|m| m.text.as_str())
    }

    /// Returns the entry at a row index (file order, zero-based).
    pub fn row(&self, idx: usize) -> Option<&Misconception> {
        self.rows.get(idx)
    }

    /// Returns the id stored at a row index.
    ///
    /// The search stages work on row indices; this maps their output back to
    /// taxonomy ids. `None` for an out-of-range index.
    pub fn id_at(&self, idx: usize) -> Option<MisconceptionId> {
        self.rows.get(idx).map(|m| m.id)
    }

    /// Returns the row index of an id.
    pub fn position(&self, id: MisconceptionId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// Iterates entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Misconception> {
        self.rows.iter()
    }

    /// All entries as a slice, in file order.
    pub fn rows(&self) -> &[Misconception] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "MisconceptionId,MisconceptionName\n\
        0,\"Does not know that angles in a triangle sum to 180 degrees\"\n\
        1,\"Uses dividing fractions method for multiplying fractions\"\n\
        2,\"Believes there are 100 degrees in a full turn\"\n";

    #[test]
    fn test_load_preserves_row_order() {
        let taxonomy = Taxonomy::from_reader(SAMPLE.as_bytes()).unwrap();

        assert_eq!(taxonomy.len(), 3);
        assert_eq!(taxonomy.id_at(0), Some(MisconceptionId::new(0)));
        assert_eq!(taxonomy.id_at(2), Some(MisconceptionId::new(2)));
        assert_eq!(
            taxonomy.text(MisconceptionId::new(1)),
            Some("Uses dividing fractions method for multiplying fractions")
        );
        assert_eq!(taxonomy.position(MisconceptionId::new(2)), Some(2));
    }

    #[test]
    fn test_wrong_column_count_rejected() {
        let data = "MisconceptionId,MisconceptionName,Extra\n1,foo,bar\n";
        let result = Taxonomy::from_reader(data.as_bytes());

        assert!(matches!(
            result,
            Err(LoadError::ColumnCount {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_short_row_rejected() {
        let data = "MisconceptionId,MisconceptionName\n1\n";
        let result = Taxonomy::from_reader(data.as_bytes());

        assert!(matches!(result, Err(LoadError::ColumnCount { .. })));
    }

    #[test]
    fn test_invalid_id_rejected() {
        let data = "MisconceptionId,MisconceptionName\nabc,foo\n";
        let result = Taxonomy::from_reader(data.as_bytes());

        assert!(matches!(result, Err(LoadError::InvalidId { .. })));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let rows = vec![Misconception::new(7, "a"), Misconception::new(7, "b")];

        assert!(matches!(
            Taxonomy::from_rows(rows),
            Err(LoadError::DuplicateId(7))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Taxonomy::load(Path::new("/nonexistent/misconception_mapping.csv"));

        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_parse_cell_variants() {
        assert_eq!(
            MisconceptionId::parse_cell("1672"),
            Ok(Some(MisconceptionId::new(1672)))
        );
        assert_eq!(
            MisconceptionId::parse_cell(" 1672.0 "),
            Ok(Some(MisconceptionId::new(1672)))
        );
        assert_eq!(MisconceptionId::parse_cell(""), Ok(None));
        assert_eq!(MisconceptionId::parse_cell("NaN"), Ok(None));
        assert!(MisconceptionId::parse_cell("1.5").is_err());
        assert!(MisconceptionId::parse_cell("-3").is_err());
    }

    #[test]
    fn test_unknown_id_lookup() {
        let taxonomy = Taxonomy::from_reader(SAMPLE.as_bytes()).unwrap();

        assert!(taxonomy.get(MisconceptionId::new(99)).is_none());
        assert!(!taxonomy.contains(MisconceptionId::new(99)));
        assert!(taxonomy.row(99).is_none());
    }
}
