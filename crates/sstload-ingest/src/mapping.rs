//! Field mapping table
//!
//! Parses `name1:idx1,name2:idx2,...` into an ordered column → field position
//! table. Entry order is kept; duplicate names are rejected.

use std::collections::HashSet;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("entry '{0}' is missing ':' between column name and field index")]
    MissingColon(String),

    #[error("entry '{0}' has an empty column name")]
    EmptyColumnName(String),

    #[error("entry '{entry}' has an invalid field index: {source}")]
    InvalidIndex {
        entry: String,
        #[source]
        source: ParseIntError,
    },

    #[error("column '{0}' is mapped more than once")]
    DuplicateColumn(String),
}

/// Ordered association between column names and field positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(String, usize)>,
}

impl FieldMapping {
    pub fn parse(text: &str) -> Result<Self, MappingError> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for entry in text.split(',') {
            let (name, index) = entry
                .split_once(':')
                .ok_or_else(|| MappingError::MissingColon(entry.to_string()))?;

            if name.is_empty() {
                return Err(MappingError::EmptyColumnName(entry.to_string()));
            }

            let index = index.parse::<usize>().map_err(|source| MappingError::InvalidIndex {
                entry: entry.to_string(),
                source,
            })?;

            if !seen.insert(name) {
                return Err(MappingError::DuplicateColumn(name.to_string()));
            }

            entries.push((name.to_string(), index));
        }

        Ok(Self { entries })
    }

    /// Field position mapped to `column`
    pub fn get(&self, column: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, index)| *index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(name, index)| (name.as_str(), *index))
    }

    /// Column names in the order they were given
    pub fn columns(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest field index referenced; a line needs at least this many + 1 fields
    pub fn max_index(&self) -> Option<usize> {
        self.entries.iter().map(|(_, index)| *index).max()
    }
}

impl FromStr for FieldMapping {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_preserves_order() {
        let mapping = FieldMapping::parse("seen:2,id:0,tags:1").unwrap();
        assert_eq!(mapping.columns(), ["seen", "id", "tags"]);
        assert_eq!(mapping.get("id"), Some(0));
        assert_eq!(mapping.get("tags"), Some(1));
        assert_eq!(mapping.get("missing"), None);
        assert_eq!(mapping.max_index(), Some(2));
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn test_same_index_for_two_columns_is_allowed() {
        let mapping: FieldMapping = "a:0,b:0".parse().unwrap();
        assert_eq!(mapping.iter().collect::<Vec<_>>(), [("a", 0), ("b", 0)]);
    }

    #[test]
    fn test_missing_colon() {
        assert_eq!(
            FieldMapping::parse("id:0,tags").unwrap_err(),
            MappingError::MissingColon("tags".to_string())
        );
        assert!(matches!(FieldMapping::parse(""), Err(MappingError::MissingColon(_))));
    }

    #[test]
    fn test_invalid_index() {
        for text in ["id:x", "id:-1", "id:", "id:1:2", "id: 1"] {
            assert!(
                matches!(FieldMapping::parse(text), Err(MappingError::InvalidIndex { .. })),
                "{text} should fail"
            );
        }
    }

    #[test]
    fn test_empty_name() {
        assert!(matches!(FieldMapping::parse(":1"), Err(MappingError::EmptyColumnName(_))));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        assert_eq!(
            FieldMapping::parse("id:0,name:1,id:2").unwrap_err(),
            MappingError::DuplicateColumn("id".to_string())
        );
    }

    proptest! {
        #[test]
        fn prop_round_trip(entries in proptest::collection::btree_map("[a-z_][a-z0-9_]{0,8}", 0usize..500, 1..16)) {
            let text = entries
                .iter()
                .map(|(name, index)| format!("{name}:{index}"))
                .collect::<Vec<_>>()
                .join(",");
            let mapping = FieldMapping::parse(&text).unwrap();

            prop_assert_eq!(mapping.len(), entries.len());
            for (name, index) in &entries {
                prop_assert_eq!(mapping.get(name), Some(*index));
            }
        }
    }
}
