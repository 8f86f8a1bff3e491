use std::collections::HashMap;

use anyhow::Result;

use crate::provider::OddsSource;
use crate::state::{OddsEntry, Outcome};

/// Per (match, group) multipliers. Missing entries read as [`OddsEntry::EVEN`].
#[derive(Debug, Clone, Default)]
pub struct OddsTable {
    entries: HashMap<(String, String), OddsEntry>,
}

impl OddsTable {
    /// Stores an entry; non-positive or non-finite multipliers are refused.
    pub fn insert(&mut self, match_id: &str, group_id: &str, entry: OddsEntry) -> bool {
        if !entry.is_valid() {
            return false;
        }
        self.entries
            .insert((match_id.to_string(), group_id.to_string()), entry);
        true
    }

    pub fn remove(&mut self, match_id: &str, group_id: &str) -> Option<OddsEntry> {
        self.entries
            .remove(&(match_id.to_string(), group_id.to_string()))
    }

    pub fn get(&self, match_id: &str, group_id: &str) -> Option<&OddsEntry> {
        self.entries
            .get(&(match_id.to_string(), group_id.to_string()))
    }

    pub fn lookup(&self, match_id: &str, group_id: &str) -> OddsEntry {
        self.get(match_id, group_id).copied().unwrap_or_default()
    }

    pub fn multiplier(&self, match_id: &str, group_id: &str, outcome: Outcome) -> f64 {
        self.lookup(match_id, group_id).multiplier(outcome)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OddsSource for OddsTable {
    fn get_odds(&self, match_id: &str, group_id: &str) -> Result<Option<OddsEntry>> {
        Ok(self.get(match_id, group_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::OddsTable;
    use crate::state::{OddsEntry, Outcome};

    #[test]
    fn missing_group_entry_reads_as_even_odds() {
        let mut table = OddsTable::default();
        table.insert(
            "m1",
            "g1",
            OddsEntry {
                home_win: 2.4,
                draw: 3.1,
                away_win: 2.9,
            },
        );
        assert_eq!(table.multiplier("m1", "g1", Outcome::Draw), 3.1);
        assert_eq!(table.lookup("m1", "g2"), OddsEntry::EVEN);
        assert_eq!(table.multiplier("m2", "g1", Outcome::Away), 1.0);
    }

    #[test]
    fn rejects_non_positive_multipliers() {
        let mut table = OddsTable::default();
        let bad = OddsEntry {
            home_win: 0.0,
            draw: 1.5,
            away_win: 2.0,
        };
        assert!(!table.insert("m1", "g1", bad));
        assert!(table.is_empty());
    }
}
