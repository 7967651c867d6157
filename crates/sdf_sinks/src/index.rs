//! `(test, record_id)` lookups over a current run's results.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use sdf_protocol::TestResult;

use crate::SinkResult;

/// Outcome lookup by test name and record id.
///
/// A test that produced the same id twice resolves to the first stored row.
pub trait RecordIndex {
    fn lookup(&self, test_name: &str, record_id: &str) -> SinkResult<Option<String>>;
}

/// Hash index over an in-memory result set.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    outcomes: HashMap<(String, String), String>,
    duplicates: usize,
}

impl MemoryIndex {
    pub fn build<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a TestResult>,
    {
        let mut index = Self::default();
        for result in results {
            let key = (result.test_name.clone(), result.record_id.clone());
            match index.outcomes.entry(key) {
                Entry::Occupied(_) => index.duplicates += 1,
                Entry::Vacant(slot) => {
                    slot.insert(result.outcome.clone());
                }
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Rows skipped because their test already produced that id.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

impl RecordIndex for MemoryIndex {
    fn lookup(&self, test_name: &str, record_id: &str) -> SinkResult<Option<String>> {
        Ok(self
            .outcomes
            .get(&(test_name.to_string(), record_id.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdf_protocol::ResultSet;

    #[test]
    fn test_first_arrival_wins() {
        let set: ResultSet = vec![
            TestResult::new("t", "a", "one"),
            TestResult::new("t", "b", "two"),
            TestResult::new("t", "a", "three"),
        ]
        .into();

        let index = MemoryIndex::build(&set);
        assert_eq!(index.len(), 2);
        assert_eq!(index.duplicates(), 1);
        assert_eq!(index.lookup("t", "a").unwrap().as_deref(), Some("one"));
        assert_eq!(index.lookup("t", "zzz").unwrap(), None);
    }

    #[test]
    fn test_same_id_under_different_tests_is_not_a_duplicate() {
        let set: ResultSet = vec![
            TestResult::new("formula", "m1", "C2H6"),
            TestResult::new("length", "m1", "164"),
        ]
        .into();

        let index = MemoryIndex::build(&set);
        assert_eq!(index.len(), 2);
        assert_eq!(index.duplicates(), 0);
        assert_eq!(index.lookup("formula", "m1").unwrap().as_deref(), Some("C2H6"));
        assert_eq!(index.lookup("length", "m1").unwrap().as_deref(), Some("164"));
        assert_eq!(index.lookup("other", "m1").unwrap(), None);
    }
}
