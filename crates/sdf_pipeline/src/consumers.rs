//! Built-in test functions and the suites the CLI runs.

use sdf_protocol::defaults::PASSED;
use sdf_protocol::{Record, TestError};
use sdf_worker::TestSuite;

use crate::ids::IdSource;
use crate::molfile;

pub const INVARIANCE_TEST: &str = "invariance";
pub const CANONICALIZATION_TEST: &str = "canonicalization";

/// Renumbering the atoms must not change the canonical summary.
///
/// An unreadable molfile is a failed outcome for that record, not a fatal error.
pub fn permutation_invariance(record: &Record) -> Result<String, TestError> {
    let molecule = molfile::parse(record.text())
        .map_err(|e| TestError::failed(format!("unreadable molfile: {}", e)))?;

    let original = molecule.canonical_summary();
    let permuted = molecule.reversed().canonical_summary();
    if original != permuted {
        return Err(TestError::failed(format!(
            "canonical form changed under atom permutation: '{}' != '{}'",
            original, permuted
        )));
    }
    Ok(PASSED.to_string())
}

/// The canonical summary itself, for comparison against a reference run.
pub fn canonicalization(record: &Record) -> Result<String, TestError> {
    molfile::parse(record.text())
        .map(|molecule| molecule.canonical_summary())
        .map_err(|e| TestError::failed(format!("unreadable molfile: {}", e)))
}

pub fn invariance_suite(ids: &IdSource) -> Result<TestSuite, regex::Error> {
    Ok(TestSuite::new(ids.extractor()?).register(INVARIANCE_TEST, permutation_invariance))
}

pub fn regression_suite(ids: &IdSource) -> Result<TestSuite, regex::Error> {
    Ok(TestSuite::new(ids.extractor()?).register(CANONICALIZATION_TEST, canonicalization))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molfile::tests::ETHANOL;

    #[test]
    fn test_invariance_passes_for_valid_molfile() {
        assert_eq!(
            permutation_invariance(&Record::new(0, ETHANOL)).unwrap(),
            "passed"
        );
    }

    #[test]
    fn test_unreadable_molfile_is_a_failed_outcome() {
        let err = permutation_invariance(&Record::new(0, "garbage\n")).unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("unreadable molfile"));
    }

    #[test]
    fn test_absurd_counts_line_is_a_failed_outcome() {
        let record = Record::new(0, "mol\n  prog\n\n1 99999999999999\nM  END\n");
        let err = canonicalization(&record).unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("unreadable molfile: malformed counts line"));
    }

    #[test]
    fn test_canonicalization_is_deterministic() {
        let record = Record::new(3, ETHANOL);
        assert_eq!(
            canonicalization(&record).unwrap(),
            canonicalization(&record).unwrap()
        );
    }

    #[test]
    fn test_suites_register_one_test_each() {
        assert_eq!(
            invariance_suite(&IdSource::Mcule).unwrap().test_names(),
            vec!["invariance"]
        );
        assert_eq!(
            regression_suite(&IdSource::Pubchem).unwrap().test_names(),
            vec!["canonicalization"]
        );
    }
}
