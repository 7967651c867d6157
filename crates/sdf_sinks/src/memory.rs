//! In-process sink for `:memory:` runs and regression intermediates.

use sdf_protocol::{ResultSet, TestResult};

use crate::{ResultSink, SinkError, SinkResult};

#[derive(Debug, Default)]
pub struct MemorySink {
    results: ResultSet,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn into_results(self) -> ResultSet {
        self.results
    }
}

impl ResultSink for MemorySink {
    fn append(&mut self, result: &TestResult) -> SinkResult<()> {
        if self.finished {
            return Err(SinkError::Finished);
        }
        self.results.push(result.clone());
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.finished = true;
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.results.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_arrival_order() {
        let mut sink = MemorySink::new();
        sink.append(&TestResult::new("t", "b", "passed")).unwrap();
        sink.append(&TestResult::new("t", "a", "passed")).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.rows_written(), 2);
        let ids: Vec<_> = sink.results().iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(matches!(
            sink.append(&TestResult::new("t", "c", "passed")),
            Err(SinkError::Finished)
        ));
    }
}
