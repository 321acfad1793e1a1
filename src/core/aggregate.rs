//! Result aggregation: the single writer that rebuilds input order.

use std::collections::BTreeMap;
use std::fmt;

use crossbeam_channel::Receiver;
use tracing::warn;

use crate::core::{IndexedResult, ItemError};

/// Outcome of a whole batch, keyed by original input index.
///
/// `outputs` and `errors` never share a key, and `success_count` always equals
/// `outputs.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult<O> {
    /// Number of items that produced a value.
    pub success_count: usize,
    /// Values of the items that succeeded.
    pub outputs: BTreeMap<usize, O>,
    /// Errors of the items that failed or were cancelled.
    pub errors: BTreeMap<usize, ItemError>,
}

impl<O> Default for BatchResult<O> {
    fn default() -> Self {
        Self {
            success_count: 0,
            outputs: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }
}

impl<O> BatchResult<O> {
    /// Value produced for `index`, if it succeeded.
    #[must_use]
    pub fn output(&self, index: usize) -> Option<&O> {
        self.outputs.get(&index)
    }

    /// Error recorded for `index`, if it failed or was cancelled.
    #[must_use]
    pub fn error(&self, index: usize) -> Option<&ItemError> {
        self.errors.get(&index)
    }

    /// Items that failed for a reason other than cancellation.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.errors.values().filter(|e| e.is_failure()).count()
    }

    /// Indices reported as cancelled, ascending.
    #[must_use]
    pub fn cancelled_indices(&self) -> Vec<usize> {
        self.errors
            .iter()
            .filter(|(_, e)| e.is_cancelled())
            .map(|(i, _)| *i)
            .collect()
    }

    /// Indices in `0..total` with no recorded outcome.
    #[must_use]
    pub fn missing(&self, total: usize) -> Vec<usize> {
        (0..total)
            .filter(|i| !self.outputs.contains_key(i) && !self.errors.contains_key(i))
            .collect()
    }

    /// Whether every item in `0..total` produced a value.
    #[must_use]
    pub fn is_complete_success(&self, total: usize) -> bool {
        self.errors.is_empty() && self.success_count == total
    }

    /// Successful values in index order, without their indices.
    #[must_use]
    pub fn into_ordered_outputs(self) -> Vec<O> {
        self.outputs.into_values().collect()
    }

    /// A diagnostics view pairing each outcome with its input.
    pub fn display_with<'a, I>(&'a self, inputs: &'a [I]) -> BatchDisplay<'a, I, O> {
        BatchDisplay { result: self, inputs }
    }
}

impl<O: fmt::Debug> fmt::Display for BatchResult<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Success: {}", self.success_count)?;
        for (index, value) in &self.outputs {
            writeln!(f, "[{index}] Out: {value:?}")?;
        }
        writeln!(f, "Fail: {}", self.errors.len())?;
        for (index, err) in &self.errors {
            writeln!(f, "[{index}] Err: {err}")?;
        }
        Ok(())
    }
}

/// Renders a [`BatchResult`] next to the inputs that produced it.
pub struct BatchDisplay<'a, I, O> {
    result: &'a BatchResult<O>,
    inputs: &'a [I],
}

impl<I: fmt::Debug, O: fmt::Debug> fmt::Display for BatchDisplay<'_, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Success: {}", self.result.success_count)?;
        for (index, input) in self.inputs.iter().enumerate() {
            if let Some(out) = self.result.outputs.get(&index) {
                writeln!(f, "In: {input:?} Out: {out:?}")?;
            }
        }
        writeln!(f, "Fail: {}", self.result.errors.len())?;
        for (index, input) in self.inputs.iter().enumerate() {
            if let Some(err) = self.result.errors.get(&index) {
                writeln!(f, "In: {input:?} Err: {err}")?;
            }
        }
        Ok(())
    }
}

/// Incrementally builds a [`BatchResult`].
///
/// Owned by exactly one consumer; producers only ever send [`IndexedResult`]s.
#[derive(Debug)]
pub struct Aggregator<O> {
    expected: usize,
    received: usize,
    result: BatchResult<O>,
}

impl<O> Aggregator<O> {
    /// Start aggregating a batch of `expected` items.
    #[must_use]
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            received: 0,
            result: BatchResult::default(),
        }
    }

    /// Record one result. Out-of-range and duplicate indices are dropped.
    pub fn record(&mut self, item: IndexedResult<O>) {
        let IndexedResult { index, outcome } = item;
        if index >= self.expected {
            warn!(index, expected = self.expected, "Dropping result with out-of-range index");
            return;
        }
        if self.result.outputs.contains_key(&index) || self.result.errors.contains_key(&index) {
            warn!(index, "Dropping duplicate result");
            return;
        }
        self.received += 1;
        match outcome {
            Ok(value) => {
                self.result.success_count += 1;
                self.result.outputs.insert(index, value);
            }
            Err(err) => {
                self.result.errors.insert(index, err);
            }
        }
    }

    /// Results accepted so far.
    #[must_use]
    pub const fn received(&self) -> usize {
        self.received
    }

    /// Successes accepted so far.
    #[must_use]
    pub const fn success_count(&self) -> usize {
        self.result.success_count
    }

    /// Finish the batch.
    #[must_use]
    pub fn finish(self) -> BatchResult<O> {
        if self.received < self.expected {
            warn!(
                received = self.received,
                expected = self.expected,
                "Result stream closed before every item reported"
            );
        }
        self.result
    }
}

/// Drain `stream` until it closes and build the batch result.
pub fn aggregate<O>(stream: &Receiver<IndexedResult<O>>, expected: usize) -> BatchResult<O> {
    let mut aggregator = Aggregator::new(expected);
    for item in stream {
        aggregator.record(item);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_aggregate_restores_order() {
        let (tx, rx) = unbounded();
        for index in [4, 1, 3, 0, 2] {
            let value = (index + 1) * (index + 1);
            tx.send(IndexedResult::ok(index, value)).unwrap();
        }
        drop(tx);

        let result = aggregate(&rx, 5);
        assert_eq!(result.success_count, 5);
        assert_eq!(result.into_ordered_outputs(), vec![1, 4, 9, 16, 25]);
    }

    #[test]
    fn test_errors_and_outputs_disjoint() {
        let mut agg = Aggregator::new(3);
        agg.record(IndexedResult::ok(0, "a"));
        agg.record(IndexedResult::err(1, ItemError::transform("bad")));
        agg.record(IndexedResult::cancelled(2));
        let result = agg.finish();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count(), 1);
        assert_eq!(result.cancelled_indices(), vec![2]);
        assert!(result.outputs.keys().all(|k| !result.errors.contains_key(k)));
        assert!(result.missing(3).is_empty());
    }

    #[test]
    fn test_duplicates_and_out_of_range_ignored() {
        let mut agg = Aggregator::new(2);
        agg.record(IndexedResult::ok(0, 1));
        agg.record(IndexedResult::err(0, ItemError::Cancelled));
        agg.record(IndexedResult::ok(9, 1));
        assert_eq!(agg.received(), 1);
        let result = agg.finish();
        assert_eq!(result.output(0), Some(&1));
        assert_eq!(result.error(0), None);
        assert_eq!(result.missing(2), vec![1]);
    }

    #[test]
    fn test_display_with_inputs() {
        let mut agg = Aggregator::new(2);
        agg.record(IndexedResult::ok(0, 4));
        agg.record(IndexedResult::err(1, ItemError::transform("cannot square 3")));
        let result = agg.finish();

        let rendered = result.display_with(&[2, 3]).to_string();
        assert_eq!(
            rendered,
            "Success: 1\nIn: 2 Out: 4\nFail: 1\nIn: 3 Err: transform failed: cannot square 3\n"
        );
    }

    #[test]
    fn test_display_by_index() {
        let mut agg = Aggregator::new(1);
        agg.record(IndexedResult::ok(0, "x"));
        assert_eq!(agg.finish().to_string(), "Success: 1\n[0] Out: \"x\"\nFail: 0\n");
    }
}
