//! Positional tagging: carry each payload's original index through unordered channels.

use crate::core::ItemError;

/// An input paired with its position in the original batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedItem<T> {
    /// Position in the original input sequence; unique within one batch.
    pub index: usize,
    /// The payload.
    pub value: T,
}

/// The outcome for one input, tagged with that input's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedResult<O> {
    /// Position of the input this result belongs to.
    pub index: usize,
    /// Value on success, the item's error otherwise.
    pub outcome: Result<O, ItemError>,
}

impl<O> IndexedResult<O> {
    /// A successful result.
    pub const fn ok(index: usize, value: O) -> Self {
        Self { index, outcome: Ok(value) }
    }

    /// A failed result.
    pub const fn err(index: usize, error: ItemError) -> Self {
        Self { index, outcome: Err(error) }
    }

    /// Result for an item skipped because the batch was cancelled.
    pub const fn cancelled(index: usize) -> Self {
        Self::err(index, ItemError::Cancelled)
    }

    /// Whether the item produced a value.
    pub const fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Zip a sequence with `0..n`, preserving order.
pub fn tag<T>(items: Vec<T>) -> Vec<IndexedItem<T>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, value)| IndexedItem { index, value })
        .collect()
}
