//! Staged pipelines: each stage is one thread connected to the next by a
//! rendezvous channel of [`IndexedItem`]s.
//!
//! Stages run concurrently with each other (item `k` can be in stage 2 while
//! item `k + 1` is in stage 1); within a stage items are handled in arrival
//! order. The collector puts outputs back in input order.

use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, warn};

use crate::core::error::panic_message;
use crate::core::{EngineError, IndexedItem};
use crate::runtime::spawn_plain;

const STAGE_STACK_SIZE: usize = 2 * 1024 * 1024;

/// A pipeline whose current tail yields `T`.
pub struct Pipeline<T> {
    rx: Receiver<IndexedItem<T>>,
    len: usize,
    stages: Vec<(String, JoinHandle<usize>)>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Start a pipeline that emits `items` in order.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Spawn` if the source thread cannot be started.
    pub fn source(items: Vec<T>) -> Result<Self, EngineError> {
        let len = items.len();
        let (tx, rx) = bounded(0);
        let handle = spawn_plain("pipeline-source".into(), STAGE_STACK_SIZE, move || {
            let mut sent = 0;
            for (index, value) in items.into_iter().enumerate() {
                if tx.send(IndexedItem { index, value }).is_err() {
                    break;
                }
                sent += 1;
            }
            sent
        })?;
        Ok(Self {
            rx,
            len,
            stages: vec![("source".into(), handle)],
        })
    }

    /// Append a stage applying `f` to every item.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Spawn` if the stage thread cannot be started.
    pub fn stage<U, F>(self, name: &str, mut f: F) -> Result<Pipeline<U>, EngineError>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        let Self { rx: input, len, mut stages } = self;
        let (tx, rx) = bounded(0);
        let stage_name = name.to_string();
        let handle = spawn_plain(format!("pipeline-{name}"), STAGE_STACK_SIZE, move || {
            let mut handled = 0;
            for IndexedItem { index, value } in &input {
                if tx.send(IndexedItem { index, value: f(value) }).is_err() {
                    warn!(stage = %stage_name, "Downstream closed, stage stopping");
                    break;
                }
                handled += 1;
            }
            debug!(stage = %stage_name, handled, "Stage finished");
            handled
        })?;
        stages.push((name.to_string(), handle));
        Ok(Pipeline { rx, len, stages })
    }

    /// Drain the pipeline and return outputs in input order.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::WorkerPanicked` if a stage panicked, or
    /// `EngineError::Internal` if an item never reached the end.
    pub fn collect(self) -> Result<Vec<T>, EngineError> {
        let Self { rx, len, stages } = self;
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(len).collect();
        for IndexedItem { index, value } in &rx {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(value);
            }
        }
        drop(rx);

        let mut first_err = None;
        for (name, handle) in stages {
            if let Err(payload) = handle.join() {
                let msg = format!("stage `{name}`: {}", panic_message(payload.as_ref()));
                warn!(error = %msg, "Pipeline stage panicked");
                first_err.get_or_insert(EngineError::WorkerPanicked(msg));
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| EngineError::Internal(format!("item {index} never left the pipeline")))
            })
            .collect()
    }
}
