//! Work queue shared by the time slicer and the batch slicer

use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;
use tracing::warn;

use crate::error::SchedError;

pub(crate) type ProcessFn<T> = Box<dyn FnMut(T) -> eyre::Result<()>>;
pub(crate) type CompleteFn = Box<dyn FnOnce(DrainSummary)>;

/// Called with each failure as it happens, shared by every run of a slicer
pub(crate) type ErrorHook = Rc<dyn Fn(&SchedError)>;

/// Outcome of a finished drain, handed to the completion callback
#[derive(Debug, Default, Serialize)]
pub struct DrainSummary {
    /// Items handed to the process callback
    pub processed: usize,
    /// Ticks it took to drain the queue
    pub ticks: u64,
    /// Items whose processing returned an error
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<SchedError>,
}

impl DrainSummary {
    /// Number of items processed without error
    pub fn succeeded(&self) -> usize {
        self.processed - self.failures.len()
    }
}

fn serialize_failures<S: serde::Serializer>(failures: &[SchedError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(failures.iter().map(|f| f.to_string()))
}

/// Owned copy of the caller's items, consumed from the front
pub(crate) struct WorkQueue<T> {
    items: VecDeque<T>,
    next_index: usize,
    process: ProcessFn<T>,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorHook>,
    failures: Vec<SchedError>,
}

impl<T> WorkQueue<T> {
    pub(crate) fn new(items: impl IntoIterator<Item = T>, process: ProcessFn<T>, on_complete: CompleteFn) -> Self {
        Self {
            items: items.into_iter().collect(),
            next_index: 0,
            process,
            on_complete: Some(on_complete),
            on_error: None,
            failures: Vec::new(),
        }
    }

    pub(crate) fn with_error_hook(mut self, hook: Option<ErrorHook>) -> Self {
        self.on_error = hook;
        self
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Process the front item; a failing item is recorded, never retried
    pub(crate) fn process_next(&mut self) -> bool {
        let Some(item) = self.items.pop_front() else {
            return false;
        };
        let index = self.next_index;
        self.next_index += 1;

        if let Err(report) = (self.process)(item) {
            let err = SchedError::processing(index, &report);
            warn!(index, error = %err, "WorkQueue::process_next: item failed, continuing");
            if let Some(hook) = &self.on_error {
                hook(&err);
            }
            self.failures.push(err);
        }
        true
    }

    /// Take the completion callback and the summary, once
    pub(crate) fn finish(&mut self, ticks: u64) -> Option<(CompleteFn, DrainSummary)> {
        let on_complete = self.on_complete.take()?;
        let summary = DrainSummary {
            processed: self.next_index,
            ticks,
            failures: std::mem::take(&mut self.failures),
        };
        Some((on_complete, summary))
    }
}
