//! Compression worker pool
//!
//! A bounded dispatch-and-join: every page becomes one task on a shared
//! queue, at most `workers` scoped threads drain it, and the call returns
//! only after all of them have finished. Results are put back in input
//! order regardless of completion order.

use crossbeam::channel;

use crate::config::Compression;
use crate::error::{AtlasError, Result};
use crate::page::{Page, SealedPage};

#[derive(Debug, Clone, Copy)]
pub struct CompressionPool {
    workers: usize,
}

impl CompressionPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Seal `pages` concurrently, returning them in input order
    ///
    /// If several tasks fail, the error of the earliest page is returned.
    pub fn seal_all(
        &self,
        pages: Vec<Page>,
        compression: Compression,
        max_size: usize,
    ) -> Result<Vec<SealedPage>> {
        let n_tasks = pages.len();
        if n_tasks == 0 {
            return Ok(Vec::new());
        }

        let (task_tx, task_rx) = channel::unbounded::<(usize, Page)>();
        let (result_tx, result_rx) = channel::unbounded::<(usize, Result<SealedPage>)>();
        for task in pages.into_iter().enumerate() {
            task_tx
                .send(task)
                .map_err(|_| AtlasError::WriteFailure("compression queue closed".to_string()))?;
        }
        drop(task_tx);

        let n_threads = self.workers.min(n_tasks);
        crossbeam::scope(|s| {
            for _ in 0..n_threads {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                s.spawn(move |_| {
                    for (index, page) in task_rx.iter() {
                        let sealed = page.seal(compression, max_size);
                        if result_tx.send((index, sealed)).is_err() {
                            break;
                        }
                    }
                });
            }
        })
        .map_err(|_| AtlasError::WriteFailure("compression task panicked".to_string()))?;
        drop(result_tx);

        let mut slots: Vec<Option<Result<SealedPage>>> = (0..n_tasks).map(|_| None).collect();
        for (index, result) in result_rx.iter() {
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(AtlasError::WriteFailure(format!(
                        "compression task {} produced no result",
                        index
                    )))
                })
            })
            .collect()
    }
}
