//! Collective-communication context shared by the workers of one call.
//!
//! Workers only interact through the collectives defined here: barrier,
//! broadcast and elementwise sum-reduction. Every worker of a group must
//! issue the same sequence of collectives, otherwise the group deadlocks.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use tracing::trace;

use crate::error::{Result, XcorrError};

/// A fixed-size SPMD group as seen from one worker.
pub trait WorkerGroup {
    /// Index of this worker, `0..size()`.
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Block until every worker of the group has arrived.
    fn barrier(&self);

    /// Replace `data` on every worker with the contents held by `root`.
    fn broadcast(&self, data: &mut [f64], root: usize) -> Result<()>;

    /// Replace `data` on every worker with the elementwise sum over all workers.
    fn all_reduce_sum(&self, data: &mut [f64]) -> Result<()>;
}

/// Group of exactly one worker. All collectives are no-ops.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoloGroup;

impl WorkerGroup for SoloGroup {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn broadcast(&self, _data: &mut [f64], root: usize) -> Result<()> {
        if root != 0 {
            return Err(XcorrError::Group(format!(
                "broadcast root {root} out of range for group of 1"
            )));
        }
        Ok(())
    }

    fn all_reduce_sum(&self, _data: &mut [f64]) -> Result<()> {
        Ok(())
    }
}

struct Shared {
    size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Vec<f64>>>,
}

/// In-process group: each worker runs on its own scoped thread.
///
/// Reductions sum the per-rank contributions in rank order, so results do
/// not depend on thread scheduling.
pub struct ThreadGroup {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadGroup {
    /// Run `worker` once per rank on `size` threads and collect the results
    /// in rank order.
    ///
    /// # Panics
    /// Panics if `size` is zero, or re-raises a panic from any worker.
    pub fn run<F, R>(size: usize, worker: F) -> Vec<R>
    where
        F: Fn(&ThreadGroup) -> R + Sync,
        R: Send,
    {
        assert!(size > 0, "worker group needs at least one worker");
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
        });
        let worker = &worker;
        thread::scope(|scope| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let group = ThreadGroup {
                        rank,
                        shared: Arc::clone(&shared),
                    };
                    scope.spawn(move || worker(&group))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }

    fn deposit(&self, data: &[f64]) {
        let mut slots = self.shared.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots[self.rank].clear();
        slots[self.rank].extend_from_slice(data);
    }
}

impl WorkerGroup for ThreadGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn broadcast(&self, data: &mut [f64], root: usize) -> Result<()> {
        if root >= self.shared.size {
            return Err(XcorrError::Group(format!(
                "broadcast root {root} out of range for group of {}",
                self.shared.size
            )));
        }
        trace!(rank = self.rank, root, len = data.len(), "broadcast");
        if self.rank == root {
            self.deposit(data);
        }
        self.shared.barrier.wait();
        let outcome = if self.rank == root {
            Ok(())
        } else {
            let slots = self.shared.slots.lock().unwrap_or_else(|e| e.into_inner());
            let source = &slots[root];
            if source.len() == data.len() {
                data.copy_from_slice(source);
                Ok(())
            } else {
                Err(XcorrError::Group(format!(
                    "broadcast length mismatch: root sent {}, rank {} expects {}",
                    source.len(),
                    self.rank,
                    data.len()
                )))
            }
        };
        // Nobody may refill the root slot before every rank has read it.
        self.shared.barrier.wait();
        outcome
    }

    fn all_reduce_sum(&self, data: &mut [f64]) -> Result<()> {
        trace!(rank = self.rank, len = data.len(), "all_reduce_sum");
        self.deposit(data);
        self.shared.barrier.wait();
        let outcome = {
            let slots = self.shared.slots.lock().unwrap_or_else(|e| e.into_inner());
            if slots.iter().any(|s| s.len() != data.len()) {
                Err(XcorrError::Group(format!(
                    "reduction length mismatch on rank {}: lengths {:?}",
                    self.rank,
                    slots.iter().map(Vec::len).collect::<Vec<_>>()
                )))
            } else {
                for (idx, value) in data.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for slot in slots.iter() {
                        acc += slot[idx];
                    }
                    *value = acc;
                }
                Ok(())
            }
        };
        self.shared.barrier.wait();
        outcome
    }
}
