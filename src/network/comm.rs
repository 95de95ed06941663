//! Collective operations between workers
use crate::errors::Error;
use std::sync::{Barrier, Mutex, MutexGuard};

/// Shared reduction state
#[derive(Debug, Default)]
struct Reduction {
    /// Accumulated sum
    sum: Option<Vec<usize>>,
    /// Length mismatch (expected, found), if any
    mismatch: Option<(usize, usize)>,
}

/// [Communicator] synchronizes the workers of one [WorkerPool](super::WorkerPool).
/// All collective operations must be called by every worker,
/// in the same order.
#[derive(Debug)]
pub struct Communicator {
    size: usize,
    barrier: Barrier,
    reduction: Mutex<Reduction>,
}

impl Communicator {
    /// Creates a [Communicator] for `size` workers
    pub(crate) fn new(size: usize) -> Self {
        Self {
            size,
            barrier: Barrier::new(size),
            reduction: Mutex::new(Reduction::default()),
        }
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.size
    }

    fn lock(&self) -> MutexGuard<'_, Reduction> {
        // a poisoned state means another worker panicked: the pool will report it
        self.reduction
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks until all workers reach this point
    pub fn barrier(&self) {
        self.barrier.wait();
    }

    /// Element wise sum of `local` across all workers, broadcast back to every worker.
    /// All workers must contribute vectors of identical length.
    pub fn reduce_sum(&self, leader: bool, local: &[usize]) -> Result<Vec<usize>, Error> {
        {
            let mut guard = self.lock();
            let reduction = &mut *guard;
            let sum = match reduction.sum.take() {
                None => local.to_vec(),
                Some(mut sum) => {
                    if sum.len() == local.len() {
                        for (s, v) in sum.iter_mut().zip(local.iter()) {
                            *s += v;
                        }
                    } else {
                        reduction.mismatch = Some((sum.len(), local.len()));
                    }
                    sum
                },
            };
            reduction.sum = Some(sum);
        }

        // reduce
        self.barrier.wait();

        let (sum, mismatch) = {
            let reduction = self.lock();
            (reduction.sum.clone().unwrap_or_default(), reduction.mismatch)
        };

        // broadcast
        self.barrier.wait();

        if leader {
            *self.lock() = Reduction::default();
        }

        // ready for the next collective operation
        self.barrier.wait();

        match mismatch {
            Some((expected, found)) => Err(Error::ReductionMismatch { expected, found }),
            None => Ok(sum),
        }
    }

    /// Verifies every worker holds the same `global` vector.
    pub fn check_consistency(&self, leader: bool, global: &[usize]) -> Result<(), Error> {
        let sum = self.reduce_sum(leader, global)?;
        let consistent = sum
            .iter()
            .zip(global.iter())
            .all(|(sum, value)| *sum == value * self.size);

        if consistent {
            Ok(())
        } else {
            Err(Error::InconsistentBroadcast)
        }
    }
}
