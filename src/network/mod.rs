//! Station network processing
mod comm;

pub use comm::Communicator;

use crate::{
    cfg::PreprocessingConfig,
    errors::{DisableReason, Error},
    models::Models,
    preprocessing::{is_estimable, Preprocessor, StationReport},
    receiver::Receiver,
    time_axis::TimeAxis,
};

use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [Worker] context: rank within the [WorkerPool] and [Communicator].
#[derive(Debug, Copy, Clone)]
pub struct Worker<'a> {
    rank: usize,
    comm: &'a Communicator,
}

impl<'a> Worker<'a> {
    /// Rank of this [Worker]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total number of workers
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// True for the leading [Worker]
    pub fn is_leader(&self) -> bool {
        self.rank == 0
    }

    /// True if item `index` is assigned to this [Worker] (round robin)
    pub fn owns(&self, index: usize) -> bool {
        index % self.size() == self.rank
    }

    /// Blocks until all workers reach this point
    pub fn barrier(&self) {
        self.comm.barrier();
    }

    /// Element wise sum across workers, broadcast to all workers
    pub fn reduce_sum(&self, local: &[usize]) -> Result<Vec<usize>, Error> {
        self.comm.reduce_sum(self.is_leader(), local)
    }

    /// Verifies all workers share this `global` state
    pub fn check_consistency(&self, global: &[usize]) -> Result<(), Error> {
        self.comm.check_consistency(self.is_leader(), global)
    }
}

/// [WorkerPool] of a fixed number of workers.
/// Items are assigned to workers by round robin on their index.
pub struct WorkerPool {
    size: usize,
    pool: ThreadPool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size).finish()
    }
}

impl WorkerPool {
    /// Builds a [WorkerPool] of `size` workers
    pub fn new(size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::NoWorkers);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|rank| format!("worker-{}", rank))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        Ok(Self { size, pool })
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `op` on every worker. Each worker receives the items it owns
    /// (with their global index) and exclusively mutates them.
    /// Returns all items, in their original order, and the outcome of each worker
    /// (indexed by rank). Any worker failure is fatal.
    pub fn run<T, R, F>(&self, items: Vec<T>, op: F) -> Result<(Vec<T>, Vec<R>), Error>
    where
        T: Send,
        R: Send,
        F: Fn(&Worker, &mut [(usize, T)]) -> Result<R, Error> + Sync,
    {
        let size = self.size;
        let count = items.len();

        let mut buckets = (0..size).map(|_| Vec::new()).collect::<Vec<_>>();
        for (index, item) in items.into_iter().enumerate() {
            buckets[index % size].push((index, item));
        }

        let buckets = buckets.into_iter().map(Mutex::new).collect::<Vec<_>>();
        let comm = Communicator::new(size);

        let outcomes = self.pool.broadcast(|ctx| {
            let worker = Worker {
                rank: ctx.index(),
                comm: &comm,
            };

            let mut bucket = buckets[worker.rank]
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            debug!("worker #{}: {} items", worker.rank, bucket.len());
            op(&worker, &mut bucket)
        });

        let mut indexed = buckets
            .into_iter()
            .flat_map(|bucket| {
                bucket
                    .into_inner()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
            })
            .collect::<Vec<_>>();

        indexed.sort_by_key(|(index, _)| *index);

        if indexed.len() != count {
            return Err(Error::ReductionMismatch {
                expected: count,
                found: indexed.len(),
            });
        }

        let items = indexed.into_iter().map(|(_, item)| item).collect();
        let outcomes = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok((items, outcomes))
    }
}

/// [NetworkSummary] is always produced, even when all stations succeed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkSummary {
    /// Number of processed stations
    pub stations: usize,
    /// Number of disabled stations
    pub disabled_stations: usize,
    /// Number of disabled epochs, all stations
    pub disabled_epochs: usize,
    /// Station reports, in station order
    pub reports: Vec<StationReport>,
}

/// [StationNetwork] preprocesses a network of stations in parallel.
#[derive(Debug)]
pub struct StationNetwork<'a> {
    cfg: &'a PreprocessingConfig,
    axis: &'a TimeAxis,
    models: &'a Models<'a>,
    pool: WorkerPool,
}

impl<'a> StationNetwork<'a> {
    /// Creates a new [StationNetwork] processed by `workers` workers.
    /// Configuration is verified first: invalid configurations are fatal.
    pub fn new(
        cfg: &'a PreprocessingConfig,
        axis: &'a TimeAxis,
        models: &'a Models<'a>,
        workers: usize,
    ) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            axis,
            models,
            pool: WorkerPool::new(workers)?,
        })
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Selects one data source per station, among its alternatives:
    /// the first alternative with enough estimable epochs is retained.
    /// Stations without acceptable alternative are dropped. The selection
    /// is reduced and broadcast, so all workers agree on the station list,
    /// which is eventually truncated to the maximal station count.
    pub fn select_alternatives(&self, stations: Vec<Vec<Receiver>>) -> Result<Vec<Receiver>, Error> {
        let count = stations.len();
        let total = self.axis.len();
        let median_sampling = self.axis.median_sampling();
        let ratio = self.cfg.min_estimable_epochs_ratio;

        let (stations, selections) = self.pool.run(stations, |worker, owned| {
            let mut local = vec![0; count];

            for (index, alternatives) in owned.iter() {
                local[*index] = alternatives
                    .iter()
                    .position(|rx| {
                        !rx.is_disabled()
                            && is_estimable(
                                rx.usable_epoch_count(),
                                rx.observation_sampling,
                                total,
                                median_sampling,
                                ratio,
                            )
                    })
                    .map(|k| k + 1)
                    .unwrap_or(0);
            }

            worker.barrier();
            let global = worker.reduce_sum(&local)?;
            worker.check_consistency(&global)?;
            Ok(global)
        })?;

        let selection = selections.into_iter().next().unwrap_or_default();

        let mut selected = Vec::with_capacity(count);
        for (index, alternatives) in stations.into_iter().enumerate() {
            match selection.get(index).copied().unwrap_or(0) {
                0 => {
                    let name = alternatives
                        .first()
                        .map(|rx| rx.name.clone())
                        .unwrap_or_default();
                    warn!("{} - dropped: {}", name, DisableReason::NoAlternative);
                },
                k => {
                    if let Some(rx) = alternatives.into_iter().nth(k - 1) {
                        debug!("{} - alternative #{} selected", rx.name, k - 1);
                        selected.push(rx);
                    }
                },
            }
        }

        if let Some(max) = self.cfg.max_station_count {
            selected.truncate(max);
        }

        info!("{}/{} stations selected", selected.len(), count);
        Ok(selected)
    }

    /// Preprocesses all stations. Stations are disabled rather than
    /// aborting the run: only configuration and aggregation failures are fatal.
    pub fn preprocess(&self, receivers: Vec<Receiver>) -> Result<(Vec<Receiver>, NetworkSummary), Error> {
        let count = receivers.len();
        let preprocessor = Preprocessor::new(self.cfg, self.axis, self.models);

        let (receivers, outcomes) = self.pool.run(receivers, |worker, owned| {
            let mut reports = Vec::with_capacity(owned.len());

            // disabled flags, then disabled epochs
            let mut local = vec![0; 2 * count];

            for (index, rx) in owned.iter_mut() {
                let report = preprocessor.process(rx);
                local[*index] = usize::from(!report.decision.usable);
                local[count + *index] = report.decision.disabled_epochs;
                reports.push((*index, report));
            }

            worker.barrier();
            let global = worker.reduce_sum(&local)?;
            worker.check_consistency(&global)?;

            let disabled_stations = global[..count].iter().sum::<usize>();
            let disabled_epochs = global[count..].iter().sum::<usize>();

            Ok((disabled_stations, disabled_epochs, reports))
        })?;

        let mut global = None;
        let mut reports = Vec::with_capacity(count);

        for (disabled_stations, disabled_epochs, worker_reports) in outcomes {
            match global {
                None => global = Some((disabled_stations, disabled_epochs)),
                Some(state) if state != (disabled_stations, disabled_epochs) => {
                    return Err(Error::InconsistentBroadcast);
                },
                _ => {},
            }
            reports.extend(worker_reports);
        }

        reports.sort_by_key(|(index, _)| *index);

        let (disabled_stations, disabled_epochs) = global.unwrap_or_default();

        let summary = NetworkSummary {
            stations: count,
            disabled_stations,
            disabled_epochs,
            reports: reports.into_iter().map(|(_, report)| report).collect(),
        };

        info!(
            "{}/{} stations disabled, {} epochs disabled",
            summary.disabled_stations, summary.stations, summary.disabled_epochs
        );

        Ok((receivers, summary))
    }
}
