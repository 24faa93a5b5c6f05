//! Parallel point-in-region join.
//!
//! Each record is resolved independently: the index supplies candidate
//! regions whose bounding box contains the point, and the region boundary
//! confirms containment.
//!
//! Work is distributed through a bounded queue of disjoint `&mut` record
//! chunks. One producer (the calling thread) enqueues every chunk and then
//! closes the queue; a fixed pool of scoped worker threads dequeues until the
//! queue is drained. A chunk is owned by exactly one worker at a time, so
//! assignment slots are written without any per-record locking.

use crate::catalog::RegionCatalog;
use crate::error::ConfigError;
use crate::geometry::Boundary;
use crate::index::SpatialIndex;
use crate::types::{Envelope, PointRecord, RegionId};
use geo::{MultiPolygon, Point};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, ControlFlow};
use std::sync::mpsc::{Receiver, sync_channel};
use std::thread;

/// How to pick a winner when several region boundaries contain a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Stop at the first containing region in index visitation order.
    /// Cheapest; with overlapping regions the winner depends on the index.
    #[default]
    FirstVisited,
    /// Test every candidate and keep the lowest region id. Deterministic,
    /// and ambiguous points are counted.
    LowestId,
}

/// Join engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinOptions {
    /// Worker threads; defaults to the available hardware parallelism.
    #[serde(default = "JoinOptions::default_workers")]
    pub workers: usize,

    /// Maximum number of chunks waiting in the work queue.
    #[serde(default = "JoinOptions::default_queue_capacity")]
    pub queue_capacity: usize,

    /// Records per work item.
    #[serde(default = "JoinOptions::default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
}

impl JoinOptions {
    fn default_workers() -> usize {
        thread::available_parallelism().map_or(1, |n| n.get())
    }

    const fn default_queue_capacity() -> usize {
        8192
    }

    const fn default_chunk_size() -> usize {
        256
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.ambiguity = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid(
                "join workers must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "join queue capacity must be greater than zero".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "join chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            queue_capacity: Self::default_queue_capacity(),
            chunk_size: Self::default_chunk_size(),
            ambiguity: AmbiguityPolicy::default(),
        }
    }
}

/// Outcome counters for one join run, summed over all workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Records examined in this run.
    pub processed: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Records that already had a region and were left untouched.
    pub skipped: usize,
    /// Points contained by more than one region. Only counted under
    /// [`AmbiguityPolicy::LowestId`].
    pub ambiguous: usize,
    /// Exact containment tests performed.
    pub candidates_tested: usize,
}

impl AddAssign for JoinStats {
    fn add_assign(&mut self, rhs: Self) {
        self.processed += rhs.processed;
        self.matched += rhs.matched;
        self.unmatched += rhs.unmatched;
        self.skipped += rhs.skipped;
        self.ambiguous += rhs.ambiguous;
        self.candidates_tested += rhs.candidates_tested;
    }
}

type WorkQueue<'r> = Mutex<Option<Receiver<&'r mut [PointRecord]>>>;

/// Drops the receiver if a worker unwinds, so the producer stops blocking on
/// a full queue that nobody drains.
struct CloseOnPanic<'q, 'r>(&'q WorkQueue<'r>);

impl Drop for CloseOnPanic<'_, '_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.lock().take();
        }
    }
}

/// Resolution of a single point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub region: Option<RegionId>,
    pub ambiguous: bool,
    pub candidates_tested: usize,
}

/// Joins point records against a read-only catalog and index.
pub struct JoinEngine<'a, I: ?Sized, B = MultiPolygon> {
    catalog: &'a RegionCatalog<B>,
    index: &'a I,
    options: JoinOptions,
}

impl<'a, I, B> JoinEngine<'a, I, B>
where
    I: SpatialIndex + ?Sized,
    B: Boundary,
{
    pub fn new(
        catalog: &'a RegionCatalog<B>,
        index: &'a I,
        options: JoinOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            catalog,
            index,
            options,
        })
    }

    pub fn options(&self) -> &JoinOptions {
        &self.options
    }

    /// Finds the region containing `point` under the configured policy.
    pub fn resolve(&self, point: &Point) -> Resolution {
        let query = Envelope::point(point.x(), point.y());
        let mut resolution = Resolution {
            region: None,
            ambiguous: false,
            candidates_tested: 0,
        };

        self.index.search(&query, &mut |id| {
            let Some(region) = self.catalog.get(id) else {
                return ControlFlow::Continue(());
            };
            resolution.candidates_tested += 1;
            if !region.boundary.contains_point(point) {
                return ControlFlow::Continue(());
            }

            match self.options.ambiguity {
                AmbiguityPolicy::FirstVisited => {
                    resolution.region = Some(id);
                    ControlFlow::Break(())
                }
                AmbiguityPolicy::LowestId => {
                    match resolution.region {
                        None => resolution.region = Some(id),
                        Some(current) => {
                            resolution.ambiguous = true;
                            resolution.region = Some(current.min(id));
                        }
                    }
                    ControlFlow::Continue(())
                }
            }
        });

        resolution
    }

    /// Assigns every unassigned record to its containing region.
    ///
    /// Blocks until all workers have finished. Records that already carry a
    /// region are skipped, so running twice yields the same assignments.
    pub fn run(&self, records: &mut [PointRecord]) -> JoinStats {
        let workers = self.options.workers.min(records.len().max(1));
        log::debug!(
            "Joining {} records with {} workers (chunk {}, queue {})",
            records.len(),
            workers,
            self.options.chunk_size,
            self.options.queue_capacity
        );

        let (sender, receiver) = sync_channel::<&mut [PointRecord]>(self.options.queue_capacity);
        let queue = Mutex::new(Some(receiver));

        let stats = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| scope.spawn(|| self.work(&queue)))
                .collect();

            for chunk in records.chunks_mut(self.options.chunk_size) {
                // Fails only after a panicking worker closed the queue.
                if sender.send(chunk).is_err() {
                    break;
                }
            }
            drop(sender);

            let mut total = JoinStats::default();
            for handle in handles {
                match handle.join() {
                    Ok(stats) => total += stats,
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            total
        });

        if stats.ambiguous > 0 {
            log::warn!(
                "{} points fall inside more than one region; lowest region id kept",
                stats.ambiguous
            );
        }
        log::info!(
            "Joined {} records: {} matched, {} unmatched",
            stats.processed,
            stats.matched,
            stats.unmatched
        );
        stats
    }

    /// Worker loop: dequeue chunks until the queue is closed and drained.
    fn work(&self, queue: &WorkQueue<'_>) -> JoinStats {
        let _close = CloseOnPanic(queue);
        let mut stats = JoinStats::default();
        loop {
            // Dequeues are serialized: the lock is held across the blocking
            // recv, so idle workers wait on the mutex, not the channel.
            let next = queue.lock().as_ref().map(Receiver::recv);
            let Some(Ok(chunk)) = next else {
                break;
            };
            for record in chunk.iter_mut() {
                self.resolve_record(record, &mut stats);
            }
        }
        stats
    }

    fn resolve_record(&self, record: &mut PointRecord, stats: &mut JoinStats) {
        if record.is_assigned() {
            stats.skipped += 1;
            return;
        }

        let resolution = self.resolve(&record.point);
        stats.processed += 1;
        stats.candidates_tested += resolution.candidates_tested;
        if resolution.ambiguous {
            stats.ambiguous += 1;
        }
        match resolution.region {
            Some(id) => {
                record.assign(id);
                stats.matched += 1;
            }
            None => stats.unmatched += 1,
        }
    }
}
