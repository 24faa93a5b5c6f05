//! End-to-end join run: load regions, build the index, load points, join,
//! write.

use crate::catalog::RegionCatalog;
use crate::config::Config;
use crate::error::{RegionJoinError, Result};
use crate::index::build_index;
use crate::ingest::{IngestStats, PointStore};
use crate::join::{JoinEngine, JoinStats};
use crate::output;
use std::fmt;
use std::time::{Duration, Instant};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoadRegions,
    BuildIndex,
    LoadPoints,
    Join,
    Write,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::LoadRegions => "Loading regions",
            Phase::BuildIndex => "Building index",
            Phase::LoadPoints => "Loading points",
            Phase::Join => "Joining regions and points",
            Phase::Write => "Writing output",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Started(Phase),
    Finished(Phase, Duration),
    /// The phase returned an error; the run stops after this event.
    Failed(Phase, Duration),
}

/// Counts and timings from a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub regions: usize,
    pub records: usize,
    pub ingest: IngestStats,
    pub join: JoinStats,
    pub written: usize,
    pub phases: Vec<(Phase, Duration)>,
    pub elapsed: Duration,
}

/// Runs every phase with `config`, reporting phase boundaries to `on_phase`.
///
/// The first fatal error aborts the run; nothing is written unless the join
/// completed.
pub fn run<F>(config: &Config, mut on_phase: F) -> Result<RunSummary>
where
    F: FnMut(PhaseEvent),
{
    config.validate()?;
    let start = Instant::now();
    let mut timer = PhaseTimer {
        phases: Vec::with_capacity(5),
        on_phase: &mut on_phase,
    };

    let catalog = timer.time(Phase::LoadRegions, || {
        RegionCatalog::load_path(&config.regions.path, &config.regions.catalog_options())
    })?;
    let index = timer.time(Phase::BuildIndex, || build_index(&catalog, &config.index))?;
    let mut store = timer.time(Phase::LoadPoints, || {
        PointStore::load_path(&config.points.path, &config.points.ingest_options())
    })?;

    let engine = JoinEngine::new(&catalog, &index, config.join.clone())?;
    let join = timer.time(Phase::Join, || {
        Ok::<_, RegionJoinError>(engine.run(store.records_mut()))
    })?;

    let written = timer.time(Phase::Write, || {
        output::write_path(
            &config.output.path,
            &store,
            &catalog,
            &config.output.output_options(),
        )
    })?;

    Ok(RunSummary {
        regions: catalog.len(),
        records: store.len(),
        ingest: store.stats(),
        join,
        written,
        phases: timer.phases,
        elapsed: start.elapsed(),
    })
}

struct PhaseTimer<'a, F> {
    phases: Vec<(Phase, Duration)>,
    on_phase: &'a mut F,
}

impl<F: FnMut(PhaseEvent)> PhaseTimer<'_, F> {
    /// Runs one phase. Only successful phases are recorded in the summary.
    fn time<T, E>(
        &mut self,
        phase: Phase,
        body: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        (self.on_phase)(PhaseEvent::Started(phase));
        let mark = Instant::now();
        let value = body();
        let elapsed = mark.elapsed();
        match value {
            Ok(_) => {
                self.phases.push((phase, elapsed));
                (self.on_phase)(PhaseEvent::Finished(phase, elapsed));
            }
            Err(_) => (self.on_phase)(PhaseEvent::Failed(phase, elapsed)),
        }
        value
    }
}
