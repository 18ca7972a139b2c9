use crate::metrics::reduce_elapsed;
use crate::metrics::round_to;
use crate::metrics::AggregateResult;
use crate::metrics::MeanAccumulator;
use crate::metrics::TrialAccumulator;
use crate::op::together;
use crate::op::OpError;
use crate::op::OpResult;
use crate::runtime::ParallelRuntime;
use std::future::Future;
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TrialCfg {
  pub repeat: u64,
  pub precision: u32,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TrialsOutcome {
  pub latency: AggregateResult,
  /// Mean time between leaving the first barrier and leaving the second, as seen by this worker.
  pub wall_secs: f64,
  pub trials: u64,
}

/// Runs `fut` and measures how long it took.
pub async fn timed<T>(fut: impl Future<Output = OpResult<T>>) -> OpResult<(T, f64)> {
  let started = Instant::now();
  let out = fut.await?;
  Ok((out, started.elapsed().as_secs_f64()))
}

/// Drives repeated, barrier-delimited trials and folds their reduced timings.
pub struct TrialRunner<'a> {
  rt: &'a dyn ParallelRuntime,
  cfg: TrialCfg,
  latency: TrialAccumulator,
  wall: MeanAccumulator,
}

impl<'a> TrialRunner<'a> {
  pub fn new(rt: &'a dyn ParallelRuntime, cfg: TrialCfg) -> OpResult<Self> {
    if cfg.repeat == 0 {
      return Err(OpError::Configuration("repeat count must be at least 1".into()));
    };
    Ok(Self {
      rt,
      cfg,
      latency: TrialAccumulator::default(),
      wall: MeanAccumulator::default(),
    })
  }

  pub fn cfg(&self) -> TrialCfg {
    self.cfg
  }

  /// One trial: barrier, run `operation` (which yields this worker's elapsed seconds), barrier, then reduce across the team. If any worker's operation failed, every worker returns an error.
  pub async fn trial(&mut self, operation: impl Future<Output = OpResult<f64>>) -> OpResult<AggregateResult> {
    self.rt.barrier().await;
    let window = Instant::now();
    let res = operation.await;
    self.rt.barrier().await;
    let wall_secs = window.elapsed().as_secs_f64();

    let elapsed = together(self.rt, res).await?;
    let stats = reduce_elapsed(self.rt, elapsed, self.cfg.precision).await;
    debug!(
      rank = self.rt.rank(),
      trial = self.latency.trials(),
      elapsed,
      wall_secs,
      max = stats.max,
      min = stats.min,
      avg = stats.avg,
      "trial complete"
    );
    self.latency.push(stats);
    self.wall.push(wall_secs);
    Ok(stats)
  }

  pub fn finish(self) -> OpResult<TrialsOutcome> {
    let precision = self.cfg.precision;
    let (Some(latency), Some(wall_secs)) = (self.latency.finish(precision), self.wall.mean(precision)) else {
      return Err(OpError::Configuration("no trials were run".into()));
    };
    Ok(TrialsOutcome {
      latency,
      wall_secs: round_to(wall_secs, precision),
      trials: self.latency.trials(),
    })
  }
}

/// Runs `cfg.repeat` trials of `operation`; see `TrialRunner::trial`. Every worker returns the same latency statistics.
pub async fn run_trials<F, Fut>(rt: &dyn ParallelRuntime, cfg: TrialCfg, mut operation: F) -> OpResult<TrialsOutcome>
where
  F: FnMut(u64) -> Fut,
  Fut: Future<Output = OpResult<f64>>,
{
  let mut runner = TrialRunner::new(rt, cfg)?;
  for trial in 0..cfg.repeat {
    runner.trial(operation(trial)).await?;
  }
  runner.finish()
}
