use crate::runtime::ParallelRuntime;
use crate::runtime::ReduceOp;
use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_PRECISION: u32 = 3;
/// Digits beyond this are noise in an f64 second count.
pub const MAX_PRECISION: u32 = 15;

/// Rounds to `precision` decimal digits. Values that cannot be scaled that far are returned unchanged.
pub fn round_to(val: f64, precision: u32) -> f64 {
  let scale = 10f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
  let scaled = val * scale;
  if !scaled.is_finite() {
    return val;
  };
  scaled.round() / scale
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct AggregateResult {
  pub max: f64,
  pub min: f64,
  pub avg: f64,
}

impl AggregateResult {
  pub fn rounded(self, precision: u32) -> Self {
    Self {
      max: round_to(self.max, precision),
      min: round_to(self.min, precision),
      avg: round_to(self.avg, precision),
    }
  }
}

/// Reduces one elapsed-time sample per worker into the max, min and mean across the team. Only the three results are rounded; the sum is not. Every worker must call this for the same trial.
pub async fn reduce_elapsed(rt: &dyn ParallelRuntime, elapsed_secs: f64, precision: u32) -> AggregateResult {
  let max = rt.all_reduce(elapsed_secs, ReduceOp::Max).await;
  let min = rt.all_reduce(elapsed_secs, ReduceOp::Min).await;
  let sum = rt.all_reduce(elapsed_secs, ReduceOp::Sum).await;
  AggregateResult {
    max,
    min,
    avg: sum / rt.world_size() as f64,
  }
  .rounded(precision)
}

/// Mean of values that may only have been measured on some trials or some workers.
#[derive(Default, Clone, Copy, Debug)]
pub struct MeanAccumulator {
  sum: f64,
  count: u64,
}

impl MeanAccumulator {
  pub fn push(&mut self, val: f64) {
    self.sum += val;
    self.count += 1;
  }

  pub fn mean(&self, precision: u32) -> Option<f64> {
    (self.count > 0).then(|| round_to(self.sum / self.count as f64, precision))
  }
}

/// Folds per-trial aggregates into the statistic reported for a whole run: the max of the maxes, the min of the mins, and the mean of the means.
#[derive(Clone, Copy, Debug)]
pub struct TrialAccumulator {
  max: f64,
  min: f64,
  avg: MeanAccumulator,
}

impl Default for TrialAccumulator {
  fn default() -> Self {
    Self {
      max: f64::NEG_INFINITY,
      min: f64::INFINITY,
      avg: MeanAccumulator::default(),
    }
  }
}

impl TrialAccumulator {
  pub fn push(&mut self, trial: AggregateResult) {
    self.max = self.max.max(trial.max);
    self.min = self.min.min(trial.min);
    self.avg.push(trial.avg);
  }

  pub fn trials(&self) -> u64 {
    self.avg.count
  }

  pub fn finish(&self, precision: u32) -> Option<AggregateResult> {
    let avg = self.avg.mean(precision)?;
    Some(AggregateResult {
      max: round_to(self.max, precision),
      min: round_to(self.min, precision),
      avg,
    })
  }
}
