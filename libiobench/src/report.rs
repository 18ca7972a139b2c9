use crate::coordinator::TrialsOutcome;
use crate::metrics::AggregateResult;
use crate::pattern::Pattern;
use crate::util::bytes_to_mib;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PatternReport {
  pub pattern: Pattern,
  pub world_size: usize,
  pub trials: u64,
  pub latency: AggregateResult,
  pub wall_secs: f64,
  /// Bytes moved by all workers in one trial.
  pub total_bytes: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub create_secs: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub postprocessing_secs: Option<f64>,
}

impl PatternReport {
  pub fn new(pattern: Pattern, world_size: usize, outcome: TrialsOutcome, total_bytes: u64) -> Self {
    Self {
      pattern,
      world_size,
      trials: outcome.trials,
      latency: outcome.latency,
      wall_secs: outcome.wall_secs,
      total_bytes,
      create_secs: None,
      postprocessing_secs: None,
    }
  }

  /// None if the window was too short to measure at the configured precision.
  pub fn bandwidth_mib_per_sec(&self) -> Option<f64> {
    (self.wall_secs > 0.0).then(|| bytes_to_mib(self.total_bytes) / self.wall_secs)
  }
}
