use crate::coordinator::TrialCfg;
use crate::fragment::FRAGMENT_ID_COMPONENT_MAX;
use crate::metrics::MAX_PRECISION;
use crate::op::OpError;
use crate::op::OpResult;
use iobench_universal_client::ObjectPath;

pub mod coordinator;
pub mod ctx;
pub mod fragment;
pub mod metrics;
pub mod op;
pub mod pattern;
pub mod payload;
pub mod report;
pub mod runtime;
pub mod util;
pub mod verify;

/// Validated parameters shared by every benchmark pattern.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BenchCfg {
  /// Object read by the read patterns. Per-rank variants derive their names from it.
  pub source: ObjectPath,
  /// Size of the shared source object, and of each per-rank source object.
  pub source_size: u64,
  /// Object written by the write patterns. Per-rank variants derive their names from it.
  pub target: ObjectPath,
  pub bytes_per_rank: u64,
  /// Largest single fragment or range write.
  pub fragment_limit: u64,
  /// Largest single ranged read.
  pub section_limit: u64,
  pub repeat: u64,
  pub precision: u32,
  /// Whether the leader verifies shared objects after writing them.
  pub verify: bool,
}

impl BenchCfg {
  pub fn trial_cfg(&self) -> TrialCfg {
    TrialCfg {
      repeat: self.repeat,
      precision: self.precision,
    }
  }

  pub fn validate(&self, world_size: usize) -> OpResult<()> {
    let fail = |msg: &str| Err(OpError::Configuration(msg.to_string()));
    if world_size == 0 {
      return fail("world size must be at least 1");
    };
    if world_size as u64 - 1 > FRAGMENT_ID_COMPONENT_MAX {
      return fail("world size does not fit in a five-digit rank");
    };
    if self.repeat == 0 {
      return fail("repeat count must be at least 1");
    };
    if self.fragment_limit == 0 {
      return fail("fragment limit must be positive");
    };
    if self.section_limit == 0 {
      return fail("section limit must be positive");
    };
    if self.precision > MAX_PRECISION {
      return fail("precision must be at most 15 digits");
    };
    if self.bytes_per_rank.checked_mul(world_size as u64).is_none() {
      return fail("bytes per rank times world size overflows");
    };
    if self.source_size.checked_mul(world_size as u64).is_none() {
      return fail("source size times world size overflows");
    };
    for p in [&self.source, &self.target] {
      if p.container.is_empty() || p.path.is_empty() {
        return fail("container and object names must not be empty");
      };
    }
    Ok(())
  }
}
