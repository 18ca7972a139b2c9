use crate::runtime::ParallelRuntime;
use crate::BenchCfg;
use iobench_universal_client::StorageBackend;
use std::cmp::min;

/// Everything a benchmark pattern needs on one worker.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
  pub rt: &'a dyn ParallelRuntime,
  pub backend: &'a dyn StorageBackend,
  pub cfg: &'a BenchCfg,
}

impl<'a> Ctx<'a> {
  pub fn new(rt: &'a dyn ParallelRuntime, backend: &'a dyn StorageBackend, cfg: &'a BenchCfg) -> Self {
    Self { rt, backend, cfg }
  }

  pub fn rank(&self) -> usize {
    self.rt.rank()
  }

  pub fn world_size(&self) -> usize {
    self.rt.world_size()
  }

  /// Largest ranged read to issue, honouring both the configuration and the backend.
  pub fn section_limit(&self) -> u64 {
    min(self.cfg.section_limit, self.backend.limits().section_limit)
  }
}
