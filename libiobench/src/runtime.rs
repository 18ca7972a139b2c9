use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::spawn;
use tokio::sync::Barrier;
use tracing::debug;

pub const LEADER_RANK: usize = 0;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WorkerContext {
  pub rank: usize,
  pub world_size: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ReduceOp {
  Max,
  Min,
  Sum,
}

impl ReduceOp {
  fn fold(self, values: &[f64]) -> f64 {
    match self {
      ReduceOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
      ReduceOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
      ReduceOp::Sum => values.iter().sum(),
    }
  }
}

/// The collective operations available to a worker. Every call is collective: all workers of the team must make the same sequence of `barrier` and `all_reduce` calls, otherwise the team blocks forever.
#[async_trait]
pub trait ParallelRuntime: Send + Sync {
  fn ctx(&self) -> WorkerContext;

  fn rank(&self) -> usize {
    self.ctx().rank
  }

  fn world_size(&self) -> usize {
    self.ctx().world_size
  }

  fn is_leader(&self) -> bool {
    self.rank() == LEADER_RANK
  }

  async fn barrier(&self);

  /// Combines one value from every worker. The result is returned to all workers.
  async fn all_reduce(&self, value: f64, op: ReduceOp) -> f64;
}

/// Returns true on every worker only if every worker passed `ok = true`.
pub async fn agree(rt: &dyn ParallelRuntime, ok: bool) -> bool {
  rt.all_reduce(if ok { 1.0 } else { 0.0 }, ReduceOp::Min).await > 0.5
}

struct TeamShared {
  barrier: Barrier,
  slots: Mutex<Vec<f64>>,
}

/// A worker of a `LocalTeam`.
#[derive(Clone)]
pub struct LocalRuntime {
  ctx: WorkerContext,
  shared: Arc<TeamShared>,
}

#[async_trait]
impl ParallelRuntime for LocalRuntime {
  fn ctx(&self) -> WorkerContext {
    self.ctx
  }

  async fn barrier(&self) {
    self.shared.barrier.wait().await;
  }

  async fn all_reduce(&self, value: f64, op: ReduceOp) -> f64 {
    self.shared.slots.lock()[self.ctx.rank] = value;
    self.shared.barrier.wait().await;
    let res = op.fold(&self.shared.slots.lock());
    // Nobody may overwrite their slot for the next reduction until everyone has read this one.
    self.shared.barrier.wait().await;
    res
  }
}

/// A team of workers running as tasks in the current process, one per rank.
pub struct LocalTeam;

impl LocalTeam {
  pub fn workers(world_size: usize) -> Vec<LocalRuntime> {
    assert!(world_size > 0);
    let shared = Arc::new(TeamShared {
      barrier: Barrier::new(world_size),
      slots: Mutex::new(vec![0.0; world_size]),
    });
    (0..world_size)
      .map(|rank| LocalRuntime {
        ctx: WorkerContext { rank, world_size },
        shared: shared.clone(),
      })
      .collect()
  }

  /// Runs `f` once per rank concurrently and returns the outputs in rank order.
  pub async fn run<F, Fut, T>(world_size: usize, f: F) -> Vec<T>
  where
    F: Fn(LocalRuntime) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
  {
    debug!(world_size, "starting local team");
    let handles = Self::workers(world_size)
      .into_iter()
      .map(|rt| spawn(f(rt)))
      .collect::<Vec<_>>();
    join_all(handles)
      .await
      .into_iter()
      .map(|res| match res {
        Ok(out) => out,
        Err(err) => std::panic::resume_unwind(err.into_panic()),
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::agree;
  use super::LocalTeam;
  use super::ParallelRuntime;
  use super::ReduceOp;
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;
  use std::sync::Arc;

  #[tokio::test]
  async fn test_all_reduce_is_visible_to_every_rank() {
    let out = LocalTeam::run(5, |rt| async move {
      let v = rt.rank() as f64;
      (
        rt.all_reduce(v, ReduceOp::Max).await,
        rt.all_reduce(v, ReduceOp::Min).await,
        rt.all_reduce(v, ReduceOp::Sum).await,
      )
    })
    .await;
    assert_eq!(out, vec![(4.0, 0.0, 10.0); 5]);
  }

  #[tokio::test]
  async fn test_consecutive_reductions_do_not_interfere() {
    let out = LocalTeam::run(3, |rt| async move {
      let mut sums = Vec::new();
      for round in 0..20 {
        sums.push(rt.all_reduce((rt.rank() * round) as f64, ReduceOp::Sum).await);
      }
      sums
    })
    .await;
    let expected = (0..20).map(|round| (3 * round) as f64).collect::<Vec<_>>();
    for sums in out {
      assert_eq!(sums, expected);
    }
  }

  #[tokio::test]
  async fn test_barrier_waits_for_all() {
    let arrived = Arc::new(AtomicUsize::new(0));
    let seen = LocalTeam::run(4, |rt| {
      let arrived = arrived.clone();
      async move {
        arrived.fetch_add(1, Ordering::SeqCst);
        rt.barrier().await;
        arrived.load(Ordering::SeqCst)
      }
    })
    .await;
    assert_eq!(seen, vec![4; 4]);
  }

  #[tokio::test]
  async fn test_agree() {
    let out = LocalTeam::run(3, |rt| async move { agree(&rt, rt.rank() != 2).await }).await;
    assert_eq!(out, vec![false; 3]);
    let out = LocalTeam::run(3, |rt| async move { agree(&rt, true).await }).await;
    assert_eq!(out, vec![true; 3]);
  }

  #[tokio::test]
  async fn test_leader() {
    let out = LocalTeam::run(3, |rt| async move { (rt.rank(), rt.world_size(), rt.is_leader()) }).await;
    assert_eq!(out, vec![(0, 3, true), (1, 3, false), (2, 3, false)]);
  }
}
