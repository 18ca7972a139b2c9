use super::check_partition_limit;
use super::leader_only;
use super::OpResult;
use crate::coordinator::timed;
use crate::coordinator::TrialRunner;
use crate::ctx::Ctx;
use crate::fragment::fragments_for_rank;
use crate::fragment::CommitPlan;
use crate::fragment::Fragment;
use crate::metrics::MeanAccumulator;
use crate::pattern::Pattern;
use crate::payload::sentinel_payload;
use crate::report::PatternReport;
use crate::verify::verify;
use iobench_universal_client::CommitFragmentsInput;
use iobench_universal_client::ObjectPath;
use iobench_universal_client::WriteFragmentInput;
use off64::usz;
use std::cmp::min;
use tracing::debug;
use tracing::info;

async fn write_fragments(ctx: Ctx<'_>, fragments: &[Fragment], buf: &[u8]) -> OpResult<()> {
  let target = &ctx.cfg.target;
  for frag in fragments {
    let fragment_id = frag.id.to_string();
    ctx
      .backend
      .write_fragment(WriteFragmentInput {
        target,
        fragment_id: &fragment_id,
        data: &buf[..usz!(frag.len())],
      })
      .await?;
  }
  Ok(())
}

/// Lists every uncommitted fragment of `target`, orders them, and commits them as the object's new content. Returns the number of fragments committed.
async fn commit_all(ctx: Ctx<'_>, target: &ObjectPath) -> OpResult<usize> {
  let listing = ctx.backend.list_uncommitted_fragments(target).await?;
  let plan = CommitPlan::from_listing(listing);
  let count = plan.len();
  debug!(object = %target, fragments = count, bytes = plan.total_size(), "committing fragments");
  ctx
    .backend
    .commit_fragments(CommitFragmentsInput {
      target,
      ordered_ids: plan.into_ids(),
    })
    .await?;
  Ok(count)
}

/// Every worker writes `bytes_per_rank` bytes of the shared target object as size-bounded fragments; the leader then lists, orders and commits all fragments, and verifies the result. The write time is reduced across the team; the leader's postprocessing time (list, order, commit) is reported separately.
pub(crate) async fn op_write_fragmented(ctx: Ctx<'_>) -> OpResult<PatternReport> {
  let cfg = ctx.cfg;
  check_partition_limit(cfg.fragment_limit, ctx.backend.limits().fragment_limit)?;
  let rank = ctx.rank();
  let world_size = ctx.world_size();
  let fragments = fragments_for_rank(rank as u64, cfg.bytes_per_rank, cfg.fragment_limit)?;
  // Every fragment of a rank carries the same byte, so one buffer serves all of them.
  let buf = sentinel_payload(rank, min(cfg.fragment_limit, cfg.bytes_per_rank));
  let target = &cfg.target;

  let mut runner = TrialRunner::new(ctx.rt, cfg.trial_cfg())?;
  let mut postprocessing = MeanAccumulator::default();
  for _ in 0..cfg.repeat {
    runner
      .trial(async {
        let ((), secs) = timed(write_fragments(ctx, &fragments, &buf)).await?;
        Ok(secs)
      })
      .await?;

    let leader_secs = leader_only(ctx.rt, || async {
      let (committed, secs) = timed(commit_all(ctx, target)).await?;
      if cfg.verify {
        verify(ctx.backend, target, cfg.bytes_per_rank, world_size, ctx.section_limit())
          .await?
          .into_result()?;
      };
      info!(object = %target, fragments = committed, postprocessing_secs = secs, "committed shared object");
      Ok(secs)
    })
    .await?;
    if let Some(secs) = leader_secs {
      postprocessing.push(secs);
    };
  }

  let outcome = runner.finish()?;
  let mut report = PatternReport::new(
    Pattern::SingleObjectFragmentedWriters,
    world_size,
    outcome,
    cfg.bytes_per_rank * world_size as u64,
  );
  report.postprocessing_secs = postprocessing.mean(cfg.precision);
  Ok(report)
}
