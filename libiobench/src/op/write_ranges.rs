use super::check_partition_limit;
use super::leader_only;
use super::write_sentinel_range;
use super::OpResult;
use crate::coordinator::timed;
use crate::coordinator::TrialRunner;
use crate::ctx::Ctx;
use crate::metrics::MeanAccumulator;
use crate::pattern::Pattern;
use crate::report::PatternReport;
use crate::verify::verify;
use iobench_universal_client::CreateObjectInput;

/// The leader pre-allocates the shared target object, then every worker writes its own byte range of it in chunks of at most `fragment_limit` bytes. The leader's allocation time is reported separately.
pub(crate) async fn op_write_ranges(ctx: Ctx<'_>) -> OpResult<PatternReport> {
  let cfg = ctx.cfg;
  check_partition_limit(cfg.fragment_limit, ctx.backend.limits().fragment_limit)?;
  let rank = ctx.rank();
  let world_size = ctx.world_size();
  let total = cfg.bytes_per_rank * world_size as u64;
  let offset = rank as u64 * cfg.bytes_per_rank;
  let target = &cfg.target;

  let mut runner = TrialRunner::new(ctx.rt, cfg.trial_cfg())?;
  let mut create = MeanAccumulator::default();
  for _ in 0..cfg.repeat {
    let create_secs = leader_only(ctx.rt, || async {
      let ((), secs) = timed(async {
        ctx
          .backend
          .create_object(CreateObjectInput { target, size: total })
          .await?;
        Ok(())
      })
      .await?;
      Ok(secs)
    })
    .await?;
    if let Some(secs) = create_secs {
      create.push(secs);
    };

    runner
      .trial(async {
        let ((), secs) = timed(write_sentinel_range(
          ctx.backend,
          target,
          rank,
          offset,
          cfg.bytes_per_rank,
          cfg.fragment_limit,
        ))
        .await?;
        Ok(secs)
      })
      .await?;

    if cfg.verify {
      leader_only(ctx.rt, || async {
        verify(ctx.backend, target, cfg.bytes_per_rank, world_size, ctx.section_limit())
          .await?
          .into_result()
      })
      .await?;
    };
  }

  let outcome = runner.finish()?;
  let mut report = PatternReport::new(Pattern::SingleObjectRangeWriters, world_size, outcome, total);
  report.create_secs = create.mean(cfg.precision);
  Ok(report)
}
