use super::check_partition_limit;
use super::together;
use super::OpResult;
use crate::coordinator::run_trials;
use crate::coordinator::timed;
use crate::ctx::Ctx;
use crate::pattern::Pattern;
use crate::payload::sentinel_payload;
use crate::report::PatternReport;
use crate::verify::verify_rank_object;
use crate::verify::Verdict;
use iobench_universal_client::CreateFromBytesInput;

pub struct OpWritePerRankInput {
  pub own_container: bool,
}

/// Every worker writes its own target object with one whole-object write per trial.
pub(crate) async fn op_write_per_rank(ctx: Ctx<'_>, req: OpWritePerRankInput) -> OpResult<PatternReport> {
  let cfg = ctx.cfg;
  check_partition_limit(cfg.bytes_per_rank, ctx.section_limit())?;
  let rank = ctx.rank();
  let target = match req.own_container {
    true => cfg.target.for_rank_in_own_container(rank),
    false => cfg.target.for_rank(rank),
  };
  let target = &target;
  let data = sentinel_payload(rank, cfg.bytes_per_rank);
  let data = data.as_slice();

  let outcome = run_trials(ctx.rt, cfg.trial_cfg(), |_| async move {
    let ((), secs) = timed(async {
      ctx
        .backend
        .create_from_bytes(CreateFromBytesInput { target, data })
        .await?;
      Ok(())
    })
    .await?;
    Ok(secs)
  })
  .await?;

  if cfg.verify {
    let res = verify_rank_object(ctx.backend, target, rank, cfg.bytes_per_rank, ctx.section_limit())
      .await
      .and_then(Verdict::into_result);
    together(ctx.rt, res).await?;
  };

  let pattern = match req.own_container {
    true => Pattern::PerRankContainersMultipleWriters,
    false => Pattern::PerRankObjectsMultipleWriters,
  };
  Ok(PatternReport::new(
    pattern,
    ctx.world_size(),
    outcome,
    cfg.bytes_per_rank * ctx.world_size() as u64,
  ))
}
