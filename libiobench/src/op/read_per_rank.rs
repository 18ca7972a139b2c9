use super::read_sections;
use super::OpResult;
use crate::coordinator::run_trials;
use crate::coordinator::timed;
use crate::ctx::Ctx;
use crate::pattern::Pattern;
use crate::report::PatternReport;

pub struct OpReadPerRankInput {
  pub own_container: bool,
}

/// Every worker reads its own source object.
pub(crate) async fn op_read_per_rank(ctx: Ctx<'_>, req: OpReadPerRankInput) -> OpResult<PatternReport> {
  let rank = ctx.rank();
  let source = match req.own_container {
    true => ctx.cfg.source.for_rank_in_own_container(rank),
    false => ctx.cfg.source.for_rank(rank),
  };
  let source = &source;
  let size = ctx.cfg.source_size;
  let section_limit = ctx.section_limit();
  let outcome = run_trials(ctx.rt, ctx.cfg.trial_cfg(), |_| async move {
    let (_, secs) = timed(read_sections(ctx.backend, source, 0..size, section_limit, |_| {})).await?;
    Ok(secs)
  })
  .await?;
  let pattern = match req.own_container {
    true => Pattern::PerRankContainersMultipleReaders,
    false => Pattern::PerRankObjectsMultipleReaders,
  };
  Ok(PatternReport::new(
    pattern,
    ctx.world_size(),
    outcome,
    size * ctx.world_size() as u64,
  ))
}
