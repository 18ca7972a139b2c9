use super::read_sections;
use super::OpError;
use super::OpResult;
use crate::coordinator::run_trials;
use crate::coordinator::timed;
use crate::ctx::Ctx;
use crate::pattern::Pattern;
use crate::report::PatternReport;

/// Worker `r` reads only the `r`-th of `world_size` equal slices of the shared source object.
pub(crate) async fn op_read_partitioned(ctx: Ctx<'_>) -> OpResult<PatternReport> {
  let world_size = ctx.world_size() as u64;
  let size = ctx.cfg.source_size;
  if size % world_size != 0 {
    return Err(OpError::Configuration(format!(
      "source size {size} is not divisible by the world size {world_size}"
    )));
  };
  let slice = size / world_size;
  let start = ctx.rank() as u64 * slice;
  let source = &ctx.cfg.source;
  let section_limit = ctx.section_limit();
  let outcome = run_trials(ctx.rt, ctx.cfg.trial_cfg(), |_| async move {
    let (_, secs) = timed(read_sections(
      ctx.backend,
      source,
      start..start + slice,
      section_limit,
      |_| {},
    ))
    .await?;
    Ok(secs)
  })
  .await?;
  Ok(PatternReport::new(
    Pattern::SingleObjectPartitionedReaders,
    ctx.world_size(),
    outcome,
    size,
  ))
}
