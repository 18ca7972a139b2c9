use super::read_sections;
use super::OpError;
use super::OpResult;
use crate::coordinator::run_trials;
use crate::coordinator::timed;
use crate::ctx::Ctx;
use crate::pattern::Pattern;
use crate::report::PatternReport;

/// Every worker reads the whole shared source object.
pub(crate) async fn op_read_single_object(ctx: Ctx<'_>) -> OpResult<PatternReport> {
  let source = &ctx.cfg.source;
  let size = ctx.cfg.source_size;
  let section_limit = ctx.section_limit();
  let outcome = run_trials(ctx.rt, ctx.cfg.trial_cfg(), |_| async move {
    let (read, secs) = timed(read_sections(ctx.backend, source, 0..size, section_limit, |_| {})).await?;
    if read != size {
      return Err(OpError::SizeMismatch {
        expected: size,
        actual: read,
      });
    };
    Ok(secs)
  })
  .await?;
  Ok(PatternReport::new(
    Pattern::SingleObjectMultipleReaders,
    ctx.world_size(),
    outcome,
    size * ctx.world_size() as u64,
  ))
}
