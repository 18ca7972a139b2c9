use super::leader_only;
use super::together;
use super::write_sentinel_range;
use super::OpResult;
use crate::ctx::Ctx;
use crate::payload::sentinel_payload;
use crate::runtime::LEADER_RANK;
use iobench_universal_client::CreateFromBytesInput;
use iobench_universal_client::CreateObjectInput;
use iobench_universal_client::ObjectPath;
use std::cmp::min;
use tracing::debug;

pub struct OpPrepareInput {
  /// The leader writes the shared source object.
  pub shared: bool,
  /// Every worker writes its own source object.
  pub per_rank: bool,
  pub own_container: bool,
}

/// Writes `len` bytes of `rank`'s sentinel to `target`, in one call if the backend accepts an object that large.
async fn seed_object(ctx: Ctx<'_>, target: &ObjectPath, rank: usize, len: u64) -> OpResult<()> {
  let limits = ctx.backend.limits();
  if len <= limits.section_limit {
    ctx
      .backend
      .create_from_bytes(CreateFromBytesInput {
        target,
        data: &sentinel_payload(rank, len),
      })
      .await?;
  } else {
    ctx
      .backend
      .create_object(CreateObjectInput { target, size: len })
      .await?;
    let chunk_limit = min(ctx.cfg.fragment_limit, limits.fragment_limit);
    write_sentinel_range(ctx.backend, target, rank, 0, len, chunk_limit).await?;
  };
  debug!(object = %target, rank, len, "seeded source object");
  Ok(())
}

/// Seeds the source objects of the read patterns. Untimed. Returns once every worker's objects exist.
pub(crate) async fn op_prepare(ctx: Ctx<'_>, req: OpPrepareInput) -> OpResult<()> {
  let source = &ctx.cfg.source;
  let size = ctx.cfg.source_size;
  if req.shared {
    leader_only(ctx.rt, || seed_object(ctx, source, LEADER_RANK, size)).await?;
  };
  if req.per_rank {
    let rank = ctx.rank();
    let target = match req.own_container {
      true => source.for_rank_in_own_container(rank),
      false => source.for_rank(rank),
    };
    let res = seed_object(ctx, &target, rank, size).await;
    together(ctx.rt, res).await?;
  };
  Ok(())
}
