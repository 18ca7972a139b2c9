use crate::ctx::Ctx;
use crate::op::prepare::op_prepare;
use crate::op::prepare::OpPrepareInput;
use crate::op::read_partitioned::op_read_partitioned;
use crate::op::read_per_rank::op_read_per_rank;
use crate::op::read_per_rank::OpReadPerRankInput;
use crate::op::read_single_object::op_read_single_object;
use crate::op::write_fragmented::op_write_fragmented;
use crate::op::write_per_rank::op_write_per_rank;
use crate::op::write_per_rank::OpWritePerRankInput;
use crate::op::write_ranges::op_write_ranges;
use crate::op::OpResult;
use crate::report::PatternReport;
use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumIter;
use tracing::info;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Pattern {
  /// Every worker reads the whole shared object.
  SingleObjectMultipleReaders,
  /// Every worker reads its own equal slice of the shared object.
  SingleObjectPartitionedReaders,
  PerRankObjectsMultipleReaders,
  PerRankContainersMultipleReaders,
  /// Workers write fragments of one shared object, which the leader commits.
  SingleObjectFragmentedWriters,
  /// Workers write disjoint ranges of one pre-allocated shared object.
  SingleObjectRangeWriters,
  PerRankObjectsMultipleWriters,
  PerRankContainersMultipleWriters,
}

impl Pattern {
  pub fn is_read(self) -> bool {
    matches!(
      self,
      Pattern::SingleObjectMultipleReaders
        | Pattern::SingleObjectPartitionedReaders
        | Pattern::PerRankObjectsMultipleReaders
        | Pattern::PerRankContainersMultipleReaders
    )
  }

  pub fn title(self) -> &'static str {
    match self {
      Pattern::SingleObjectMultipleReaders => "Single object, multiple readers",
      Pattern::SingleObjectPartitionedReaders => "Single object, partitioned readers",
      Pattern::PerRankObjectsMultipleReaders => "Multiple objects, multiple readers",
      Pattern::PerRankContainersMultipleReaders => "Multiple containers, multiple readers",
      Pattern::SingleObjectFragmentedWriters => "Single object, multiple writers (fragments)",
      Pattern::SingleObjectRangeWriters => "Single object, multiple writers (ranges)",
      Pattern::PerRankObjectsMultipleWriters => "Multiple objects, multiple writers",
      Pattern::PerRankContainersMultipleWriters => "Multiple containers, multiple writers",
    }
  }

  fn prepare_input(self) -> Option<OpPrepareInput> {
    let input = |shared, per_rank, own_container| OpPrepareInput {
      shared,
      per_rank,
      own_container,
    };
    match self {
      Pattern::SingleObjectMultipleReaders | Pattern::SingleObjectPartitionedReaders => {
        Some(input(true, false, false))
      }
      Pattern::PerRankObjectsMultipleReaders => Some(input(false, true, false)),
      Pattern::PerRankContainersMultipleReaders => Some(input(false, true, true)),
      _ => None,
    }
  }
}

/// Runs one benchmark pattern on this worker. Every worker of the team must call this with the same pattern and configuration. Read patterns first seed their source objects, untimed.
pub async fn run_pattern(ctx: Ctx<'_>, pattern: Pattern) -> OpResult<PatternReport> {
  ctx.cfg.validate(ctx.world_size())?;
  if ctx.rt.is_leader() {
    info!(%pattern, world_size = ctx.world_size(), backend = ctx.backend.name(), "starting pattern");
  };
  if let Some(input) = pattern.prepare_input() {
    op_prepare(ctx, input).await?;
  };
  match pattern {
    Pattern::SingleObjectMultipleReaders => op_read_single_object(ctx).await,
    Pattern::SingleObjectPartitionedReaders => op_read_partitioned(ctx).await,
    Pattern::PerRankObjectsMultipleReaders => {
      op_read_per_rank(ctx, OpReadPerRankInput { own_container: false }).await
    }
    Pattern::PerRankContainersMultipleReaders => {
      op_read_per_rank(ctx, OpReadPerRankInput { own_container: true }).await
    }
    Pattern::SingleObjectFragmentedWriters => op_write_fragmented(ctx).await,
    Pattern::SingleObjectRangeWriters => op_write_ranges(ctx).await,
    Pattern::PerRankObjectsMultipleWriters => {
      op_write_per_rank(ctx, OpWritePerRankInput { own_container: false }).await
    }
    Pattern::PerRankContainersMultipleWriters => {
      op_write_per_rank(ctx, OpWritePerRankInput { own_container: true }).await
    }
  }
}

#[cfg(test)]
mod tests {
  use super::Pattern;
  use strum::IntoEnumIterator;

  #[test]
  fn test_names_match_serde() {
    assert_eq!(Pattern::iter().count(), 8);
    for p in Pattern::iter() {
      let json = serde_json::to_string(&p).unwrap();
      assert_eq!(json, format!("\"{p}\""));
      assert_eq!(serde_json::from_str::<Pattern>(&json).unwrap(), p);
    }
    assert_eq!(Pattern::iter().filter(|p| p.is_read()).count(), 4);
    assert_eq!(Pattern::SingleObjectRangeWriters.to_string(), "single-object-range-writers");
  }
}
