use crate::op::read_sections;
use crate::op::OpError;
use crate::op::OpResult;
use crate::payload::count_sentinel;
use iobench_universal_client::ObjectPath;
use iobench_universal_client::StorageBackend;
use tracing::info;
use tracing::warn;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
  Passed,
  SizeMismatch { expected: u64, actual: u64 },
  DataMismatch { rank: usize, matching: u64, expected: u64 },
}

impl Verdict {
  pub fn is_passed(&self) -> bool {
    matches!(self, Verdict::Passed)
  }

  pub fn into_result(self) -> OpResult<()> {
    match self {
      Verdict::Passed => Ok(()),
      Verdict::SizeMismatch { expected, actual } => Err(OpError::SizeMismatch { expected, actual }),
      Verdict::DataMismatch {
        rank,
        matching,
        expected,
      } => Err(OpError::DataMismatch {
        rank,
        matching,
        expected,
      }),
    }
  }
}

/// Checks a shared object written by `world_size` ranks of `expected_bytes_per_rank` bytes each: first the total size, then that every rank's section holds only that rank's sentinel byte. Stops at the first failure. Sections are read in pieces of at most `section_limit` bytes.
pub async fn verify(
  backend: &dyn StorageBackend,
  target: &ObjectPath,
  expected_bytes_per_rank: u64,
  world_size: usize,
  section_limit: u64,
) -> OpResult<Verdict> {
  let expected_size = expected_bytes_per_rank
    .checked_mul(world_size as u64)
    .ok_or_else(|| OpError::Configuration("expected object size overflows".into()))?;
  let actual = backend.get_size(target).await?;
  if actual != expected_size {
    warn!(object = %target, expected = expected_size, actual, "size mismatch");
    return Ok(Verdict::SizeMismatch {
      expected: expected_size,
      actual,
    });
  };

  for rank in 0..world_size {
    let start = rank as u64 * expected_bytes_per_rank;
    let mut matching = 0;
    read_sections(
      backend,
      target,
      start..start + expected_bytes_per_rank,
      section_limit,
      |section| matching += count_sentinel(section, rank),
    )
    .await?;
    if matching != expected_bytes_per_rank {
      warn!(object = %target, rank, matching, expected = expected_bytes_per_rank, "data mismatch");
      return Ok(Verdict::DataMismatch {
        rank,
        matching,
        expected: expected_bytes_per_rank,
      });
    };
  }

  info!(object = %target, size = actual, world_size, "verified shared object");
  Ok(Verdict::Passed)
}

/// Checks an object written entirely by `rank`.
pub async fn verify_rank_object(
  backend: &dyn StorageBackend,
  target: &ObjectPath,
  rank: usize,
  expected_bytes: u64,
  section_limit: u64,
) -> OpResult<Verdict> {
  let actual = backend.get_size(target).await?;
  if actual != expected_bytes {
    warn!(object = %target, expected = expected_bytes, actual, "size mismatch");
    return Ok(Verdict::SizeMismatch {
      expected: expected_bytes,
      actual,
    });
  };
  let mut matching = 0;
  read_sections(backend, target, 0..actual, section_limit, |section| {
    matching += count_sentinel(section, rank)
  })
  .await?;
  if matching != expected_bytes {
    warn!(object = %target, rank, matching, expected = expected_bytes, "data mismatch");
    return Ok(Verdict::DataMismatch {
      rank,
      matching,
      expected: expected_bytes,
    });
  };
  Ok(Verdict::Passed)
}
