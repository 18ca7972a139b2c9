use crate::fragment::partition;
use crate::payload::sentinel_payload;
use crate::runtime::agree;
use crate::runtime::ParallelRuntime;
use iobench_universal_client::BackendError;
use iobench_universal_client::ObjectPath;
use iobench_universal_client::ReadRangeInput;
use iobench_universal_client::StorageBackend;
use iobench_universal_client::WriteRangeInput;
use off64::usz;
use std::cmp::min;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::future::Future;
use std::ops::Range;

pub mod prepare;
pub mod read_partitioned;
pub mod read_per_rank;
pub mod read_single_object;
pub mod write_fragmented;
pub mod write_per_rank;
pub mod write_ranges;

pub type OpResult<T> = Result<T, OpError>;

#[derive(Debug)]
pub enum OpError {
  Configuration(String),
  SizeMismatch { expected: u64, actual: u64 },
  DataMismatch { rank: usize, matching: u64, expected: u64 },
  Backend(BackendError),
  PartitionOverflow { requested: u64, limit: u64 },
  /// Another worker failed, so this one stopped too.
  PeerAborted,
}

impl Display for OpError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OpError::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
      OpError::SizeMismatch { expected, actual } => {
        write!(f, "size mismatch: expected {expected} bytes, found {actual}")
      }
      OpError::DataMismatch {
        rank,
        matching,
        expected,
      } => write!(
        f,
        "data mismatch: section of rank {rank} has {matching} of {expected} expected bytes"
      ),
      OpError::Backend(err) => write!(f, "storage backend call failed: {err}"),
      OpError::PartitionOverflow { requested, limit } => write!(
        f,
        "{requested} bytes per rank exceeds the backend limit of {limit} bytes"
      ),
      OpError::PeerAborted => write!(f, "another worker aborted the pattern"),
    }
  }
}

impl Error for OpError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      OpError::Backend(err) => Some(err),
      _ => None,
    }
  }
}

impl From<BackendError> for OpError {
  fn from(err: BackendError) -> Self {
    OpError::Backend(err)
  }
}

pub(crate) fn check_partition_limit(requested: u64, limit: u64) -> OpResult<()> {
  if requested > limit {
    return Err(OpError::PartitionOverflow { requested, limit });
  };
  Ok(())
}

/// Has the whole team agree on whether every worker's `res` is Ok. A worker that succeeded while another failed gets `PeerAborted`.
pub(crate) async fn together<T>(rt: &dyn ParallelRuntime, res: OpResult<T>) -> OpResult<T> {
  let agreed = agree(rt, res.is_ok()).await;
  match res {
    Err(err) => Err(err),
    Ok(_) if !agreed => Err(OpError::PeerAborted),
    Ok(v) => Ok(v),
  }
}

/// Runs `step` on the leader only, then has the whole team agree on whether it succeeded. Non-leaders get `Ok(None)`, or `PeerAborted` if the leader failed.
pub(crate) async fn leader_only<T, F, Fut>(rt: &dyn ParallelRuntime, step: F) -> OpResult<Option<T>>
where
  F: FnOnce() -> Fut,
  Fut: Future<Output = OpResult<T>>,
{
  let res = match rt.is_leader() {
    true => step().await.map(Some),
    false => Ok(None),
  };
  together(rt, res).await
}

/// Reads `range` of an object using reads of at most `section_limit` bytes, passing each section to `on_section`.
pub(crate) async fn read_sections(
  backend: &dyn StorageBackend,
  target: &ObjectPath,
  range: Range<u64>,
  section_limit: u64,
  mut on_section: impl FnMut(&[u8]) + Send,
) -> OpResult<u64> {
  let mut read = 0;
  for section in partition(range.end - range.start, section_limit) {
    let data = backend
      .read_range(ReadRangeInput {
        target,
        start: range.start + section.start,
        end: range.start + section.end - 1,
      })
      .await?;
    read += data.len() as u64;
    on_section(&data);
  }
  Ok(read)
}

/// Fills `len` bytes of an existing object starting at `offset` with `rank`'s sentinel byte, using writes of at most `chunk_limit` bytes.
pub(crate) async fn write_sentinel_range(
  backend: &dyn StorageBackend,
  target: &ObjectPath,
  rank: usize,
  offset: u64,
  len: u64,
  chunk_limit: u64,
) -> OpResult<()> {
  let buf = sentinel_payload(rank, min(len, chunk_limit));
  for chunk in partition(len, chunk_limit) {
    backend
      .write_range(WriteRangeInput {
        target,
        start: offset + chunk.start,
        end: offset + chunk.end - 1,
        data: &buf[..usz!(chunk.end - chunk.start)],
      })
      .await?;
  }
  Ok(())
}
