use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;

pub mod fs;
pub mod memory;

pub const MIB: u64 = 1024 * 1024;

/// Width of the zero-padded rank suffix used for per-rank objects and containers.
pub const RANK_SUFFIX_WIDTH: usize = 5;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ObjectPath {
  pub container: String,
  pub path: String,
}

impl ObjectPath {
  pub fn new(container: impl Into<String>, path: impl Into<String>) -> Self {
    Self {
      container: container.into(),
      path: path.into(),
    }
  }

  /// The object owned exclusively by `rank`, e.g. `out.bin` becomes `out.bin00003`.
  pub fn for_rank(&self, rank: usize) -> Self {
    Self {
      container: self.container.clone(),
      path: format!("{}{:0>width$}", self.path, rank, width = RANK_SUFFIX_WIDTH),
    }
  }

  /// Same as `for_rank`, but the container is also suffixed with the rank.
  pub fn for_rank_in_own_container(&self, rank: usize) -> Self {
    let mut p = self.for_rank(rank);
    p.container = format!("{}{:0>width$}", self.container, rank, width = RANK_SUFFIX_WIDTH);
    p
  }
}

impl Display for ObjectPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.container, self.path)
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BackendLimits {
  /// Largest payload accepted by a single `write_fragment` or `write_range` call.
  pub fragment_limit: u64,
  /// Largest payload accepted by `create_from_bytes`, and the largest single ranged read issued by benchmarks.
  pub section_limit: u64,
  /// Decimal digits kept when rounding timings measured against this backend.
  pub precision: u32,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FragmentInfo {
  pub id: String,
  pub size: u64,
}

pub struct ReadRangeInput<'a> {
  pub target: &'a ObjectPath,
  pub start: u64,
  /// Inclusive.
  pub end: u64,
}

pub struct WriteFragmentInput<'a> {
  pub target: &'a ObjectPath,
  pub fragment_id: &'a str,
  pub data: &'a [u8],
}

pub struct CommitFragmentsInput<'a> {
  pub target: &'a ObjectPath,
  pub ordered_ids: Vec<String>,
}

pub struct CreateObjectInput<'a> {
  pub target: &'a ObjectPath,
  pub size: u64,
}

pub struct WriteRangeInput<'a> {
  pub target: &'a ObjectPath,
  pub start: u64,
  /// Inclusive.
  pub end: u64,
  pub data: &'a [u8],
}

pub struct CreateFromBytesInput<'a> {
  pub target: &'a ObjectPath,
  pub data: &'a [u8],
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug)]
pub enum BackendError {
  ObjectNotFound,
  FragmentNotFound(String),
  InvalidFragmentId(String),
  RangeOutOfBounds,
  ObjectTooLarge,
  FragmentTooLarge,
  Io(io::Error),
}

impl Display for BackendError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BackendError::ObjectNotFound => write!(f, "object does not exist"),
      BackendError::FragmentNotFound(id) => write!(f, "uncommitted fragment {id} does not exist"),
      BackendError::InvalidFragmentId(id) => write!(f, "fragment ID {id:?} is invalid"),
      BackendError::RangeOutOfBounds => write!(f, "requested range to read or write is invalid"),
      BackendError::ObjectTooLarge => write!(f, "object is too large"),
      BackendError::FragmentTooLarge => write!(f, "fragment is too large"),
      BackendError::Io(err) => write!(f, "I/O error: {err}"),
    }
  }
}

impl Error for BackendError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      BackendError::Io(err) => Some(err),
      _ => None,
    }
  }
}

impl From<io::Error> for BackendError {
  fn from(err: io::Error) -> Self {
    match err.kind() {
      io::ErrorKind::NotFound => BackendError::ObjectNotFound,
      _ => BackendError::Io(err),
    }
  }
}

/// Checks a range request against an object of `size` bytes and the length of the payload (if any) that accompanies it.
pub(crate) fn check_range(size: u64, start: u64, end: u64, data_len: Option<u64>) -> BackendResult<()> {
  if end < start || end >= size {
    return Err(BackendError::RangeOutOfBounds);
  };
  if let Some(len) = data_len {
    if len != end - start + 1 {
      return Err(BackendError::RangeOutOfBounds);
    };
  };
  Ok(())
}

/// Fragment IDs become file names on some backends, so they must stay within a conservative character set.
pub(crate) fn check_fragment_id(id: &str) -> BackendResult<()> {
  let valid = !id.is_empty()
    && id
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if !valid {
    return Err(BackendError::InvalidFragmentId(id.to_string()));
  };
  Ok(())
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
  fn name(&self) -> &'static str;
  fn limits(&self) -> BackendLimits;
  fn metrics(&self) -> Vec<(&'static str, u64)>;
  async fn get_size(&self, target: &ObjectPath) -> BackendResult<u64>;
  async fn read_range<'a>(&'a self, input: ReadRangeInput<'a>) -> BackendResult<Vec<u8>>;
  async fn read_all(&self, target: &ObjectPath) -> BackendResult<Vec<u8>>;
  async fn write_fragment<'a>(&'a self, input: WriteFragmentInput<'a>) -> BackendResult<()>;
  /// Order is unspecified.
  async fn list_uncommitted_fragments(&self, target: &ObjectPath) -> BackendResult<Vec<FragmentInfo>>;
  async fn commit_fragments<'a>(&'a self, input: CommitFragmentsInput<'a>) -> BackendResult<()>;
  async fn create_object<'a>(&'a self, input: CreateObjectInput<'a>) -> BackendResult<()>;
  async fn write_range<'a>(&'a self, input: WriteRangeInput<'a>) -> BackendResult<()>;
  async fn create_from_bytes<'a>(&'a self, input: CreateFromBytesInput<'a>) -> BackendResult<()>;
}
