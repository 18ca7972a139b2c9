use crate::op::OpError;
use crate::op::OpResult;
use crate::util::div_ceil;
use iobench_universal_client::FragmentInfo;
use std::cmp::min;
use std::fmt;
use std::fmt::Display;
use std::ops::Range;

/// Digits of each half of a fragment ID. Lexicographic order of IDs only matches numeric (rank, sequence) order while both numbers fit in this width.
pub const FRAGMENT_ID_WIDTH: usize = 5;
pub const FRAGMENT_ID_COMPONENT_MAX: u64 = 99_999;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FragmentId {
  pub owner_rank: u64,
  pub sequence_index: u64,
}

impl FragmentId {
  pub fn new(owner_rank: u64, sequence_index: u64) -> OpResult<Self> {
    if owner_rank > FRAGMENT_ID_COMPONENT_MAX || sequence_index > FRAGMENT_ID_COMPONENT_MAX {
      return Err(OpError::Configuration(format!(
        "fragment ({owner_rank}, {sequence_index}) cannot be represented in a {FRAGMENT_ID_WIDTH}-digit fragment ID"
      )));
    };
    Ok(Self {
      owner_rank,
      sequence_index,
    })
  }

  pub fn parse(raw: &str) -> Option<Self> {
    let (rank, seq) = raw.split_once('-')?;
    if rank.len() != FRAGMENT_ID_WIDTH || seq.len() != FRAGMENT_ID_WIDTH {
      return None;
    };
    if !rank.bytes().chain(seq.bytes()).all(|b| b.is_ascii_digit()) {
      return None;
    };
    Some(Self {
      owner_rank: rank.parse().ok()?,
      sequence_index: seq.parse().ok()?,
    })
  }
}

impl Display for FragmentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{:0>w$}-{:0>w$}",
      self.owner_rank,
      self.sequence_index,
      w = FRAGMENT_ID_WIDTH
    )
  }
}

/// One size-bounded piece of a rank's payload. `range` is relative to the start of the rank's payload.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Fragment {
  pub id: FragmentId,
  pub range: Range<u64>,
}

impl Fragment {
  pub fn len(&self) -> u64 {
    self.range.end - self.range.start
  }
}

/// Splits `payload_size` bytes into `ceil(payload_size / fragment_limit)` consecutive ranges. Every range except the last is exactly `fragment_limit` long.
pub fn partition(payload_size: u64, fragment_limit: u64) -> Vec<Range<u64>> {
  assert!(fragment_limit > 0);
  (0..div_ceil(payload_size, fragment_limit))
    .map(|i| {
      let start = i * fragment_limit;
      start..min(payload_size, start + fragment_limit)
    })
    .collect()
}

/// The fragments `rank` writes for `payload_size` bytes, in the order it writes them.
pub fn fragments_for_rank(rank: u64, payload_size: u64, fragment_limit: u64) -> OpResult<Vec<Fragment>> {
  partition(payload_size, fragment_limit)
    .into_iter()
    .enumerate()
    .map(|(seq, range)| {
      Ok(Fragment {
        id: FragmentId::new(rank, seq as u64)?,
        range,
      })
    })
    .collect()
}

/// Uncommitted fragment IDs in their final order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CommitPlan {
  ids: Vec<String>,
  total_size: u64,
}

impl CommitPlan {
  /// Orders a listing by lexicographic comparison of the raw IDs, which is the global (rank, sequence) order for IDs produced by `FragmentId`.
  pub fn from_listing(mut listing: Vec<FragmentInfo>) -> Self {
    listing.sort_by(|a, b| a.id.cmp(&b.id));
    Self {
      total_size: listing.iter().map(|f| f.size).sum(),
      ids: listing.into_iter().map(|f| f.id).collect(),
    }
  }

  pub fn ids(&self) -> &[String] {
    &self.ids
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  pub fn total_size(&self) -> u64 {
    self.total_size
  }

  pub fn into_ids(self) -> Vec<String> {
    self.ids
  }
}
