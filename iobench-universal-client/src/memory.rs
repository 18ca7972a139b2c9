use crate::check_fragment_id;
use crate::check_range;
use crate::BackendError;
use crate::BackendLimits;
use crate::BackendResult;
use crate::CommitFragmentsInput;
use crate::CreateFromBytesInput;
use crate::CreateObjectInput;
use crate::FragmentInfo;
use crate::ObjectPath;
use crate::ReadRangeInput;
use crate::StorageBackend;
use crate::WriteFragmentInput;
use crate::WriteRangeInput;
use crate::MIB;
use ahash::HashMap;
use ahash::HashMapExt;
use async_trait::async_trait;
use off64::u64;
use off64::usz;
use parking_lot::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use tracing::trace;

#[rustfmt::skip]
#[derive(Default)]
struct Metrics {
  read_op_count: AtomicU64,
  read_op_bytes: AtomicU64,
  write_op_count: AtomicU64,
  write_op_bytes: AtomicU64,
  fragment_write_count: AtomicU64,
  commit_count: AtomicU64,
  create_count: AtomicU64,
}

/// In-process object store. Objects support ranged reads and writes, and each object has a staging area of uncommitted fragments (blocks) that a commit assembles into the object.
pub struct MemoryStore {
  limits: BackendLimits,
  objects: Mutex<HashMap<ObjectPath, Vec<u8>>>,
  // Kept in write order; a rewrite of an existing ID replaces it in place.
  fragments: Mutex<HashMap<ObjectPath, Vec<(String, Vec<u8>)>>>,
  metrics: Metrics,
}

impl MemoryStore {
  pub fn new(limits: BackendLimits) -> Self {
    Self {
      limits,
      objects: Mutex::new(HashMap::new()),
      fragments: Mutex::new(HashMap::new()),
      metrics: Metrics::default(),
    }
  }

  pub fn default_limits() -> BackendLimits {
    BackendLimits {
      fragment_limit: 100 * MIB,
      section_limit: 1024 * MIB,
      precision: 5,
    }
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new(Self::default_limits())
  }
}

#[async_trait]
impl StorageBackend for MemoryStore {
  fn name(&self) -> &'static str {
    "memory"
  }

  fn limits(&self) -> BackendLimits {
    self.limits
  }

  #[rustfmt::skip]
  fn metrics(&self) -> Vec<(&'static str, u64)> {
    let m = &self.metrics;
    vec![
      ("commit_count", m.commit_count.load(Relaxed)),
      ("create_count", m.create_count.load(Relaxed)),
      ("fragment_write_count", m.fragment_write_count.load(Relaxed)),
      ("object_count", u64!(self.objects.lock().len())),
      ("read_op_bytes", m.read_op_bytes.load(Relaxed)),
      ("read_op_count", m.read_op_count.load(Relaxed)),
      ("write_op_bytes", m.write_op_bytes.load(Relaxed)),
      ("write_op_count", m.write_op_count.load(Relaxed)),
    ]
  }

  async fn get_size(&self, target: &ObjectPath) -> BackendResult<u64> {
    self
      .objects
      .lock()
      .get(target)
      .map(|o| u64!(o.len()))
      .ok_or(BackendError::ObjectNotFound)
  }

  async fn read_range<'a>(&'a self, input: ReadRangeInput<'a>) -> BackendResult<Vec<u8>> {
    let objects = self.objects.lock();
    let obj = objects.get(input.target).ok_or(BackendError::ObjectNotFound)?;
    check_range(u64!(obj.len()), input.start, input.end, None)?;
    let data = obj[usz!(input.start)..=usz!(input.end)].to_vec();
    self.metrics.read_op_count.fetch_add(1, Relaxed);
    self.metrics.read_op_bytes.fetch_add(u64!(data.len()), Relaxed);
    Ok(data)
  }

  async fn read_all(&self, target: &ObjectPath) -> BackendResult<Vec<u8>> {
    let data = self
      .objects
      .lock()
      .get(target)
      .cloned()
      .ok_or(BackendError::ObjectNotFound)?;
    self.metrics.read_op_count.fetch_add(1, Relaxed);
    self.metrics.read_op_bytes.fetch_add(u64!(data.len()), Relaxed);
    Ok(data)
  }

  async fn write_fragment<'a>(&'a self, input: WriteFragmentInput<'a>) -> BackendResult<()> {
    check_fragment_id(input.fragment_id)?;
    if u64!(input.data.len()) > self.limits.fragment_limit {
      return Err(BackendError::FragmentTooLarge);
    };
    let mut fragments = self.fragments.lock();
    let staged = fragments.entry(input.target.clone()).or_default();
    match staged.iter_mut().find(|(id, _)| id == input.fragment_id) {
      Some((_, data)) => *data = input.data.to_vec(),
      None => staged.push((input.fragment_id.to_string(), input.data.to_vec())),
    };
    self.metrics.fragment_write_count.fetch_add(1, Relaxed);
    self.metrics.write_op_bytes.fetch_add(u64!(input.data.len()), Relaxed);
    trace!(object = %input.target, fragment_id = input.fragment_id, len = input.data.len(), "staged fragment");
    Ok(())
  }

  async fn list_uncommitted_fragments(&self, target: &ObjectPath) -> BackendResult<Vec<FragmentInfo>> {
    Ok(
      self
        .fragments
        .lock()
        .get(target)
        .map(|staged| {
          staged
            .iter()
            .map(|(id, data)| FragmentInfo {
              id: id.clone(),
              size: u64!(data.len()),
            })
            .collect()
        })
        .unwrap_or_default(),
    )
  }

  async fn commit_fragments<'a>(&'a self, input: CommitFragmentsInput<'a>) -> BackendResult<()> {
    // Lock order is always fragments then objects.
    let mut fragments = self.fragments.lock();
    let staged = fragments.get(input.target).map(|s| s.as_slice()).unwrap_or_default();
    let mut assembled = Vec::new();
    for id in input.ordered_ids.iter() {
      let Some((_, data)) = staged.iter().find(|(sid, _)| sid == id) else {
        return Err(BackendError::FragmentNotFound(id.clone()));
      };
      assembled.extend_from_slice(data);
    }
    fragments.remove(input.target);
    self.objects.lock().insert(input.target.clone(), assembled);
    self.metrics.commit_count.fetch_add(1, Relaxed);
    Ok(())
  }

  async fn create_object<'a>(&'a self, input: CreateObjectInput<'a>) -> BackendResult<()> {
    self
      .objects
      .lock()
      .insert(input.target.clone(), vec![0u8; usz!(input.size)]);
    self.metrics.create_count.fetch_add(1, Relaxed);
    Ok(())
  }

  async fn write_range<'a>(&'a self, input: WriteRangeInput<'a>) -> BackendResult<()> {
    if u64!(input.data.len()) > self.limits.fragment_limit {
      return Err(BackendError::FragmentTooLarge);
    };
    let mut objects = self.objects.lock();
    let obj = objects.get_mut(input.target).ok_or(BackendError::ObjectNotFound)?;
    check_range(u64!(obj.len()), input.start, input.end, Some(u64!(input.data.len())))?;
    obj[usz!(input.start)..=usz!(input.end)].copy_from_slice(input.data);
    self.metrics.write_op_count.fetch_add(1, Relaxed);
    self.metrics.write_op_bytes.fetch_add(u64!(input.data.len()), Relaxed);
    Ok(())
  }

  async fn create_from_bytes<'a>(&'a self, input: CreateFromBytesInput<'a>) -> BackendResult<()> {
    if u64!(input.data.len()) > self.limits.section_limit {
      return Err(BackendError::ObjectTooLarge);
    };
    self
      .objects
      .lock()
      .insert(input.target.clone(), input.data.to_vec());
    self.metrics.create_count.fetch_add(1, Relaxed);
    self.metrics.write_op_bytes.fetch_add(u64!(input.data.len()), Relaxed);
    Ok(())
  }
}
