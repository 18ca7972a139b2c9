use async_trait::async_trait;
use iobench_universal_client::fs::FileSystemStore;
use iobench_universal_client::memory::MemoryStore;
use iobench_universal_client::BackendLimits;
use iobench_universal_client::BackendResult;
use iobench_universal_client::CommitFragmentsInput;
use iobench_universal_client::CreateFromBytesInput;
use iobench_universal_client::CreateObjectInput;
use iobench_universal_client::FragmentInfo;
use iobench_universal_client::ObjectPath;
use iobench_universal_client::ReadRangeInput;
use iobench_universal_client::StorageBackend;
use iobench_universal_client::WriteFragmentInput;
use iobench_universal_client::WriteRangeInput;
use libiobench::ctx::Ctx;
use libiobench::op::OpError;
use libiobench::op::OpResult;
use libiobench::pattern::run_pattern;
use libiobench::pattern::Pattern;
use libiobench::report::PatternReport;
use libiobench::runtime::LocalTeam;
use libiobench::BenchCfg;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::tempdir;
use tracing_test::traced_test;

/// Wraps a `MemoryStore`, recording every commit. Can drop the last fragment of each commit, or silently skip the range write starting at a given offset.
struct RecordingStore {
  inner: MemoryStore,
  commits: Mutex<Vec<Vec<String>>>,
  drop_last_fragment: bool,
  skip_range_write_at: Option<u64>,
}

impl RecordingStore {
  fn new(limits: BackendLimits) -> Self {
    Self {
      inner: MemoryStore::new(limits),
      commits: Mutex::new(Vec::new()),
      drop_last_fragment: false,
      skip_range_write_at: None,
    }
  }

  fn metric(&self, name: &str) -> u64 {
    self
      .inner
      .metrics()
      .into_iter()
      .find(|(k, _)| *k == name)
      .unwrap()
      .1
  }
}

#[async_trait]
impl StorageBackend for RecordingStore {
  fn name(&self) -> &'static str {
    "recording"
  }

  fn limits(&self) -> BackendLimits {
    self.inner.limits()
  }

  fn metrics(&self) -> Vec<(&'static str, u64)> {
    self.inner.metrics()
  }

  async fn get_size(&self, target: &ObjectPath) -> BackendResult<u64> {
    self.inner.get_size(target).await
  }

  async fn read_range<'a>(&'a self, input: ReadRangeInput<'a>) -> BackendResult<Vec<u8>> {
    self.inner.read_range(input).await
  }

  async fn read_all(&self, target: &ObjectPath) -> BackendResult<Vec<u8>> {
    self.inner.read_all(target).await
  }

  async fn write_fragment<'a>(&'a self, input: WriteFragmentInput<'a>) -> BackendResult<()> {
    self.inner.write_fragment(input).await
  }

  async fn list_uncommitted_fragments(&self, target: &ObjectPath) -> BackendResult<Vec<FragmentInfo>> {
    self.inner.list_uncommitted_fragments(target).await
  }

  async fn commit_fragments<'a>(&'a self, mut input: CommitFragmentsInput<'a>) -> BackendResult<()> {
    self.commits.lock().push(input.ordered_ids.clone());
    if self.drop_last_fragment {
      input.ordered_ids.pop();
    };
    self.inner.commit_fragments(input).await
  }

  async fn create_object<'a>(&'a self, input: CreateObjectInput<'a>) -> BackendResult<()> {
    self.inner.create_object(input).await
  }

  async fn write_range<'a>(&'a self, input: WriteRangeInput<'a>) -> BackendResult<()> {
    if self.skip_range_write_at == Some(input.start) {
      return Ok(());
    };
    self.inner.write_range(input).await
  }

  async fn create_from_bytes<'a>(&'a self, input: CreateFromBytesInput<'a>) -> BackendResult<()> {
    self.inner.create_from_bytes(input).await
  }
}

fn limits(fragment_limit: u64) -> BackendLimits {
  BackendLimits {
    fragment_limit,
    section_limit: 1 << 20,
    precision: 5,
  }
}

fn cfg(bytes_per_rank: u64, fragment_limit: u64) -> BenchCfg {
  BenchCfg {
    source: ObjectPath::new("bench", "source.bin"),
    source_size: 600,
    target: ObjectPath::new("bench", "out.bin"),
    bytes_per_rank,
    fragment_limit,
    section_limit: 128,
    repeat: 1,
    precision: 5,
    verify: true,
  }
}

async fn run<B: StorageBackend + 'static>(
  world_size: usize,
  backend: Arc<B>,
  cfg: BenchCfg,
  pattern: Pattern,
) -> Vec<OpResult<PatternReport>> {
  let cfg = Arc::new(cfg);
  LocalTeam::run(world_size, |rt| {
    let backend = backend.clone();
    let cfg = cfg.clone();
    async move { run_pattern(Ctx::new(&rt, backend.as_ref(), &cfg), pattern).await }
  })
  .await
}

#[traced_test]
#[tokio::test]
async fn test_fragmented_writers_two_ranks() {
  let store = Arc::new(RecordingStore::new(limits(100)));
  let out = run(2, store.clone(), cfg(250, 100), Pattern::SingleObjectFragmentedWriters).await;
  let reports = out.into_iter().map(|r| r.unwrap()).collect::<Vec<_>>();

  let commits = store.commits.lock().clone();
  assert_eq!(commits, vec![vec![
    "00000-00000",
    "00000-00001",
    "00000-00002",
    "00001-00000",
    "00001-00001",
    "00001-00002",
  ]]);
  let object = store.read_all(&ObjectPath::new("bench", "out.bin")).await.unwrap();
  assert_eq!(object.len(), 500);
  assert!(object[..250].iter().all(|b| *b == 0));
  assert!(object[250..].iter().all(|b| *b == 1));
  assert_eq!(store.metric("fragment_write_count"), 6);

  for report in reports.iter() {
    assert_eq!(report.pattern, Pattern::SingleObjectFragmentedWriters);
    assert_eq!(report.total_bytes, 500);
    assert_eq!(report.trials, 1);
    assert_eq!(report.latency, reports[0].latency);
    assert!(report.latency.min <= report.latency.avg && report.latency.avg <= report.latency.max);
  }
  assert!(reports[0].postprocessing_secs.is_some());
  assert!(reports[1].postprocessing_secs.is_none());
}

#[tokio::test]
async fn test_fragmented_writers_commit_every_trial() {
  let store = Arc::new(RecordingStore::new(limits(64)));
  let mut c = cfg(100, 64);
  c.repeat = 3;
  let out = run(3, store.clone(), c, Pattern::SingleObjectFragmentedWriters).await;
  for res in out {
    assert_eq!(res.unwrap().trials, 3);
  }
  assert_eq!(store.commits.lock().len(), 3);
  assert_eq!(store.metric("commit_count"), 3);
  assert_eq!(store.metric("fragment_write_count"), 18);
  // Staging is emptied by every commit.
  let target = ObjectPath::new("bench", "out.bin");
  assert!(store.list_uncommitted_fragments(&target).await.unwrap().is_empty());
  assert_eq!(store.get_size(&target).await.unwrap(), 300);
}

#[tokio::test]
async fn test_fragment_limit_above_backend_limit_fails_before_io() {
  let store = Arc::new(RecordingStore::new(limits(50)));
  let out = run(2, store.clone(), cfg(250, 100), Pattern::SingleObjectFragmentedWriters).await;
  for res in out {
    assert!(matches!(res, Err(OpError::PartitionOverflow {
      requested: 100,
      limit: 50
    })));
  }
  assert_eq!(store.metric("fragment_write_count"), 0);
}

#[traced_test]
#[tokio::test]
async fn test_verification_failure_aborts_every_worker() {
  let mut store = RecordingStore::new(limits(100));
  store.drop_last_fragment = true;
  let store = Arc::new(store);
  let mut c = cfg(250, 100);
  c.repeat = 4;
  let out = run(3, store.clone(), c, Pattern::SingleObjectFragmentedWriters).await;
  assert!(matches!(out[0], Err(OpError::SizeMismatch {
    expected: 750,
    actual: 700
  })));
  assert!(matches!(out[1], Err(OpError::PeerAborted)));
  assert!(matches!(out[2], Err(OpError::PeerAborted)));
  // The remaining trials were not run.
  assert_eq!(store.commits.lock().len(), 1);
}

#[tokio::test]
async fn test_range_writers() {
  let store = Arc::new(RecordingStore::new(limits(100)));
  let mut c = cfg(250, 100);
  c.repeat = 2;
  let out = run(3, store.clone(), c, Pattern::SingleObjectRangeWriters).await;
  let reports = out.into_iter().map(|r| r.unwrap()).collect::<Vec<_>>();
  let object = store.read_all(&ObjectPath::new("bench", "out.bin")).await.unwrap();
  assert_eq!(object.len(), 750);
  for rank in 0..3 {
    assert!(object[rank * 250..(rank + 1) * 250].iter().all(|b| *b == rank as u8));
  }
  // 3 chunks per rank per trial.
  assert_eq!(store.metric("write_op_count"), 18);
  assert_eq!(store.metric("create_count"), 2);
  assert!(reports[0].create_secs.is_some());
  assert!(reports[1].create_secs.is_none());
  assert_eq!(reports[2].total_bytes, 750);
  assert!(store.commits.lock().is_empty());
}

#[traced_test]
#[tokio::test]
async fn test_range_verification_failure_aborts_every_worker() {
  let mut store = RecordingStore::new(limits(100));
  // Rank 1's first chunk never lands.
  store.skip_range_write_at = Some(250);
  let store = Arc::new(store);
  let mut c = cfg(250, 100);
  c.repeat = 3;
  let out = run(2, store.clone(), c, Pattern::SingleObjectRangeWriters).await;
  assert!(matches!(out[0], Err(OpError::DataMismatch {
    rank: 1,
    matching: 150,
    expected: 250
  })));
  assert!(matches!(out[1], Err(OpError::PeerAborted)));
  // The remaining trials were not run.
  assert_eq!(store.metric("create_count"), 1);
  assert_eq!(store.metric("write_op_count"), 5);
}

#[tokio::test]
async fn test_per_rank_writers() {
  let store = Arc::new(RecordingStore::new(limits(100)));
  let mut c = cfg(300, 100);
  c.section_limit = 1000;
  let out = run(2, store.clone(), c, Pattern::PerRankContainersMultipleWriters).await;
  for res in out {
    let report = res.unwrap();
    assert_eq!(report.pattern, Pattern::PerRankContainersMultipleWriters);
    assert_eq!(report.total_bytes, 600);
  }
  for rank in 0..2usize {
    let p = ObjectPath::new(format!("bench{rank:05}"), format!("out.bin{rank:05}"));
    assert_eq!(store.read_all(&p).await.unwrap(), vec![rank as u8; 300]);
  }
}

#[tokio::test]
async fn test_per_rank_writers_reject_oversized_objects() {
  let store = Arc::new(RecordingStore::new(limits(100)));
  let mut c = cfg(300, 100);
  c.section_limit = 200;
  let out = run(2, store.clone(), c, Pattern::PerRankObjectsMultipleWriters).await;
  for res in out {
    assert!(matches!(res, Err(OpError::PartitionOverflow {
      requested: 300,
      limit: 200
    })));
  }
  assert_eq!(store.metric("create_count"), 0);
}

#[traced_test]
#[tokio::test]
async fn test_readers() {
  let store = Arc::new(RecordingStore::new(limits(100)));

  let out = run(3, store.clone(), cfg(0, 100), Pattern::SingleObjectMultipleReaders).await;
  for res in out {
    assert_eq!(res.unwrap().total_bytes, 1800);
  }
  // 600 bytes in sections of 128, by each of 3 workers.
  assert_eq!(store.metric("read_op_count"), 15);

  let out = run(3, store.clone(), cfg(0, 100), Pattern::SingleObjectPartitionedReaders).await;
  for res in out {
    assert_eq!(res.unwrap().total_bytes, 600);
  }
  assert_eq!(store.metric("read_op_count"), 15 + 6);

  let out = run(7, store.clone(), cfg(0, 100), Pattern::SingleObjectPartitionedReaders).await;
  for res in out {
    assert!(matches!(res, Err(OpError::Configuration(_))));
  }

  let out = run(2, store.clone(), cfg(0, 100), Pattern::PerRankObjectsMultipleReaders).await;
  for res in out {
    assert_eq!(res.unwrap().total_bytes, 1200);
  }
  assert_eq!(
    store.read_all(&ObjectPath::new("bench", "source.bin00001")).await.unwrap(),
    vec![1u8; 600]
  );
}

#[tokio::test]
async fn test_per_rank_readers_reseed_sources() {
  let store = Arc::new(RecordingStore::new(limits(100)));
  // Another run left a shorter per-rank source behind; the pattern reseeds it first.
  store
    .create_from_bytes(CreateFromBytesInput {
      target: &ObjectPath::new("bench00000", "source.bin00000"),
      data: &[0u8; 10],
    })
    .await
    .unwrap();
  let out = run(1, store.clone(), cfg(0, 100), Pattern::PerRankContainersMultipleReaders).await;
  assert_eq!(out[0].as_ref().unwrap().total_bytes, 600);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_by_every_worker() {
  let store = Arc::new(RecordingStore::new(limits(100)));
  let mut c = cfg(100, 100);
  c.repeat = 0;
  let out = run(2, store, c, Pattern::SingleObjectRangeWriters).await;
  for res in out {
    assert!(matches!(res, Err(OpError::Configuration(_))));
  }
}

#[traced_test]
#[tokio::test]
async fn test_fragmented_writers_on_filesystem() {
  let dir = tempdir().unwrap();
  let store = Arc::new(FileSystemStore::new(
    dir.path().to_path_buf(),
    FileSystemStore::default_limits(),
    false,
  ));
  let mut c = cfg(1000, 300);
  c.repeat = 2;
  let out = run(4, store.clone(), c, Pattern::SingleObjectFragmentedWriters).await;
  for res in out {
    assert_eq!(res.unwrap().total_bytes, 4000);
  }
  let object = store.read_all(&ObjectPath::new("bench", "out.bin")).await.unwrap();
  assert_eq!(object.len(), 4000);
  for rank in 0..4 {
    assert!(object[rank * 1000..(rank + 1) * 1000].iter().all(|b| *b == rank as u8));
  }
}

#[traced_test]
#[tokio::test]
async fn test_range_writers_on_filesystem() {
  let dir = tempdir().unwrap();
  let store = Arc::new(FileSystemStore::new(
    dir.path().to_path_buf(),
    FileSystemStore::default_limits(),
    false,
  ));
  let mut c = cfg(1000, 300);
  c.repeat = 2;
  let out = run(3, store.clone(), c, Pattern::SingleObjectRangeWriters).await;
  let reports = out.into_iter().map(|r| r.unwrap()).collect::<Vec<_>>();
  assert_eq!(reports[0].total_bytes, 3000);
  assert_eq!(reports[0].trials, 2);
  assert!(reports[0].create_secs.is_some());
  let object = store.read_all(&ObjectPath::new("bench", "out.bin")).await.unwrap();
  assert_eq!(object.len(), 3000);
  for rank in 0..3 {
    assert!(object[rank * 1000..(rank + 1) * 1000].iter().all(|b| *b == rank as u8));
  }
}

#[tokio::test]
async fn test_per_rank_writers_on_filesystem() {
  let dir = tempdir().unwrap();
  let store = Arc::new(FileSystemStore::new(
    dir.path().to_path_buf(),
    FileSystemStore::default_limits(),
    false,
  ));
  let mut c = cfg(500, 300);
  c.section_limit = 1000;
  let out = run(2, store.clone(), c, Pattern::PerRankContainersMultipleWriters).await;
  for res in out {
    assert_eq!(res.unwrap().total_bytes, 1000);
  }
  for rank in 0..2usize {
    let p = ObjectPath::new(format!("bench{rank:05}"), format!("out.bin{rank:05}"));
    assert_eq!(store.read_all(&p).await.unwrap(), vec![rank as u8; 500]);
  }
}
