use ahash::HashMap;
use bytesize::ByteSize;
use chrono::DateTime;
use chrono::Utc;
use iobench_universal_client::fs::FileSystemStore;
use iobench_universal_client::memory::MemoryStore;
use iobench_universal_client::BackendLimits;
use iobench_universal_client::ObjectPath;
use iobench_universal_client::StorageBackend;
use libiobench::op::OpError;
use libiobench::op::OpResult;
use libiobench::pattern::Pattern;
use libiobench::report::PatternReport;
use libiobench::BenchCfg;
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use strum::IntoEnumIterator;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
  FS,
  Memory,
}

fn default_container() -> String {
  "iobench".to_string()
}

fn default_source_object() -> String {
  "source.bin".to_string()
}

fn default_target_object() -> String {
  "out.bin".to_string()
}

fn default_source_size() -> ByteSize {
  ByteSize::mib(64)
}

fn default_bytes_per_rank() -> ByteSize {
  ByteSize::mib(16)
}

fn default_verify() -> bool {
  true
}

fn default_patterns() -> Vec<Pattern> {
  Pattern::iter().collect()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
  pub target: TargetType,

  /// Only applicable for the "fs" target. Containers are directories under this path.
  pub prefix: Option<PathBuf>,

  /// Only applicable for the "fs" target. Call fsync after every write.
  #[serde(default)]
  pub sync: bool,

  #[serde(default = "default_container")]
  pub container: String,

  #[serde(default = "default_source_object")]
  pub source_object: String,

  #[serde(default = "default_target_object")]
  pub target_object: String,

  /// Size of the object read by every read pattern. Defaults to 64 MiB.
  #[serde(default = "default_source_size")]
  pub source_size: ByteSize,

  /// Bytes written by each worker in every write pattern. Defaults to 16 MiB.
  #[serde(default = "default_bytes_per_rank")]
  pub bytes_per_rank: ByteSize,

  /// Largest single fragment or range write. Defaults to the backend's limit.
  pub fragment_limit: Option<ByteSize>,

  /// Largest single ranged read, and largest whole-object write. Defaults to the backend's limit.
  pub section_limit: Option<ByteSize>,

  /// Decimal digits kept in reported timings. Defaults to the backend's precision.
  pub precision: Option<u32>,

  /// Trials per pattern. Can be overridden via CLI.
  pub repeat: Option<u64>,

  /// Number of workers. Can be overridden via CLI.
  pub world_size: Option<usize>,

  #[serde(default = "default_verify")]
  pub verify: bool,

  /// Patterns to run, in order. Defaults to all of them.
  #[serde(default = "default_patterns")]
  pub patterns: Vec<Pattern>,
}

impl Config {
  pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(raw)
  }

  pub fn build_backend(&self) -> OpResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match (self.target, &self.prefix) {
      (TargetType::FS, Some(prefix)) => Arc::new(FileSystemStore::new(
        prefix.clone(),
        FileSystemStore::default_limits(),
        self.sync,
      )),
      (TargetType::FS, None) => {
        return Err(OpError::Configuration("the fs target requires a prefix".into()))
      }
      (TargetType::Memory, _) => Arc::new(MemoryStore::default()),
    };
    Ok(backend)
  }

  /// Resolves the configuration against the chosen backend and validates it for a team of `world_size` workers.
  pub fn to_bench_cfg(&self, limits: BackendLimits, repeat: u64, world_size: usize) -> OpResult<BenchCfg> {
    let cfg = BenchCfg {
      source: ObjectPath::new(&self.container, &self.source_object),
      source_size: self.source_size.as_u64(),
      target: ObjectPath::new(&self.container, &self.target_object),
      bytes_per_rank: self.bytes_per_rank.as_u64(),
      fragment_limit: self.fragment_limit.map(|s| s.as_u64()).unwrap_or(limits.fragment_limit),
      section_limit: self.section_limit.map(|s| s.as_u64()).unwrap_or(limits.section_limit),
      repeat,
      precision: self.precision.unwrap_or(limits.precision),
      verify: self.verify,
    };
    if self.patterns.is_empty() {
      return Err(OpError::Configuration("no patterns to run".into()));
    };
    cfg.validate(world_size)?;
    Ok(cfg)
  }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PatternResult {
  pub pattern: Pattern,
  pub started: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub report: Option<PatternReport>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl PatternResult {
  pub fn new(pattern: Pattern, started: DateTime<Utc>, res: OpResult<PatternReport>) -> Self {
    let (report, error) = match res {
      Ok(report) => (Some(report), None),
      Err(err) => (None, Some(err.to_string())),
    };
    Self {
      pattern,
      started,
      report,
      error,
    }
  }
}

#[derive(Serialize, Deserialize)]
pub struct BenchmarkResults {
  pub started: DateTime<Utc>,
  pub cfg: Config,
  pub backend: String,
  pub world_size: usize,
  pub repeat: u64,
  pub patterns: Vec<PatternResult>,
  pub store_metrics: HashMap<String, u64>,
}

pub fn format_report(report: &PatternReport) -> String {
  let l = report.latency;
  let mut lines = vec![
    format!("===== {} =====", report.pattern.title()),
    format!("workers: {}, trials: {}", report.world_size, report.trials),
    format!("bytes per trial: {}", ByteSize::b(report.total_bytes)),
    format!("latency (s): max {} min {} avg {}", l.max, l.min, l.avg),
    format!("wall (s): {}", report.wall_secs),
  ];
  if let Some(bw) = report.bandwidth_mib_per_sec() {
    lines.push(format!("bandwidth (MiB/s): {bw:.2}"));
  };
  if let Some(secs) = report.create_secs {
    lines.push(format!("create (s): {secs}"));
  };
  if let Some(secs) = report.postprocessing_secs {
    lines.push(format!("postprocessing (s): {secs}"));
  };
  lines.push(String::new());
  lines.join("\n")
}

pub fn format_failure(pattern: Pattern, err: &OpError) -> String {
  let banner = "!".repeat(72);
  format!("{banner}\n{banner}\n!!! {} failed: {err}\n{banner}\n{banner}\n", pattern.title())
}
