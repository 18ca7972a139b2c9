use chrono::Utc;
use clap::Parser;
use iobench::format_failure;
use iobench::format_report;
use iobench::BenchmarkResults;
use iobench::Config;
use iobench::PatternResult;
use libiobench::ctx::Ctx;
use libiobench::pattern::run_pattern;
use libiobench::runtime::LocalTeam;
use libiobench::runtime::ParallelRuntime;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
  /// Path to the YAML configuration file.
  config: PathBuf,

  /// Number of workers (overrides config). Defaults to 4.
  #[arg(long)]
  world_size: Option<usize>,

  /// Trials per pattern (overrides config). Defaults to 5.
  #[arg(long)]
  repeat: Option<u64>,

  /// Write the results as JSON to this path.
  #[arg(long)]
  output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt::init();

  let cli = Cli::parse();

  let cfg = Config::from_yaml(&fs::read_to_string(&cli.config).expect("read config file"))
    .expect("parse config file");
  let world_size = cli.world_size.or(cfg.world_size).unwrap_or(4);
  let repeat = cli.repeat.or(cfg.repeat).unwrap_or(5);

  let backend = cfg.build_backend().expect("invalid configuration");
  let bench_cfg = Arc::new(
    cfg
      .to_bench_cfg(backend.limits(), repeat, world_size)
      .expect("invalid configuration"),
  );
  let patterns = Arc::new(cfg.patterns.clone());
  info!(
    backend = backend.name(),
    world_size,
    repeat,
    patterns = patterns.len(),
    "starting benchmarks"
  );

  let started = Utc::now();
  let mut per_rank = LocalTeam::run(world_size, |rt| {
    let backend = backend.clone();
    let bench_cfg = bench_cfg.clone();
    let patterns = patterns.clone();
    async move {
      let ctx = Ctx::new(&rt, backend.as_ref(), &bench_cfg);
      let mut results = Vec::new();
      for &pattern in patterns.iter() {
        let pattern_started = Utc::now();
        let res = run_pattern(ctx, pattern).await;
        match (&res, rt.is_leader()) {
          (Ok(report), true) => println!("{}", format_report(report)),
          (Err(err), true) => println!("{}", format_failure(pattern, err)),
          (Err(err), false) => warn!(rank = rt.rank(), %pattern, error = %err, "pattern failed on worker"),
          (Ok(_), false) => {}
        };
        results.push(PatternResult::new(pattern, pattern_started, res));
      }
      results
    }
  })
  .await;
  // Only the leader's view carries leader-only timings.
  let results = per_rank.swap_remove(0);

  let store_metrics = backend.metrics();
  for (key, value) in &store_metrics {
    info!(key, value, "store metric");
  }

  if let Some(output) = cli.output {
    let results = BenchmarkResults {
      started,
      cfg,
      backend: backend.name().to_string(),
      world_size,
      repeat,
      patterns: results,
      store_metrics: store_metrics
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
    };
    let json_output = serde_json::to_string_pretty(&results).expect("failed to serialize results");
    fs::write(&output, json_output).expect("failed to write results file");
    info!(results_file = %output.display(), "results written");
  };
}
