//! Per-run working directories and the top-level run orchestration.

use std::collections::HashMap;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Instant;

use path_abs::{PathAbs, PathInfo};

use crate::broker::Broker;
use crate::config::Config;
use crate::{concat, create_dir, scene_detect, slices, split, util};

/// The on-disk skeleton of one run, randomized under `server_work_path`.
/// Removed wholesale after a successful merge.
pub struct RunContext {
  pub dir: PathBuf,
  pub segments_dir: PathBuf,
  pub slices_dir: PathBuf,
}

impl RunContext {
  pub fn create(server_work_path: &str) -> anyhow::Result<Self> {
    let dir = Path::new(server_work_path).join(util::random_hex());
    std::fs::create_dir_all(&dir)?;
    let dir = PathAbs::new(&dir)?.as_path().to_path_buf();

    let segments_dir = dir.join("segments");
    let slices_dir = dir.join("slices_final");
    create_dir!(&segments_dir)?;
    create_dir!(&slices_dir)?;

    Ok(RunContext {
      dir,
      segments_dir,
      slices_dir,
    })
  }
}

pub struct DistContext {
  pub config: Config,
  pub user_cmd: String,
  pub run: RunContext,
}

impl DistContext {
  pub fn new(config: Config, user_cmd: String) -> anyhow::Result<Self> {
    config.validate()?;
    let run = RunContext::create(&config.server_work_path)?;
    info!("run directory: {}", run.dir.display());

    Ok(DistContext {
      config,
      user_cmd,
      run,
    })
  }

  /// Analysis, segmentation, planning, dispatch, merge.
  pub fn run(&mut self) -> anyhow::Result<()> {
    let pre_start = Instant::now();

    let scores = scene_detect::scene_scores(&self.config, &self.user_cmd, &self.run)?;
    let segments = split::segment_input(&self.config, &self.user_cmd, &self.run, scores.len())?;
    let jobs = slices::plan_slices(&scores, &segments, &self.config, &self.user_cmd, &self.run)?;
    info!("planned {} slices over {} segments", jobs.len(), segments.len());

    let workers = mem::take(&mut self.config.workers);
    let broker = Broker::new(jobs, workers, &self.config);

    let encode_start = Instant::now();
    broker.dispatch()?;

    let shares = broker.host_shares();
    let jobs = broker.into_jobs();
    concat::merge(&self.config, &self.user_cmd, &self.run, &jobs)?;

    info!("total time: {:.2} seconds", pre_start.elapsed().as_secs_f64());
    info!("encoding time: {:.2} seconds", encode_start.elapsed().as_secs_f64());
    info!("host shares: {:?}", sorted_shares(&shares));

    Ok(())
  }
}

fn sorted_shares(shares: &HashMap<String, f64>) -> Vec<(String, f64)> {
  let mut shares: Vec<(String, f64)> = shares
    .iter()
    .map(|(host, share)| (host.clone(), *share))
    .collect();
  shares.sort_by(|a, b| b.1.total_cmp(&a.1));
  shares
}
