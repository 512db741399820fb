//! Per-frame scene scoring through ffmpeg's scene-detection filter.

use std::fs;

use anyhow::Context;

use crate::catalog::Scope;
use crate::config::Config;
use crate::context::RunContext;
use crate::{ffmpeg, parse};

/// One line pair of the analyzer report: the frame identity plus the
/// likelihood that it starts a new scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneScore {
  pub frame: usize,
  pub pts: i64,
  pub pts_time: f64,
  pub score: f64,
}

/// Runs the analysis pass and parses its report into one score per frame.
pub fn scene_scores(
  config: &Config,
  user_cmd: &str,
  run: &RunContext,
) -> anyhow::Result<Vec<SceneScore>> {
  info!("fetching scene scores");

  let scores_path = run.dir.join("scenescores.txt");
  let base = format!(
    "ffmpeg -y -i PLACEHOLDER -vf \"select='gte(scene,0)',metadata=print:file='{}'\" -f null -",
    scores_path.display()
  );

  let cmds = parse::overlay(Scope::Pre, &base, user_cmd)?;
  ffmpeg::run_local(&format!("{} {}", config.ffmpeg_bin, cmds[0].get_command(true)))?;

  let report = fs::read_to_string(&scores_path)
    .with_context(|| format!("failed to read scene score report {:?}", scores_path))?;

  parse_report(&report)
}

/// The report alternates a frame-info line (`frame:N pts:N pts_time:D`) with
/// a `lavfi.scene_score=F` line. Converters are keyed by field name; unknown
/// keys are ignored.
pub fn parse_report(report: &str) -> anyhow::Result<Vec<SceneScore>> {
  let mut scores = Vec::new();
  let mut lines = report.lines();

  while let Some(info) = lines.next() {
    let info = info.trim();
    if info.is_empty() {
      break;
    }

    let mut frame = None;
    let mut pts = None;
    let mut pts_time = None;

    for keyval in info.split_whitespace() {
      let (key, val) = keyval
        .split_once(':')
        .with_context(|| format!("malformed frame info token {:?}", keyval))?;
      match key {
        "frame" => frame = Some(val.parse::<usize>()?),
        "pts" => pts = Some(val.parse::<i64>()?),
        "pts_time" => pts_time = Some(val.parse::<f64>()?),
        _ => {}
      }
    }

    let score_line = lines
      .next()
      .context("scene score report ended in the middle of a frame entry")?;
    let score = score_line
      .trim()
      .split_once('=')
      .with_context(|| format!("malformed score line {:?}", score_line))?
      .1
      .parse::<f64>()?;

    scores.push(SceneScore {
      frame: frame.context("frame info line without a frame number")?,
      pts: pts.unwrap_or(0),
      pts_time: pts_time.unwrap_or(0.0),
      score,
    });
  }

  Ok(scores)
}
