//! Grouping segments into slices along scene-change boundaries and planning
//! one remote job per slice.


use std::path::PathBuf;

use anyhow::{bail, Context};

use crate::catalog::Scope;
use crate::command::FfmpegCommand;
use crate::config::Config;
use crate::context::RunContext;
use crate::parse;
use crate::scene_detect::SceneScore;
use crate::split::Segment;

/// One slice encode, dispatched as a unit to a remote worker.
#[derive(Debug, Clone)]
pub struct Job {
  pub index: usize,
  /// Every pass of the remote pipeline, in execution order.
  pub commands: Vec<FfmpegCommand>,
  pub segments_dir: PathBuf,
  /// The minimal segment window the worker needs to decode the slice.
  pub required_segments: Vec<Segment>,
  pub output_path: PathBuf,
  pub taken: bool,
  pub completed: bool,
  /// Failed attempts so far; -1 until the first attempt starts.
  pub retries: i32,
}

impl Job {
  /// Numeric slice name, `000001` style.
  pub fn name(&self) -> String {
    format!("{:06}", self.index)
  }
}

/// Walks the scene scores, cutting a slice at the highest-scoring frame
/// inside each `[keyint_min, keyint_max)` window. The final window past the
/// end of the scores becomes the tail slice.
pub fn plan_slices(
  scores: &[SceneScore],
  segments: &[Segment],
  config: &Config,
  user_cmd: &str,
  run: &RunContext,
) -> anyhow::Result<Vec<Job>> {
  if scores.is_empty() {
    bail!("cannot plan slices without scene scores");
  }

  let mut jobs = Vec::new();
  let mut cur = 0usize;
  let mut slice_idx = 0usize;

  loop {
    let lo = (cur + config.keyint_min).min(scores.len());
    let hi = (cur + config.keyint_max).min(scores.len());
    let window = &scores[lo..hi];

    // The select filter treats its range inclusively, so each slice's last
    // frame is elided to avoid repeating it at the start of the next slice.
    // Only the tail keeps its final frame.
    let (split, range_correction) = match window_max(window) {
      Some(split) => (split, 1),
      None => (&scores[scores.len() - 1], 0),
    };

    let first = &scores[cur];
    let last = split;

    // The worker's decoder has to initialize from the first shipped segment,
    // so walk back until one carries a keyframe.
    let mut seg_idx = segment_at(segments, first.frame)
      .with_context(|| format!("frame {} is outside the segment table", first.frame))?
      .idx;
    while segments[seg_idx].first_keyframe.is_none() && seg_idx > 0 {
      seg_idx -= 1;
    }

    let end_idx = segment_at(segments, last.frame)
      .with_context(|| format!("frame {} is outside the segment table", last.frame))?
      .idx;
    let required =
      &segments[seg_idx..(end_idx + config.segment_lookahead).min(segments.len())];

    let base = (required[0].frame_range.start + required[0].first_keyframe.unwrap_or(0)) as i64;
    let rel_start = first.frame as i64 - base;
    let rel_end = last.frame as i64 - base - range_correction;

    let base_cmd = format!(
      "ffmpeg -y -f concat -safe 0 -i segments.txt \
       -vf \"select=between(n\\,{}\\,{}),setpts=N/FRAME_RATE/TB\" \
       -fps_mode passthrough -frame_pts true -an -g 10000 out.mkv",
      rel_start, rel_end
    );

    let commands = parse::overlay(Scope::Remote, &base_cmd, user_cmd)?;

    jobs.push(Job {
      index: slice_idx,
      commands,
      segments_dir: run.segments_dir.clone(),
      required_segments: required.to_vec(),
      output_path: run.slices_dir.join(format!("{:06}.mkv", slice_idx)),
      taken: false,
      completed: false,
      retries: -1,
    });

    if window.is_empty() {
      break;
    }
    cur = split.frame;
    slice_idx += 1;
  }

  Ok(jobs)
}

/// First of the maxima, so equal scores split as early as possible.
fn window_max(window: &[SceneScore]) -> Option<&SceneScore> {
  let mut best: Option<&SceneScore> = None;
  for score in window {
    if best.map_or(true, |b| score.score > b.score) {
      best = Some(score);
    }
  }
  best
}

fn segment_at(segments: &[Segment], frame: usize) -> Option<&Segment> {
  segments.iter().find(|s| s.contains(frame))
}
