//! Cutting the input into fixed-frame-count segments and probing each one
//! for its first keyframe.


use std::ops::Range;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::catalog::Scope;
use crate::config::Config;
use crate::context::RunContext;
use crate::error::Error;
use crate::{ffmpeg, parse};

/// A fixed-frame-count piece of the input as cut by the segment muxer; the
/// unit of raw footage shipped to workers.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
  pub idx: usize,
  pub filename: String,
  pub frame_range: Range<usize>,
  /// Index of the first keyframe among the segment's video packets; None
  /// when the segment carries no keyframe at all.
  pub first_keyframe: Option<usize>,
}

impl Segment {
  pub fn contains(&self, frame: usize) -> bool {
    self.frame_range.contains(&frame)
  }
}

/// The segment table for a `total_frames`-long input. Every segment spans
/// `segment_frames` frames except possibly the last.
pub fn build_segments(total_frames: usize, segment_frames: usize) -> Vec<Segment> {
  (0..=total_frames / segment_frames)
    .map(|i| Segment {
      idx: i,
      filename: format!("out{:06}.mkv", i),
      frame_range: i * segment_frames..(i + 1) * segment_frames,
      first_keyframe: None,
    })
    .collect()
}

/// Cuts the input into segment files and records each segment's first
/// keyframe position.
pub fn segment_input(
  config: &Config,
  user_cmd: &str,
  run: &RunContext,
  total_frames: usize,
) -> anyhow::Result<Vec<Segment>> {
  let mut segments = build_segments(total_frames, config.segment_frames);
  info!(
    "cutting {} frames into {} segments of {}",
    total_frames,
    segments.len(),
    config.segment_frames
  );

  let base = segment_command(&segments, config.segment_frames, &run.segments_dir);
  let cmds = parse::overlay(Scope::Pre, &base, user_cmd)?;
  ffmpeg::run_local(&format!("{} {}", config.ffmpeg_bin, cmds[0].get_command(true)))?;

  for seg in &mut segments {
    let path = run.segments_dir.join(&seg.filename);
    seg.first_keyframe = first_keyframe(&config.ffprobe_bin, &path)
      .with_context(|| format!("failed to probe segment {:?}", seg.filename))?;
    debug!("segment {}: first keyframe at {:?}", seg.idx, seg.first_keyframe);
  }

  Ok(segments)
}

/// Boundary frames for the segment muxer. Frame 0 must not appear in the
/// list, it trips up ffmpeg; a short input gets a single boundary past its
/// end, because an empty list would render an empty `-segment_frames` value.
fn boundary_frames(segments: &[Segment], segment_frames: usize) -> Vec<usize> {
  let mut boundaries: Vec<usize> = segments[1..].iter().map(|s| s.frame_range.start).collect();
  if boundaries.is_empty() {
    boundaries.push(segment_frames);
  }
  boundaries
}

/// The template line for the keyframe-preserving segmentation pass.
fn segment_command(segments: &[Segment], segment_frames: usize, segments_dir: &Path) -> String {
  let boundary_arg = boundary_frames(segments, segment_frames)
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<String>>()
    .join(",");

  format!(
    "ffmpeg -y -i PLACEHOLDER -c copy -f segment -segment_frames {} -segment_list \"{}\" \
     -reset_timestamps 1 -break_non_keyframes 1 \"{}/out%06d.mkv\"",
    boundary_arg,
    segments_dir.join("segments.csv").display(),
    segments_dir.display()
  )
}

#[derive(Deserialize)]
struct ProbeOutput {
  #[serde(default)]
  packets: Vec<ProbePacket>,
}

#[derive(Deserialize)]
struct ProbePacket {
  #[serde(default)]
  codec_type: String,
  #[serde(default)]
  flags: String,
}

/// Position of the first keyframe packet among a file's video packets.
fn first_keyframe(ffprobe_bin: &str, file: &Path) -> Result<Option<usize>, Error> {
  let out = ffmpeg::run_local(&format!(
    "\"{}\" -select_streams v -print_format json -show_packets \"{}\"",
    ffprobe_bin,
    file.display()
  ))?;

  let probe: ProbeOutput = serde_json::from_slice(&out.stdout)?;
  Ok(keyframe_index(&probe.packets))
}

fn keyframe_index(packets: &[ProbePacket]) -> Option<usize> {
  packets
    .iter()
    .filter(|p| p.codec_type == "video")
    .position(|p| p.flags.starts_with('K'))
}
