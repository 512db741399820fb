//! Concatenating the finished slices and muxing the original audio back in.

use std::ffi::OsStr;
use std::fs;

use crate::catalog::Scope;
use crate::config::Config;
use crate::context::RunContext;
use crate::slices::Job;
use crate::{ffmpeg, parse};

/// Joins the slices in creation order, copies the video stream and takes
/// audio stream 0 from the user's input. The run directory is removed once
/// the output exists.
pub fn merge(
  config: &Config,
  user_cmd: &str,
  run: &RunContext,
  jobs: &[Job],
) -> anyhow::Result<()> {
  info!("merging slices into final video");

  let list_path = run.slices_dir.join("slices.txt");
  fs::write(&list_path, slices_concat_list(jobs))?;

  // Assumes the input video has a single audio track.
  let base = format!(
    "ffmpeg -y -f concat -safe 0 -i \"{}\" -i PLACEHOLDER -c:v copy -map 0:v:0 -map 1:a:0 ",
    list_path.display()
  );

  let cmds = parse::overlay(Scope::Final, &base, user_cmd)?;
  let mux = &cmds[cmds.len() - 1];
  ffmpeg::run_local(&format!("{} {}", config.ffmpeg_bin, mux.get_command(true)))?;

  fs::remove_dir_all(&run.dir)?;

  Ok(())
}

fn slices_concat_list(jobs: &[Job]) -> String {
  let mut list = String::with_capacity(16 * jobs.len());
  for job in jobs {
    if let Some(name) = job.output_path.file_name().and_then(OsStr::to_str) {
      list.push_str(&format!("file '{}'\n", name));
    }
  }
  list
}
