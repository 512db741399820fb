//! Command-line intake: the argv mirrors ffmpeg's CLI, with `-df_` tokens
//! peeled off as config overrides.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use directories_next::ProjectDirs;
use flexi_logger::{LogSpecBuilder, Logger};
use log::{info, trace, LevelFilter};

use ffdist_core::{Config, DistContext};

/// Distributed FFmpeg encoding over SSH workers.
///
/// Invoke with an ffmpeg-style command line; ffdist decides which arguments
/// apply to local analysis, to the remote slice encodes and to the final
/// merge. `-df_<field>=<value>` arguments override config fields instead of
/// being forwarded.
#[derive(Parser, Debug)]
#[command(name = "ffdist", version)]
pub struct CliArgs {
  /// The encode command, exactly as it would be passed to ffmpeg.
  #[arg(
    value_name = "FFMPEG_ARGS",
    required = true,
    allow_hyphen_values = true,
    trailing_var_arg = true
  )]
  pub args: Vec<String>,
}

pub fn run() -> anyhow::Result<()> {
  let cli = CliArgs::parse();

  let config_path = config_file_path()?;
  let raw = fs::read_to_string(&config_path).with_context(|| {
    format!(
      "please create a config file and place it in: {}",
      config_path.display()
    )
  })?;
  let mut config: Config = serde_json::from_str(&raw)
    .with_context(|| format!("failed to parse config file {}", config_path.display()))?;

  let user_cmd = apply_overrides(&mut config, &cli.args)?;

  let _logger = init_logger(config.loglevel)?;
  info!("parsed config file from: {}", config_path.display());
  trace!("parsed input command line: {}", user_cmd);

  let mut context = DistContext::new(config, user_cmd)?;
  context.run()
}

fn config_file_path() -> anyhow::Result<PathBuf> {
  let dirs = ProjectDirs::from("", "", "ffdist")
    .context("could not determine a config directory on this platform")?;
  Ok(dirs.config_dir().join("config.json"))
}

/// Consumes `-df_<field>=<value>` tokens as config overrides and re-quotes
/// the rest behind the `ffmpeg` keyword as the user command.
fn apply_overrides(config: &mut Config, args: &[String]) -> anyhow::Result<String> {
  let mut quoted = Vec::with_capacity(args.len() + 1);
  quoted.push("ffmpeg".to_owned());

  for arg in args {
    if let Some(rest) = arg.strip_prefix("-df_") {
      if let Some((name, value)) = rest.split_once('=') {
        if !value.contains('=') {
          config.override_field(name, value)?;
          continue;
        }
      }
    }
    quoted.push(
      shlex::try_quote(arg)
        .with_context(|| format!("cannot quote argument {:?}", arg))?
        .into_owned(),
    );
  }

  Ok(quoted.join(" "))
}

fn init_logger(level: LevelFilter) -> anyhow::Result<flexi_logger::LoggerHandle> {
  let spec = LogSpecBuilder::new()
    .default(LevelFilter::Error)
    .module("ffdist", level)
    .module("ffdist_core", level)
    .module("ffdist_cli", level)
    .build();

  Ok(Logger::with(spec).start()?)
}
