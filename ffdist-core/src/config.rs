//! The typed run configuration and its command-line override table.

use log::LevelFilter;
use serde::{Deserialize, Deserializer};

use crate::error::Error;
use crate::worker::Worker;

#[derive(Deserialize)]
pub struct Config {
  pub ffmpeg_bin: String,
  pub ffprobe_bin: String,
  pub server_work_path: String,
  pub segment_frames: usize,
  pub keyint_min: usize,
  pub keyint_max: usize,
  pub job_max_retries: i32,
  /// Extra segments shipped past a slice's end segment, compensating for
  /// B-frame reordering.
  #[serde(default = "default_segment_lookahead")]
  pub segment_lookahead: usize,
  #[serde(deserialize_with = "level_from_name")]
  pub loglevel: LevelFilter,
  pub workers: Vec<Worker>,
}

fn default_segment_lookahead() -> usize {
  2
}

fn level_from_name<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
  D: Deserializer<'de>,
{
  let name = String::deserialize(deserializer)?;
  name
    .parse::<LevelFilter>()
    .map_err(|_| serde::de::Error::custom(format!("unknown log level {:?}", name)))
}

impl Config {
  /// Bounds checking only. Whether the ffmpeg/ffprobe binaries actually
  /// exist is left to their first invocation.
  pub fn validate(&self) -> Result<(), Error> {
    if self.segment_frames == 0 {
      return Err(Error::InvalidConfig("segment_frames must be greater than 0".into()));
    }
    if self.keyint_min == 0 {
      return Err(Error::InvalidConfig("keyint_min must be greater than 0".into()));
    }
    if self.keyint_max < self.keyint_min {
      return Err(Error::InvalidConfig(
        "keyint_max must not be smaller than keyint_min".into(),
      ));
    }
    if self.job_max_retries <= 0 {
      return Err(Error::InvalidConfig("job_max_retries must be greater than 0".into()));
    }
    if self.segment_lookahead == 0 {
      return Err(Error::InvalidConfig("segment_lookahead must be greater than 0".into()));
    }
    if self.workers.is_empty() {
      return Err(Error::InvalidConfig("at least one worker is required".into()));
    }
    Ok(())
  }

  /// Applies a `-df_<field>=<value>` command-line override. Only the string-
  /// and integer-valued fields are eligible.
  pub fn override_field(&mut self, name: &str, value: &str) -> Result<(), Error> {
    match name {
      "ffmpeg_bin" => self.ffmpeg_bin = value.to_owned(),
      "ffprobe_bin" => self.ffprobe_bin = value.to_owned(),
      "server_work_path" => self.server_work_path = value.to_owned(),
      "segment_frames" => self.segment_frames = parse_int(name, value)?,
      "keyint_min" => self.keyint_min = parse_int(name, value)?,
      "keyint_max" => self.keyint_max = parse_int(name, value)?,
      "job_max_retries" => self.job_max_retries = parse_int(name, value)?,
      "segment_lookahead" => self.segment_lookahead = parse_int(name, value)?,
      _ => {
        return Err(Error::InvalidOverride(format!(
          "{} does not exist or is not a string or integer field",
          name
        )));
      }
    }
    Ok(())
  }
}

fn parse_int<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, Error> {
  value
    .parse()
    .map_err(|_| Error::InvalidOverride(format!("{} expects an integer, got {:?}", name, value)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::worker::Platform;

  fn sample() -> Config {
    serde_json::from_str(
      r#"{
        "ffmpeg_bin": "/usr/bin/ffmpeg",
        "ffprobe_bin": "/usr/bin/ffprobe",
        "server_work_path": "/tmp/ffdist",
        "segment_frames": 250,
        "keyint_min": 100,
        "keyint_max": 300,
        "job_max_retries": 5,
        "loglevel": "info",
        "workers": [
          {
            "user": "enc",
            "host": "10.0.0.2",
            "work_path": "/tmp/ffdist-worker",
            "ffmpeg_bin": "ffmpeg",
            "params": { "password": "hunter2" }
          },
          {
            "user": "enc",
            "host": "10.0.0.3",
            "work_path": "C:/enc",
            "ffmpeg_bin": "ffmpeg.exe",
            "params": { "key_path": "/home/enc/.ssh/id_ed25519" },
            "platform": "Windows"
          }
        ]
      }"#,
    )
    .unwrap()
  }

  #[test]
  fn parses_config_with_defaults() {
    let config = sample();
    assert_eq!(config.segment_frames, 250);
    assert_eq!(config.segment_lookahead, 2);
    assert_eq!(config.loglevel, LevelFilter::Info);
    assert_eq!(config.workers.len(), 2);
    assert_eq!(config.workers[0].platform, Platform::Linux);
    assert_eq!(config.workers[1].platform, Platform::Windows);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn rejects_invalid_platform() {
    let res = serde_json::from_str::<Worker>(
      r#"{
        "user": "enc",
        "host": "h",
        "work_path": "/tmp",
        "ffmpeg_bin": "ffmpeg",
        "params": {},
        "platform": "Solaris"
      }"#,
    );
    assert!(res.is_err());
  }

  #[test]
  fn rejects_unknown_log_level() {
    let res = serde_json::from_str::<Config>(
      r#"{"ffmpeg_bin":"f","ffprobe_bin":"p","server_work_path":"/tmp",
          "segment_frames":1,"keyint_min":1,"keyint_max":1,"job_max_retries":1,
          "loglevel":"chatty","workers":[]}"#,
    );
    assert!(res.is_err());
  }

  #[test]
  fn validate_checks_bounds() {
    let mut config = sample();
    config.keyint_max = config.keyint_min - 1;
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

    let mut config = sample();
    config.segment_frames = 0;
    assert!(config.validate().is_err());

    let mut config = sample();
    config.workers.clear();
    assert!(config.validate().is_err());
  }

  #[test]
  fn overrides_typed_fields() {
    let mut config = sample();
    config.override_field("segment_frames", "500").unwrap();
    config.override_field("job_max_retries", "3").unwrap();
    config.override_field("ffmpeg_bin", "/opt/ffmpeg").unwrap();
    assert_eq!(config.segment_frames, 500);
    assert_eq!(config.job_max_retries, 3);
    assert_eq!(config.ffmpeg_bin, "/opt/ffmpeg");
  }

  #[test]
  fn rejects_bad_overrides() {
    let mut config = sample();
    assert!(matches!(
      config.override_field("loglevel", "debug"),
      Err(Error::InvalidOverride(_))
    ));
    assert!(matches!(
      config.override_field("workers", "none"),
      Err(Error::InvalidOverride(_))
    ));
    assert!(matches!(
      config.override_field("segment_frames", "many"),
      Err(Error::InvalidOverride(_))
    ));
  }
}
