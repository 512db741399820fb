//! A remote encode host: its SSH/SFTP session and the slice-job protocol.


use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::Path;

use parking_lot::Mutex;
use serde::Deserialize;
use ssh2::{Session, Sftp};

use crate::command::FfmpegCommand;
use crate::error::Error;
use crate::slices::Job;
use crate::split::Segment;
use crate::util::{self, StringOrBytes};

const AUTH_PARAMS: &[&str] = &["port", "password", "key_path", "passphrase"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Platform {
  Linux,
  Windows,
}

impl Default for Platform {
  fn default() -> Self {
    Platform::Linux
  }
}

pub struct RemoteOutput {
  pub exit_code: i32,
  pub stdout: StringOrBytes,
  pub stderr: StringOrBytes,
}

#[derive(Deserialize)]
pub struct Worker {
  pub user: String,
  pub host: String,
  pub work_path: String,
  pub ffmpeg_bin: String,
  /// Opaque auth parameters forwarded to the SSH transport.
  #[serde(default)]
  pub params: HashMap<String, String>,
  #[serde(default)]
  pub platform: Platform,

  #[serde(skip)]
  pub free: bool,
  #[serde(skip)]
  pub connected: bool,
  #[serde(skip)]
  pub jobs_completed: usize,
  #[serde(skip)]
  session: Option<Session>,
  #[serde(skip)]
  sftp: Option<Sftp>,
}

impl Worker {
  /// Opens the SSH session and an SFTP channel. A failure leaves the worker
  /// disconnected; the caller decides whether that is fatal.
  pub fn connect(&mut self) -> Result<(), Error> {
    for key in self.params.keys() {
      if !AUTH_PARAMS.contains(&key.as_str()) {
        warn!("worker {}: ignoring unknown auth parameter {:?}", self.host, key);
      }
    }

    let port = match self.params.get("port") {
      Some(p) => p.parse::<u16>().map_err(|_| {
        Error::InvalidConfig(format!("worker {}: invalid port {:?}", self.host, p))
      })?,
      None => 22,
    };

    let tcp = TcpStream::connect((self.host.as_str(), port))?;
    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake()?;

    if let Some(password) = self.params.get("password") {
      session.userauth_password(&self.user, password)?;
    } else if let Some(key_path) = self.params.get("key_path") {
      session.userauth_pubkey_file(
        &self.user,
        None,
        Path::new(key_path),
        self.params.get("passphrase").map(String::as_str),
      )?;
    } else {
      session.userauth_agent(&self.user)?;
    }

    let sftp = session.sftp()?;
    self.session = Some(session);
    self.sftp = Some(sftp);
    self.connected = true;
    self.free = true;

    Ok(())
  }

  pub fn disconnect(&mut self) {
    self.sftp = None;
    self.session = None;
    self.connected = false;
    self.free = false;
  }

  /// Runs one job attempt end to end and records the outcome in the shared
  /// job list. A failed job reverts to the queue; the worker stays eligible
  /// unless its shell is unusable.
  pub fn add_job(&mut self, jobs: &Mutex<Vec<Job>>, idx: usize) {
    let job = {
      let mut jobs = jobs.lock();
      jobs[idx].retries += 1;
      jobs[idx].clone()
    };

    // An unusable shell disables the worker; every other failure is a
    // retryable JobFailed.
    let res = self.run_job(&job).map_err(|e| match e {
      Error::WindowsMissingShell(_) => e,
      other => Error::JobFailed {
        index: job.index,
        source: Box::new(other),
      },
    });

    match res {
      Ok(()) => {
        jobs.lock()[idx].completed = true;
        self.jobs_completed += 1;
        self.free = true;
        info!("worker {}: finished slice {}", self.host, job.name());
      }
      Err(e) => {
        warn!("worker {}: slice {} failed: {}", self.host, job.name(), e);
        if matches!(e, Error::WindowsMissingShell(_)) {
          error!("worker {}: disabled, shell is unusable", self.host);
          self.disconnect();
        } else {
          self.free = true;
        }
        jobs.lock()[idx].taken = false;
      }
    }
  }

  fn run_job(&self, job: &Job) -> Result<(), Error> {
    let job_work_path = format!(
      "{}/{}",
      self.work_path.trim_end_matches('/'),
      util::random_hex()
    );

    let out = self.exec_command(&format!("mkdir -p \"{}\"", job_work_path))?;
    self.check_exit(out)?;

    let sftp = self.sftp()?;
    for seg in &job.required_segments {
      upload(
        sftp,
        &job.segments_dir.join(&seg.filename),
        &format!("{}/{}", job_work_path, seg.filename),
      )?;
    }
    upload(
      sftp,
      &job.segments_dir.join("segments.csv"),
      &format!("{}/segments.csv", job_work_path),
    )?;

    let mut list = sftp.create(Path::new(&format!("{}/segments.txt", job_work_path)))?;
    list.write_all(segments_concat_list(&job.required_segments).as_bytes())?;
    drop(list);

    let shell_cmd = compose_shell_command(&self.ffmpeg_bin, &job_work_path, &job.commands);
    let out = self.exec_command(&shell_cmd)?;
    self.check_exit(out)?;

    download(
      sftp,
      &format!("{}/out.mkv", job_work_path),
      &job.output_path,
    )?;

    // Best-effort cleanup.
    let rm = match self.platform {
      Platform::Linux => "rm -rf",
      Platform::Windows => "rm -r -force",
    };
    if let Err(e) = self.exec_command(&format!("{} \"{}\"", rm, job_work_path)) {
      warn!("worker {}: failed to remove {}: {}", self.host, job_work_path, e);
    }

    Ok(())
  }

  fn exec_command(&self, cmd: &str) -> Result<RemoteOutput, Error> {
    match self.platform {
      Platform::Linux => {
        trace!("worker {}: running remote command: {}", self.host, cmd);
        self.run_channel(cmd, None)
      }
      Platform::Windows => self.exec_command_windows(cmd),
    }
  }

  /// Windows commands go through PowerShell reading from stdin: a command
  /// that starts with a quoted token parses as a string literal unless it is
  /// invoked with `&`.
  fn exec_command_windows(&self, cmd: &str) -> Result<RemoteOutput, Error> {
    let probe = self.run_channel("powershell -command \"$PSVersionTable.PSVersion.Major\"", None)?;
    if probe.exit_code != 0 {
      return Err(Error::WindowsMissingShell(self.host.clone()));
    }

    trace!("worker {}: running remote command: {}", self.host, cmd);
    self.run_channel(
      "powershell -noprofile -noninteractive -",
      Some(&format!("& {}", cmd)),
    )
  }

  fn run_channel(&self, cmd: &str, stdin: Option<&str>) -> Result<RemoteOutput, Error> {
    let session = self
      .session
      .as_ref()
      .ok_or_else(|| Error::WorkerOffline(self.host.clone()))?;

    let mut channel = session.channel_session()?;
    channel.exec(cmd)?;

    if let Some(input) = stdin {
      channel.write_all(input.as_bytes())?;
      channel.send_eof()?;
    }

    let mut stdout = Vec::new();
    channel.read_to_end(&mut stdout)?;
    let mut stderr = Vec::new();
    channel.stderr().read_to_end(&mut stderr)?;
    channel.wait_close()?;

    Ok(RemoteOutput {
      exit_code: channel.exit_status()?,
      stdout: stdout.into(),
      stderr: stderr.into(),
    })
  }

  fn check_exit(&self, out: RemoteOutput) -> Result<(), Error> {
    if out.exit_code != 0 {
      return Err(Error::RemoteCommandFailed {
        host: self.host.clone(),
        exit_code: out.exit_code,
        stdout: out.stdout,
        stderr: out.stderr,
      });
    }
    Ok(())
  }

  fn sftp(&self) -> Result<&Sftp, Error> {
    self
      .sftp
      .as_ref()
      .ok_or_else(|| Error::WorkerOffline(self.host.clone()))
  }
}

/// The concat demuxer list shipped next to the segments.
pub(crate) fn segments_concat_list(segments: &[Segment]) -> String {
  let mut list = String::with_capacity(24 * segments.len());
  for seg in segments {
    list.push_str(&format!("file '{}'\n", seg.filename));
  }
  list
}

/// `cd` into the job directory, then every pass in order.
pub(crate) fn compose_shell_command(
  ffmpeg_bin: &str,
  job_work_path: &str,
  cmds: &[FfmpegCommand],
) -> String {
  let passes = cmds
    .iter()
    .map(|cmd| format!("{} {}", ffmpeg_bin, cmd.get_command(true)))
    .collect::<Vec<String>>()
    .join("; ");

  format!("cd \"{}\"; {}", job_work_path, passes)
}

fn upload(sftp: &Sftp, local: &Path, remote: &str) -> Result<(), Error> {
  let mut src = fs::File::open(local)?;
  let mut dst = sftp.create(Path::new(remote))?;
  io::copy(&mut src, &mut dst)?;
  Ok(())
}

fn download(sftp: &Sftp, remote: &str, local: &Path) -> Result<(), Error> {
  let mut src = sftp.open(Path::new(remote))?;
  let mut dst = fs::File::create(local)?;
  io::copy(&mut src, &mut dst)?;
  Ok(())
}
