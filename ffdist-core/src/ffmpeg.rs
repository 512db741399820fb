//! Local invocation of the transcoder and probe binaries.

use std::process::{Command, Output, Stdio};

use crate::error::Error;

/// Runs a rendered command line through the platform shell, capturing output.
/// Non-zero exit is an error: every local invocation is load-bearing.
pub fn run_local(shell_cmd: &str) -> Result<Output, Error> {
  trace!("running local command: {}", shell_cmd);

  let mut cmd = if cfg!(target_os = "windows") {
    let mut c = Command::new("cmd");
    c.args(["/C", shell_cmd]);
    c
  } else {
    let mut c = Command::new("sh");
    c.args(["-c", shell_cmd]);
    c
  };

  cmd.stdout(Stdio::piped());
  cmd.stderr(Stdio::piped());

  let out = cmd.output()?;

  if !out.status.success() {
    return Err(Error::LocalCommandFailed {
      status: out.status,
      stdout: out.stdout.into(),
      stderr: out.stderr.into(),
    });
  }

  Ok(out)
}
