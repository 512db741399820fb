//! The common error type for planning, dispatch and the workers.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

use crate::catalog::Scope;
use crate::util::StringOrBytes;

#[derive(Error, Debug)]
pub enum Error {
  /// A numeric bound in the config is violated or the worker list is empty.
  #[error("invalid config: {0}")]
  InvalidConfig(String),
  /// A `-df_` override names an unknown field or one that is not
  /// string- or integer-valued.
  #[error("cannot override config field: {0}")]
  InvalidOverride(String),
  /// The connect phase left zero workers online.
  #[error("no workers found online")]
  NoWorkersOnline,
  /// A Windows worker failed the PowerShell probe. The worker is disabled;
  /// its job goes back to the queue.
  #[error("windows worker {0} does not have powershell installed")]
  WindowsMissingShell(String),
  /// A param was routed to a command whose scope rejects it. Planning bug.
  #[error("argument -{spec} is not valid in {scope:?} scope")]
  InvalidScope { spec: String, scope: Scope },
  /// The user supplied a flag the planner must never forward.
  #[error("argument -{0} is not allowed")]
  ForbiddenArg(String),
  /// The command line could not be tokenized, or a flag is missing its value.
  #[error("malformed command line: {0}")]
  CommandSyntax(String),
  /// I/O was attempted on a worker without an open session.
  #[error("worker {0} is not connected")]
  WorkerOffline(String),
  /// A remote command exited non-zero. Retryable as part of a job.
  #[error("remote command on {host} exited with code {exit_code}\nstdout:\n{stdout:#?}\nstderr:\n{stderr:#?}")]
  RemoteCommandFailed {
    host: String,
    exit_code: i32,
    stdout: StringOrBytes,
    stderr: StringOrBytes,
  },
  /// A PRE or FINAL transcoder invocation exited non-zero. Fatal.
  #[error("local command exited with {status}\nstdout:\n{stdout:#?}\nstderr:\n{stderr:#?}")]
  LocalCommandFailed {
    status: ExitStatus,
    stdout: StringOrBytes,
    stderr: StringOrBytes,
  },
  /// A step of remote job execution failed. The job goes back to the queue
  /// and is retried on any idle worker.
  #[error("job {index} failed: {source}")]
  JobFailed {
    index: usize,
    #[source]
    source: Box<Error>,
  },
  /// A job failed more times than `job_max_retries` allows. Fatal.
  #[error("slice {index} exceeded the retry limit ({retries} failed attempts)")]
  RetriesExhausted { index: usize, retries: i32 },
  #[error("IO error: {0}")]
  Io(#[from] io::Error),
  #[error("SSH error: {0}")]
  Ssh(#[from] ssh2::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}
