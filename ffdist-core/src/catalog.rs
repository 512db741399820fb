//! Static classification of ffmpeg command-line arguments.
//!
//! Every flag the planner cares about is assigned a [`Scope`] (the pipeline
//! stage it applies to) and a [`Policy`] (how repeats merge). Anything not
//! listed is UNKNOWN and routed by the parser's scope rules.

/// The encoding stage at which an argument applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  /// Local analysis and segmentation, before any dispatch.
  Pre,
  /// The slice encode running on a worker.
  Remote,
  /// Local concatenation and audio mux.
  Final,
  /// Dropped from every stage.
  Discard,
  /// Not in the catalog.
  Unknown,
}

/// How a repeated occurrence of the same flag merges into a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
  /// Values joined with a comma into one flag (filter chains).
  Concat,
  /// Duplicates allowed, kept in order.
  Multiple,
  /// Never accepted from the user.
  Forbid,
  /// Later value overwrites the earlier one.
  Replace,
}

const PRE_ARGS: &[&str] = &["threads", "ss", "t", "frames:v", "vframes", "i"];
const REMOTE_ARGS: &[&str] = &[
  "c:v", "vcodec", "crf", "qp", "b:v", "vn", "pass", "filter:v", "vf", "f",
];
const FINAL_ARGS: &[&str] = &["c:a", "acodec", "b:a", "an", "movflags", "i"];
const DISCARD_ARGS: &[&str] = &["y", "n", "v", "loglevel", "report", "g"];

// All unlisted flags default to Policy::Replace.
const CONCAT_ARGS: &[&str] = &["filter:v", "vf"];
const MULTIPLE_ARGS: &[&str] = &["i", "f", "map"];
const FORBID_ARGS: &[&str] = &["g"];

/// Flags whose values are rendered inside double quotes.
const QUOTED_ARGS: &[&str] = &["filter:v", "vf", "i"];

/// Flags that take no value.
const SINGLE_ARGS: &[&str] = &["y", "n", "v", "report", "vn", "an"];

/// Membership test. A positional (`spec == None`) belongs to FINAL scope
/// only: the user's output file lands in the mux command.
pub fn in_scope(spec: Option<&str>, scope: Scope) -> bool {
  match scope {
    Scope::Pre => spec.map_or(false, |s| PRE_ARGS.contains(&s)),
    Scope::Remote => spec.map_or(false, |s| REMOTE_ARGS.contains(&s)),
    Scope::Final => spec.map_or(true, |s| FINAL_ARGS.contains(&s)),
    Scope::Discard => spec.map_or(false, |s| DISCARD_ARGS.contains(&s)),
    Scope::Unknown => is_unknown(spec),
  }
}

/// True when the spec appears in no scope table at all.
pub fn is_unknown(spec: Option<&str>) -> bool {
  match spec {
    None => false,
    Some(s) => {
      !PRE_ARGS.contains(&s)
        && !REMOTE_ARGS.contains(&s)
        && !FINAL_ARGS.contains(&s)
        && !DISCARD_ARGS.contains(&s)
    }
  }
}

pub fn policy_of(spec: Option<&str>) -> Policy {
  match spec {
    None => Policy::Multiple,
    Some(s) if CONCAT_ARGS.contains(&s) => Policy::Concat,
    Some(s) if MULTIPLE_ARGS.contains(&s) => Policy::Multiple,
    Some(s) if FORBID_ARGS.contains(&s) => Policy::Forbid,
    Some(_) => Policy::Replace,
  }
}

pub fn quoted(spec: &str) -> bool {
  QUOTED_ARGS.contains(&spec)
}

pub fn takes_value(spec: &str) -> bool {
  !SINGLE_ARGS.contains(&spec)
}
