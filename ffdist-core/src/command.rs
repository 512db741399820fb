//! A structured ffmpeg invocation: ordered params, a scope, one output slot.


use crate::catalog::{self, Policy, Scope};
use crate::error::Error;

/// The token a template writes where a later parse pass must fill in a value.
pub const PLACEHOLDER: &str = "PLACEHOLDER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
  /// Awaiting substitution by a later parse pass.
  Placeholder,
  Literal(String),
}

impl ParamValue {
  pub fn from_token(token: &str) -> Self {
    if token == PLACEHOLDER {
      Self::Placeholder
    } else {
      Self::Literal(token.to_owned())
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Placeholder => PLACEHOLDER,
      Self::Literal(s) => s,
    }
  }
}

/// One argument of a command. `spec == None` marks a positional (the binary
/// or the output path), `value == None` a flag that carries no argument;
/// never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
  pub spec: Option<String>,
  pub value: Option<ParamValue>,
  /// Admitted through a template parse; exempt from scope validation.
  pub templated: bool,
}

impl Param {
  pub fn flag(spec: &str, value: Option<ParamValue>) -> Self {
    Param {
      spec: Some(spec.to_owned()),
      value,
      templated: false,
    }
  }

  pub fn positional(token: &str) -> Self {
    Param {
      spec: None,
      value: Some(ParamValue::from_token(token)),
      templated: false,
    }
  }

  pub fn is_positional(&self) -> bool {
    self.spec.is_none()
  }
}

#[derive(Debug, Clone)]
pub struct FfmpegCommand {
  params: Vec<Param>,
  scope: Scope,
}

impl FfmpegCommand {
  pub fn new(ffmpeg_bin: &str, scope: Scope) -> Self {
    FfmpegCommand {
      params: vec![Param::positional(ffmpeg_bin)],
      scope,
    }
  }

  pub fn params(&self) -> &[Param] {
    &self.params
  }

  /// The output slot: the unique positional past position 0, kept last.
  pub fn output(&self) -> Option<&Param> {
    self.output_index().map(|i| &self.params[i])
  }

  fn output_index(&self) -> Option<usize> {
    self
      .params
      .iter()
      .enumerate()
      .skip(1)
      .find(|(_, p)| p.is_positional())
      .map(|(i, _)| i)
  }

  /// True when the command still carries an unsubstituted placeholder for
  /// this spec.
  pub fn pending_placeholder(&self, spec: Option<&str>) -> bool {
    self
      .params
      .iter()
      .any(|p| p.spec.as_deref() == spec && matches!(p.value, Some(ParamValue::Placeholder)))
  }

  fn admits(&self, p: &Param) -> bool {
    p.is_positional()
      || catalog::in_scope(p.spec.as_deref(), self.scope)
      || catalog::is_unknown(p.spec.as_deref())
      || self.pending_placeholder(p.spec.as_deref())
  }

  /// Inserts or merges `p`. Placeholder substitution wins over the merge
  /// policy; the output slot is unique and stays last.
  pub fn add_param(&mut self, mut p: Param, skip_scope: bool) -> Result<(), Error> {
    if skip_scope {
      p.templated = true;
    } else if !self.admits(&p) {
      return Err(Error::InvalidScope {
        spec: p.spec.unwrap_or_default(),
        scope: self.scope,
      });
    }

    match self.params.iter().position(|q| q.spec == p.spec) {
      None => self.params.push(p),
      Some(first) => {
        // The earliest placeholder with this spec absorbs the value.
        if let Some(ph) = self.params.iter().position(|q| {
          q.spec == p.spec && matches!(q.value, Some(ParamValue::Placeholder))
        }) {
          self.params[ph].value = p.value;
          return Ok(());
        }

        match catalog::policy_of(p.spec.as_deref()) {
          Policy::Concat => match (&mut self.params[first].value, p.value) {
            (Some(ParamValue::Literal(existing)), Some(new)) => {
              existing.push(',');
              existing.push_str(new.as_str());
            }
            (slot, new) => *slot = new,
          },
          Policy::Multiple => {
            if p.is_positional() {
              // There can only be one output.
              if let Some(out) = self.output_index() {
                self.params.remove(out);
              }
            }
            self.params.push(p);
          }
          Policy::Forbid => {
            return Err(Error::ForbiddenArg(p.spec.unwrap_or_default()));
          }
          Policy::Replace => self.params[first].value = p.value,
        }
      }
    }

    // Keep the output at the end.
    if let Some(out) = self.output_index() {
      if out != self.params.len() - 1 {
        let p = self.params.remove(out);
        self.params.push(p);
      }
    }

    Ok(())
  }

  /// Renders the command as a shell fragment. Positionals are always quoted,
  /// flag values only when the catalog says so.
  pub fn get_command(&self, skip_binary: bool) -> String {
    let mut parts = Vec::with_capacity(self.params.len());

    for p in self.params.iter().skip(usize::from(skip_binary)) {
      match (&p.spec, &p.value) {
        (None, Some(v)) => parts.push(format!("\"{}\"", v.as_str())),
        (Some(s), None) => parts.push(format!("-{}", s)),
        (Some(s), Some(v)) if catalog::quoted(s) => {
          parts.push(format!("-{} \"{}\"", s, v.as_str()));
        }
        (Some(s), Some(v)) => parts.push(format!("-{} {}", s, v.as_str())),
        (None, None) => {}
      }
    }

    parts.join(" ")
  }

  /// The minimum well-formed command is `ffmpeg -i input.mp4 output.mp4`:
  /// at least three params, the binary and the output as the only
  /// positionals, the output last, every flag admissible in this scope.
  pub fn validate(&self) -> bool {
    if self.params.len() < 3 {
      return false;
    }

    if self.params.last().map_or(true, |p| !p.is_positional()) {
      return false;
    }

    if self.params.iter().filter(|p| p.is_positional()).count() != 2 {
      return false;
    }

    self.params.iter().all(|p| {
      p.is_positional()
        || p.templated
        || catalog::in_scope(p.spec.as_deref(), self.scope)
        || catalog::is_unknown(p.spec.as_deref())
    })
  }
}
