//! Tokenizes raw ffmpeg command lines and routes each argument to the
//! commands of one pipeline stage.

#[cfg(test)]
mod tests;

use crate::catalog::{self, Policy, Scope};
use crate::command::{FfmpegCommand, Param, ParamValue};
use crate::error::Error;

/// The literal transcoder-binary keyword: inside a user command it separates
/// the passes of a multi-pass pipeline.
pub const PIPELINE_SEPARATOR: &str = "ffmpeg";

/// Builds the commands of one scope out of a base (template) line and the
/// user's command line layered on top.
pub fn overlay(scope: Scope, base: &str, user_cmd: &str) -> Result<Vec<FfmpegCommand>, Error> {
  let mut parser = Parser::new(scope);
  parser.parse_command(base, true)?;
  parser.parse_command(user_cmd, false)?;
  Ok(parser.cmds)
}

pub struct Parser {
  scope: Scope,
  pub cmds: Vec<FfmpegCommand>,
  /// Snapshot seeding every command started at a pipeline separator.
  template: FfmpegCommand,
}

impl Parser {
  pub fn new(scope: Scope) -> Self {
    let cmd = FfmpegCommand::new(PIPELINE_SEPARATOR, scope);
    Parser {
      scope,
      template: cmd.clone(),
      cmds: vec![cmd],
    }
  }

  /// Tokenizes `line` as a POSIX shell would and feeds every argument into
  /// the current command. With `as_template` the scope rules are skipped and
  /// the resulting last command becomes the seed for subsequent parses.
  pub fn parse_command(&mut self, line: &str, as_template: bool) -> Result<(), Error> {
    let tokens =
      shlex::split(line).ok_or_else(|| Error::CommandSyntax(line.to_owned()))?;

    // Token 0 is the binary name.
    let mut i = 1;
    while i < tokens.len() {
      let token = &tokens[i];

      if token == PIPELINE_SEPARATOR {
        // Start the next pass from the template.
        self.cmds.push(self.template.clone());
        i += 1;
        continue;
      }

      let param = if token.starts_with('-') && token.len() > 1 {
        let spec = &token[1..];
        let value = if catalog::takes_value(spec) {
          i += 1;
          let v = tokens.get(i).ok_or_else(|| {
            Error::CommandSyntax(format!("flag -{} is missing its value", spec))
          })?;
          Some(ParamValue::from_token(v))
        } else {
          None
        };
        Param::flag(spec, value)
      } else {
        Param::positional(token)
      };

      self.place(param, as_template)?;
      i += 1;
    }

    if as_template {
      self.template = self.cmds[self.cmds.len() - 1].clone();
    }

    Ok(())
  }

  fn place(&mut self, p: Param, as_template: bool) -> Result<(), Error> {
    let cur = self.cmds.last_mut().expect("parser holds at least one command");

    if as_template {
      return cur.add_param(p, true);
    }

    // Forbidden flags fail the whole parse, before anything external runs.
    if catalog::policy_of(p.spec.as_deref()) == Policy::Forbid {
      return Err(Error::ForbiddenArg(p.spec.unwrap_or_default()));
    }

    let spec = p.spec.as_deref();

    if p.is_positional() {
      // The user's output file belongs to the mux stage; the bare `-` null
      // sink is also meaningful to a remote analysis pass (`-f null -`).
      if self.scope == Scope::Final
        || (self.scope == Scope::Remote && p.value.as_ref().map_or(false, |v| v.as_str() == "-"))
      {
        return cur.add_param(p, false);
      }
      return Ok(());
    }

    if catalog::in_scope(spec, self.scope) {
      cur.add_param(p, false)
    } else if catalog::in_scope(spec, Scope::Discard) {
      Ok(())
    } else if catalog::is_unknown(spec) && self.scope == Scope::Remote {
      // Unclassified flags are assumed to be encoder knobs.
      cur.add_param(p, false)
    } else if cur.pending_placeholder(spec) {
      // A template asked for this value explicitly, scope notwithstanding.
      cur.add_param(p, false)
    } else {
      Ok(())
    }
  }
}
