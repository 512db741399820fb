use super::*;
use crate::error::Error;

fn rendered(cmds: &[FfmpegCommand]) -> Vec<String> {
  cmds.iter().map(|c| c.get_command(false)).collect()
}

#[test]
fn two_pass_template_inheritance() {
  let mut parser = Parser::new(Scope::Remote);
  parser
    .parse_command("ffmpeg -i PLACEHOLDER -c:v libaom-av1 -crf 40 out.mkv", true)
    .unwrap();
  parser
    .parse_command(
      "ffmpeg -i in.mp4 -pass 1 -f null - ffmpeg -i in.mp4 -pass 2",
      false,
    )
    .unwrap();

  assert_eq!(parser.cmds.len(), 2);

  let pass1 = parser.cmds[0].get_command(true);
  assert!(pass1.contains("-i \"in.mp4\""), "placeholder substituted: {}", pass1);
  assert!(pass1.contains("-c:v libaom-av1"));
  assert!(pass1.contains("-crf 40"));
  assert!(pass1.contains("-pass 1"));
  assert!(pass1.contains("-f null"));
  assert!(pass1.ends_with("\"-\""));

  let pass2 = parser.cmds[1].get_command(true);
  assert!(pass2.contains("-i \"in.mp4\""));
  assert!(pass2.contains("-c:v libaom-av1"));
  assert!(pass2.contains("-crf 40"));
  assert!(pass2.contains("-pass 2"));
  assert!(!pass2.contains("-pass 1"));
  assert!(pass2.ends_with("\"out.mkv\""));

  for cmd in &parser.cmds {
    assert!(cmd.validate(), "invalid command: {}", cmd.get_command(false));
  }
}

#[test]
fn repeated_filters_concatenate() {
  let cmds = overlay(
    Scope::Remote,
    "ffmpeg -y out.mkv",
    "ffmpeg -vf scale=1920:1080 -vf vidstabdetect",
  )
  .unwrap();

  let filters: Vec<&Param> = cmds[0]
    .params()
    .iter()
    .filter(|p| p.spec.as_deref() == Some("vf"))
    .collect();
  assert_eq!(filters.len(), 1);
  assert_eq!(
    filters[0].value.as_ref().unwrap().as_str(),
    "scale=1920:1080,vidstabdetect"
  );
  assert!(cmds[0]
    .get_command(true)
    .contains("-vf \"scale=1920:1080,vidstabdetect\""));
}

#[test]
fn forbidden_flag_fails_the_parse() {
  let mut parser = Parser::new(Scope::Remote);
  parser.parse_command("ffmpeg -y -g 10000 out.mkv", true).unwrap();

  let res = parser.parse_command("ffmpeg -i in.mp4 -g 250 out.mp4", false);
  assert!(matches!(res, Err(Error::ForbiddenArg(spec)) if spec == "g"));
}

#[test]
fn forbidden_flag_fails_in_every_scope() {
  for scope in [Scope::Pre, Scope::Remote, Scope::Final] {
    let mut parser = Parser::new(scope);
    assert!(parser.parse_command("ffmpeg -g 250 out.mp4", false).is_err());
  }
}

#[test]
fn discard_flags_never_surface() {
  let cmds = overlay(
    Scope::Remote,
    "ffmpeg out.mkv",
    "ffmpeg -y -loglevel warning -report -crf 30",
  )
  .unwrap();

  let cmd = cmds[0].get_command(false);
  assert!(!cmd.contains("-y"));
  assert!(!cmd.contains("-loglevel"));
  assert!(!cmd.contains("warning"));
  assert!(!cmd.contains("-report"));
  assert!(cmd.contains("-crf 30"));
}

#[test]
fn unknown_flags_go_to_remote_only() {
  let cmds = overlay(Scope::Remote, "ffmpeg out.mkv", "ffmpeg -cpu-used 4").unwrap();
  assert!(cmds[0].get_command(false).contains("-cpu-used 4"));

  let cmds = overlay(Scope::Pre, "ffmpeg -i PLACEHOLDER -f null -", "ffmpeg -cpu-used 4").unwrap();
  assert!(!cmds[0].get_command(false).contains("-cpu-used"));
}

#[test]
fn pre_scope_takes_trim_args_and_drops_encode_args() {
  let cmds = overlay(
    Scope::Pre,
    "ffmpeg -y -i PLACEHOLDER -f null -",
    "ffmpeg -i in.mp4 -ss 30 -t 60 -crf 30 out.mp4",
  )
  .unwrap();

  let cmd = cmds[0].get_command(false);
  assert!(cmd.contains("-i \"in.mp4\""));
  assert!(cmd.contains("-ss 30"));
  assert!(cmd.contains("-t 60"));
  assert!(!cmd.contains("-crf"));
  // The user's output must never displace an analysis sink.
  assert!(!cmd.contains("out.mp4"));
  assert!(cmd.ends_with("\"-\""));
}

#[test]
fn valueless_flags_consume_no_token() {
  let cmds = overlay(Scope::Remote, "ffmpeg out.mkv", "ffmpeg -vn -crf 30").unwrap();
  let cmd = cmds[0].get_command(false);
  assert!(cmd.contains("-vn"));
  // -vn did not swallow -crf.
  assert!(cmd.contains("-crf 30"));
}

#[test]
fn flag_missing_value_is_a_syntax_error() {
  let mut parser = Parser::new(Scope::Remote);
  let res = parser.parse_command("ffmpeg -crf", false);
  assert!(matches!(res, Err(Error::CommandSyntax(_))));
}

#[test]
fn unbalanced_quotes_are_a_syntax_error() {
  let mut parser = Parser::new(Scope::Remote);
  let res = parser.parse_command("ffmpeg -vf \"scale=1:1", false);
  assert!(matches!(res, Err(Error::CommandSyntax(_))));
}

#[test]
fn quoted_tokens_survive_tokenization() {
  let cmds = overlay(
    Scope::Remote,
    "ffmpeg out.mkv",
    "ffmpeg -vf \"select=between(n\\,10\\,20)\"",
  )
  .unwrap();
  assert!(cmds[0]
    .get_command(false)
    .contains("-vf \"select=between(n\\,10\\,20)\""));
}

#[test]
fn command_render_reparses_identically() {
  let mut parser = Parser::new(Scope::Remote);
  parser
    .parse_command(
      "ffmpeg -y -f concat -safe 0 -i segments.txt \
       -vf \"select=between(n\\,0\\,99),setpts=N/FRAME_RATE/TB\" \
       -fps_mode passthrough -frame_pts true -an -g 10000 out.mkv",
      true,
    )
    .unwrap();
  parser.parse_command("ffmpeg -c:v libsvtav1 -crf 35", false).unwrap();

  let first = rendered(&parser.cmds);

  let mut reparser = Parser::new(Scope::Remote);
  reparser.parse_command(&first[0], true).unwrap();
  let second = rendered(&reparser.cmds);

  assert_eq!(first, second);
}

#[test]
fn template_resets_at_each_separator() {
  let cmds = overlay(
    Scope::Remote,
    "ffmpeg -crf 20 out.mkv",
    "ffmpeg -crf 30 ffmpeg ffmpeg -crf 40",
  )
  .unwrap();

  assert_eq!(cmds.len(), 3);
  assert!(cmds[0].get_command(false).contains("-crf 30"));
  // An empty pass keeps the template's value.
  assert!(cmds[1].get_command(false).contains("-crf 20"));
  assert!(cmds[2].get_command(false).contains("-crf 40"));
}
