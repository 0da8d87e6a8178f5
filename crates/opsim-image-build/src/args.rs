//! コマンドラインフラグの解釈
//!
//! 受け付けるフラグは `-h`, `-T <tag>`, `-p`, `-s <version>` のみ。
//! 位置引数は受け付けない。

use crate::config::{BuildConfig, DEFAULT_SIMS_VERSION, DEFAULT_TAG};
use crate::error::{BuildError, BuildResult};
use crate::resolver::BuildPlanResolver;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;

#[derive(Debug, Parser)]
#[command(
    name = "opsim-image",
    about = "Build (and optionally push) the OpSim4 container image",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true,
    after_help = "Environment:\n  \
        OPSIM_IMAGE_ENGINE      cli | api | dry-run (default: cli)\n  \
        OPSIM_IMAGE_DOCKER      engine binary for the cli engine (default: docker)\n  \
        OPSIM_IMAGE_CONTEXT     build context directory (default: .)\n  \
        OPSIM_IMAGE_DOCKERFILE  Dockerfile path (default: <context>/Dockerfile)"
)]
struct Flags {
    /// Show this help and exit
    #[arg(short = 'h')]
    help: bool,

    #[arg(
        short = 'T',
        value_name = "TAG",
        allow_hyphen_values = true,
        help = format!("Image tag [default: {}]", DEFAULT_TAG)
    )]
    tag: Option<String>,

    /// Push the image after building it
    #[arg(short = 'p')]
    push: bool,

    #[arg(
        short = 's',
        value_name = "VERSION",
        allow_hyphen_values = true,
        help = format!("SIMS_VERSION build argument [default: {}]", DEFAULT_SIMS_VERSION)
    )]
    sims_version: Option<String>,
}

/// フラグ解釈の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// `-h` が指定された。計画は作らない。
    HelpRequested,
    /// ビルド設定まで解決できた
    Resolved(BuildConfig),
}

/// コマンドライン引数（先頭はプログラム名）を解釈してビルド設定を解決
///
/// `-h` は他のフラグより優先される。未知のフラグや位置引数は
/// [`BuildError::InvalidArguments`] になる。
pub fn parse_args<I, T>(args: I) -> BuildResult<ParseOutcome>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    if help_requested(args.iter().skip(1)) {
        return Ok(ParseOutcome::HelpRequested);
    }

    let flags = Flags::try_parse_from(&args)
        .map_err(|e| BuildError::InvalidArguments(clap_message(&e)))?;

    let config = BuildPlanResolver::resolve(
        flags.tag.as_deref(),
        flags.sims_version.as_deref(),
        flags.push,
    );
    Ok(ParseOutcome::Resolved(config))
}

/// ヘルプ（使い方）の文字列
pub fn usage() -> String {
    Flags::command().render_help().to_string()
}

/// `-h` がフラグ列のどこかにあるか
///
/// `-T`/`-s` の値として消費されるトークンは対象外。`--` か最初の位置引数で走査を止める。
fn help_requested<'a>(args: impl Iterator<Item = &'a OsString>) -> bool {
    let mut skip_value = false;

    for arg in args {
        if skip_value {
            skip_value = false;
            continue;
        }

        // UTF-8 でないトークンも走査を続ける
        let arg = arg.to_string_lossy();
        if arg == "--" || !arg.starts_with('-') || arg.len() == 1 {
            return false;
        }
        if arg.starts_with("--") {
            continue;
        }

        let cluster = &arg[1..];
        for (i, c) in cluster.char_indices() {
            match c {
                'h' => return true,
                'T' | 's' => {
                    // 値が同じトークンに続いていなければ次のトークンが値
                    skip_value = i + c.len_utf8() == cluster.len();
                    break;
                }
                _ => {}
            }
        }
    }

    false
}

fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(args: &[&str]) -> BuildConfig {
        let mut argv = vec!["opsim-image"];
        argv.extend_from_slice(args);
        match parse_args(argv).unwrap() {
            ParseOutcome::Resolved(config) => config,
            ParseOutcome::HelpRequested => panic!("unexpected help outcome for {:?}", args),
        }
    }

    fn outcome(args: &[&str]) -> BuildResult<ParseOutcome> {
        let mut argv = vec!["opsim-image"];
        argv.extend_from_slice(args);
        parse_args(argv)
    }

    #[test]
    fn test_no_flags_uses_defaults() {
        let config = resolved(&[]);
        assert_eq!(config.tag(), "mareuter/opsim4:opsim4");
        assert_eq!(config.sims_version(), "2.3.1");
        assert!(!config.push());
    }

    #[test]
    fn test_tag_and_push() {
        let config = resolved(&["-T", "foo/bar:v1", "-p"]);
        assert_eq!(config.tag(), "foo/bar:v1");
        assert_eq!(config.sims_version(), "2.3.1");
        assert!(config.push());
    }

    #[test]
    fn test_sims_version() {
        let config = resolved(&["-s", "3.0.0"]);
        assert_eq!(config.tag(), DEFAULT_TAG);
        assert_eq!(config.sims_version(), "3.0.0");
        assert!(!config.push());
    }

    #[test]
    fn test_attached_values_and_clusters() {
        let config = resolved(&["-Tfoo/bar:v2", "-s3.1.0"]);
        assert_eq!(config.tag(), "foo/bar:v2");
        assert_eq!(config.sims_version(), "3.1.0");

        let config = resolved(&["-pT", "foo/bar:v3"]);
        assert!(config.push());
        assert_eq!(config.tag(), "foo/bar:v3");
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = resolved(&["-T", "", "-s", ""]);
        assert_eq!(config.tag(), DEFAULT_TAG);
        assert_eq!(config.sims_version(), DEFAULT_SIMS_VERSION);
    }

    #[test]
    fn test_repeated_flag_last_wins() {
        let config = resolved(&["-T", "first:1", "-T", "second:2", "-p", "-p"]);
        assert_eq!(config.tag(), "second:2");
        assert!(config.push());
    }

    #[test]
    fn test_help_anywhere() {
        let cases: [&[&str]; 6] = [
            &["-h"],
            &["-T", "foo/bar:v1", "-h"],
            &["-h", "-p", "-s", "3.0.0"],
            &["-x", "-h"],
            &["-ph"],
            &["--help", "-h"],
        ];
        for args in cases {
            assert_eq!(
                outcome(args).unwrap(),
                ParseOutcome::HelpRequested,
                "args: {:?}",
                args
            );
        }
    }

    #[test]
    fn test_help_consumed_as_value() {
        let config = resolved(&["-T", "-h"]);
        assert_eq!(config.tag(), "-h");

        let config = resolved(&["-sh"]);
        assert_eq!(config.sims_version(), "h");
    }

    #[test]
    fn test_unknown_flag_is_invalid() {
        let result = outcome(&["-x"]);
        assert!(matches!(result, Err(BuildError::InvalidArguments(_))));

        let result = outcome(&["--help"]);
        assert!(matches!(result, Err(BuildError::InvalidArguments(_))));
    }

    #[test]
    fn test_positional_is_invalid() {
        let result = outcome(&["-T", "foo/bar:v1", "-p", "extra_arg"]);
        match result {
            Err(BuildError::InvalidArguments(msg)) => assert!(msg.contains("extra_arg")),
            other => panic!("expected InvalidArguments, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_value_is_invalid() {
        let result = outcome(&["-T"]);
        assert!(matches!(result, Err(BuildError::InvalidArguments(_))));
    }

    #[test]
    fn test_positional_stops_help_scan() {
        let result = outcome(&["extra_arg", "-h"]);
        assert!(matches!(result, Err(BuildError::InvalidArguments(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_help_after_non_utf8_token() {
        use std::os::unix::ffi::OsStringExt;

        let argv = vec![
            OsString::from("opsim-image"),
            OsString::from_vec(b"-x\xff".to_vec()),
            OsString::from("-h"),
        ];
        assert_eq!(parse_args(argv).unwrap(), ParseOutcome::HelpRequested);

        let argv = vec![
            OsString::from("opsim-image"),
            OsString::from("-T"),
            OsString::from_vec(b"tag\xff".to_vec()),
            OsString::from("-ph"),
        ];
        assert_eq!(parse_args(argv).unwrap(), ParseOutcome::HelpRequested);
    }

    #[test]
    fn test_usage_lists_flags() {
        let text = usage();
        assert!(text.contains("-T <TAG>"));
        assert!(text.contains("-s <VERSION>"));
        assert!(text.contains("-p"));
        assert!(text.contains("-h"));
        assert!(text.contains(DEFAULT_TAG));
    }
}
