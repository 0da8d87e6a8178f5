use crate::config::EngineSettings;
use crate::error::{BuildError, BuildResult};
use crate::executor::PlanExecutor;
use crate::plan::CommandSpec;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;

/// `docker` コマンドを起動して計画を実行するエンジン
///
/// 標準入出力はそのまま引き継ぐので、ビルドログは端末にそのまま流れる。
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    context: PathBuf,
    dockerfile: Option<PathBuf>,
}

impl DockerCli {
    /// コンテキストと Dockerfile の存在を確認してから作成
    pub fn new(settings: &EngineSettings) -> BuildResult<Self> {
        settings.check_paths()?;
        Ok(Self::unchecked(settings))
    }

    pub(crate) fn unchecked(settings: &EngineSettings) -> Self {
        Self {
            program: settings.docker_bin.clone(),
            context: settings.context.clone(),
            dockerfile: settings.dockerfile.clone(),
        }
    }

    /// エンジンに渡す引数
    ///
    /// - build: `build --no-cache --build-arg SIMS_VERSION=<v> -t <tag> [-f <dockerfile>] <context>`
    /// - push: `push <tag>`
    pub fn command_args(&self, command: &CommandSpec) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        match command {
            CommandSpec::Build { tag, .. } => {
                args.push("build".into());
                args.push("--no-cache".into());

                if let Some((name, value)) = command.build_arg() {
                    args.push("--build-arg".into());
                    args.push(format!("{}={}", name, value).into());
                }

                args.push("-t".into());
                args.push(tag.into());

                if let Some(dockerfile) = &self.dockerfile {
                    args.push("-f".into());
                    args.push(dockerfile.into());
                }

                args.push(self.context.clone().into());
            }
            CommandSpec::Push { tag } => {
                args.push("push".into());
                args.push(tag.into());
            }
        }

        args
    }

    /// 表示用のコマンドライン
    pub fn command_line(&self, command: &CommandSpec) -> String {
        std::iter::once(OsString::from(&self.program))
            .chain(self.command_args(command))
            .map(|arg| quote(&arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl PlanExecutor for DockerCli {
    async fn execute(&self, command: &CommandSpec) -> BuildResult<()> {
        tracing::debug!("Running: {}", self.command_line(command));

        let status = Command::new(&self.program)
            .args(self.command_args(command))
            .status()
            .await
            .map_err(|source| BuildError::EngineUnavailable {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(BuildError::CommandFailed {
                action: command.action(),
                code: status.code(),
            });
        }

        tracing::info!("Finished {} for {}", command.action(), command.tag());
        Ok(())
    }
}

/// シェルにそのまま貼り付けられる形にする
///
/// 安全な文字だけで構成される引数はそのまま、それ以外はシングルクォートで囲む。
fn quote(arg: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "_./:=@%+,-".contains(c);
    if !arg.is_empty() && arg.chars().all(is_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn build_spec(tag: &str, version: &str) -> CommandSpec {
        CommandSpec::Build {
            tag: tag.to_string(),
            sims_version: version.to_string(),
        }
    }

    #[test]
    fn test_build_args() {
        let cli = DockerCli::unchecked(&EngineSettings::default());
        let args: Vec<String> = cli
            .command_args(&build_spec("mareuter/opsim4:opsim4", "2.3.1"))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "build",
                "--no-cache",
                "--build-arg",
                "SIMS_VERSION=2.3.1",
                "-t",
                "mareuter/opsim4:opsim4",
                ".",
            ]
        );
    }

    #[test]
    fn test_build_args_with_dockerfile() {
        let settings = EngineSettings {
            context: PathBuf::from("/srv/opsim4"),
            dockerfile: Some(PathBuf::from("/srv/opsim4/Dockerfile.sims")),
            ..Default::default()
        };
        let cli = DockerCli::unchecked(&settings);
        let line = cli.command_line(&build_spec("foo/bar:v1", "3.0.0"));

        assert_eq!(
            line,
            "docker build --no-cache --build-arg SIMS_VERSION=3.0.0 -t foo/bar:v1 \
             -f /srv/opsim4/Dockerfile.sims /srv/opsim4"
        );
    }

    #[test]
    fn test_push_args() {
        let settings = EngineSettings {
            docker_bin: "podman".to_string(),
            ..Default::default()
        };
        let cli = DockerCli::unchecked(&settings);
        let line = cli.command_line(&CommandSpec::Push {
            tag: "foo/bar:v1".to_string(),
        });
        assert_eq!(line, "podman push foo/bar:v1");
    }

    #[test]
    fn test_command_line_quotes_unusual_values() {
        let cli = DockerCli::unchecked(&EngineSettings::default());
        let line = cli.command_line(&build_spec("odd tag", "it's"));
        assert!(line.contains("'odd tag'"));
        assert!(line.contains(r"'SIMS_VERSION=it'\''s'"));
    }

    #[test]
    fn test_command_line_quotes_shell_metacharacters() {
        let cli = DockerCli::unchecked(&EngineSettings::default());

        let line = cli.command_line(&CommandSpec::Push {
            tag: "foo;touch${IFS}pwned".to_string(),
        });
        assert_eq!(line, "docker push 'foo;touch${IFS}pwned'");

        let line = cli.command_line(&build_spec("foo/bar:v1", "$(id)`x`&|\\\"()"));
        assert!(line.contains(r#"'SIMS_VERSION=$(id)`x`&|\"()'"#));
        assert!(line.contains(" -t foo/bar:v1 "));
    }

    #[test]
    fn test_command_line_quotes_empty_argument() {
        assert_eq!(quote(""), "''");
        assert_eq!(quote("SIMS_VERSION=2.3.1"), "SIMS_VERSION=2.3.1");
        assert_eq!(quote("user@host:5000/a+b,c%d"), "user@host:5000/a+b,c%d");
    }

    #[test]
    fn test_new_requires_dockerfile() {
        let temp_dir = tempdir().unwrap();
        let settings = EngineSettings {
            context: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            DockerCli::new(&settings),
            Err(BuildError::DockerfileNotFound(_))
        ));

        fs::write(temp_dir.path().join("Dockerfile"), "FROM alpine").unwrap();
        assert!(DockerCli::new(&settings).is_ok());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// 引数を記録して指定コードで終了する偽の docker
        fn fake_engine(dir: &std::path::Path, exit_code: i32) -> PathBuf {
            let script = dir.join("fake-docker");
            let log = dir.join("calls.log");
            fs::write(
                &script,
                format!(
                    "#!/bin/sh\necho \"$@\" >> '{}'\nexit {}\n",
                    log.display(),
                    exit_code
                ),
            )
            .unwrap();
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
            script
        }

        fn settings_for(dir: &std::path::Path, program: &std::path::Path) -> EngineSettings {
            fs::write(dir.join("Dockerfile"), "FROM alpine").unwrap();
            EngineSettings {
                docker_bin: program.display().to_string(),
                context: dir.to_path_buf(),
                ..Default::default()
            }
        }

        #[tokio::test]
        async fn test_execute_success() {
            let temp_dir = tempdir().unwrap();
            let program = fake_engine(temp_dir.path(), 0);
            let cli = DockerCli::new(&settings_for(temp_dir.path(), &program)).unwrap();

            cli.execute(&build_spec("foo/bar:v1", "3.0.0")).await.unwrap();
            cli.execute(&CommandSpec::Push {
                tag: "foo/bar:v1".to_string(),
            })
            .await
            .unwrap();

            let calls = fs::read_to_string(temp_dir.path().join("calls.log")).unwrap();
            let lines: Vec<_> = calls.lines().collect();
            assert_eq!(lines.len(), 2);
            assert!(lines[0].starts_with("build --no-cache --build-arg SIMS_VERSION=3.0.0 -t foo/bar:v1"));
            assert_eq!(lines[1], "push foo/bar:v1");
        }

        #[tokio::test]
        async fn test_execute_propagates_exit_code() {
            let temp_dir = tempdir().unwrap();
            let program = fake_engine(temp_dir.path(), 3);
            let cli = DockerCli::new(&settings_for(temp_dir.path(), &program)).unwrap();

            let err = cli
                .execute(&build_spec("foo/bar:v1", "3.0.0"))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                BuildError::CommandFailed {
                    action: "build",
                    code: Some(3)
                }
            ));
            assert_eq!(err.exit_code(), 3);
        }

        #[tokio::test]
        async fn test_execute_missing_engine() {
            let temp_dir = tempdir().unwrap();
            let missing = temp_dir.path().join("no-such-docker");
            let cli = DockerCli::new(&settings_for(temp_dir.path(), &missing)).unwrap();

            let err = cli
                .execute(&build_spec("foo/bar:v1", "3.0.0"))
                .await
                .unwrap_err();
            assert!(matches!(err, BuildError::EngineUnavailable { .. }));
        }
    }
}
