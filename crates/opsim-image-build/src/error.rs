use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Container engine '{program}' could not be started: {source}")]
    EngineUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{} command exited with {}", .action, exit_status_label(.code))]
    CommandFailed {
        action: &'static str,
        code: Option<i32>,
    },

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_status_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl BuildError {
    /// プロセスの終了コード
    ///
    /// 引数エラーは 2、外部コマンドの失敗はそのコマンドの終了コードをそのまま返す。
    pub fn exit_code(&self) -> u8 {
        match self {
            BuildError::InvalidArguments(_) => 2,
            BuildError::CommandFailed {
                code: Some(code), ..
            } => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
            _ => 1,
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfileが見つかりません: {}\n\
                     \n\
                     解決方法:\n\
                     1. ビルドコンテキストのパスを確認してください\n\
                     2. OPSIM_IMAGE_DOCKERFILE で明示的にパスを指定してください",
                    path.display()
                )
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     OPSIM_IMAGE_CONTEXT のパスを確認してください。",
                    path.display()
                )
            }
            BuildError::EngineUnavailable { program, .. } => {
                format!(
                    "コンテナエンジン '{}' を起動できません。\n\
                     \n\
                     Docker がインストールされているか確認してください:\n\
                     https://docs.docker.com/engine/install/",
                    program
                )
            }
            BuildError::BuildFailed(msg) => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     Dockerfileの内容を確認してください。",
                    msg
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
