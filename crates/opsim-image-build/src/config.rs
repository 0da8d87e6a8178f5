//! ビルド設定
//!
//! イメージのタグ・SIMS_VERSION・push 有無を保持する [`BuildConfig`] と、
//! 実行エンジン側の設定 [`EngineSettings`] を定義します。

use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};

/// タグ未指定時のデフォルト
pub const DEFAULT_TAG: &str = "mareuter/opsim4:opsim4";

/// SIMS_VERSION 未指定時のデフォルト
pub const DEFAULT_SIMS_VERSION: &str = "2.3.1";

/// ビルド引数名
pub const SIMS_VERSION_ARG: &str = "SIMS_VERSION";

/// 解決済みのビルド設定
///
/// [`crate::BuildPlanResolver::resolve`] でのみ生成され、生成後は変更されない。
/// `tag` と `sims_version` は常に空でない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    tag: String,
    sims_version: String,
    push: bool,
}

impl BuildConfig {
    pub(crate) fn new(tag: String, sims_version: String, push: bool) -> Self {
        Self {
            tag,
            sims_version,
            push,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn sims_version(&self) -> &str {
        &self.sims_version
    }

    pub fn push(&self) -> bool {
        self.push
    }
}

/// 実行エンジンの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// `docker` コマンドを起動する
    #[default]
    Cli,
    /// Docker デーモンの API を直接呼び出す
    Api,
    /// コマンドを表示するだけで実行しない
    DryRun,
}

impl EngineKind {
    pub fn parse(value: &str) -> BuildResult<Self> {
        match value {
            "cli" => Ok(EngineKind::Cli),
            "api" => Ok(EngineKind::Api),
            "dry-run" => Ok(EngineKind::DryRun),
            other => Err(BuildError::InvalidConfig(format!(
                "unknown engine '{}' (expected cli, api or dry-run)",
                other
            ))),
        }
    }
}

/// 実行エンジンの設定
///
/// 環境変数から読み込む:
/// - `OPSIM_IMAGE_ENGINE`: `cli` | `api` | `dry-run`（デフォルト: `cli`）
/// - `OPSIM_IMAGE_DOCKER`: `cli` エンジンで使うバイナリ（デフォルト: `docker`）
/// - `OPSIM_IMAGE_CONTEXT`: ビルドコンテキスト（デフォルト: `.`）
/// - `OPSIM_IMAGE_DOCKERFILE`: Dockerfile のパス（デフォルト: `<context>/Dockerfile`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub engine: EngineKind,
    pub docker_bin: String,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            docker_bin: "docker".to_string(),
            context: PathBuf::from("."),
            dockerfile: None,
        }
    }
}

impl EngineSettings {
    pub const ENGINE_VAR: &'static str = "OPSIM_IMAGE_ENGINE";
    pub const DOCKER_VAR: &'static str = "OPSIM_IMAGE_DOCKER";
    pub const CONTEXT_VAR: &'static str = "OPSIM_IMAGE_CONTEXT";
    pub const DOCKERFILE_VAR: &'static str = "OPSIM_IMAGE_DOCKERFILE";

    /// プロセスの環境変数から読み込む
    pub fn from_env() -> BuildResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から読み込む（空文字列は未設定として扱う）
    pub fn from_lookup<F>(lookup: F) -> BuildResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut settings = Self::default();

        if let Some(engine) = get(Self::ENGINE_VAR) {
            settings.engine = EngineKind::parse(&engine)?;
        }
        if let Some(bin) = get(Self::DOCKER_VAR) {
            settings.docker_bin = bin;
        }
        if let Some(context) = get(Self::CONTEXT_VAR) {
            settings.context = PathBuf::from(context);
        }
        settings.dockerfile = get(Self::DOCKERFILE_VAR).map(PathBuf::from);

        tracing::debug!("Engine settings: {:?}", settings);
        Ok(settings)
    }

    /// 実際に使う Dockerfile のパス
    pub fn dockerfile_path(&self) -> PathBuf {
        self.dockerfile
            .clone()
            .unwrap_or_else(|| self.context.join("Dockerfile"))
    }

    /// ビルドコンテキストと Dockerfile の存在確認
    pub fn check_paths(&self) -> BuildResult<()> {
        check_context(&self.context)?;

        let dockerfile = self.dockerfile_path();
        if !dockerfile.is_file() {
            return Err(BuildError::DockerfileNotFound(dockerfile));
        }

        Ok(())
    }
}

fn check_context(context: &Path) -> BuildResult<()> {
    if !context.exists() {
        return Err(BuildError::ContextNotFound(context.to_path_buf()));
    }

    if !context.is_dir() {
        return Err(BuildError::InvalidConfig(format!(
            "Build context is not a directory: {}",
            context.display()
        )));
    }

    Ok(())
}
