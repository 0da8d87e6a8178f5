//! OpSim4 コンテナイメージのビルド計画と実行
//!
//! フラグからビルド設定を解決し、build（と必要なら push）のコマンド列を組み立てます。
//! 組み立てた計画は [`PlanExecutor`] の実装（`docker` コマンド、Docker API、
//! dry-run）で実行します。

pub mod args;
pub mod auth;
pub mod builder;
pub mod config;
pub mod context;
pub mod docker_api;
pub mod docker_cli;
pub mod error;
pub mod executor;
pub mod plan;
pub mod pusher;
pub mod resolver;

pub use args::{ParseOutcome, parse_args, usage};
pub use auth::RegistryAuth;
pub use builder::ImageBuilder;
pub use config::{
    BuildConfig, DEFAULT_SIMS_VERSION, DEFAULT_TAG, EngineKind, EngineSettings, SIMS_VERSION_ARG,
};
pub use context::ContextBuilder;
pub use docker_api::DockerApi;
pub use docker_cli::DockerCli;
pub use error::{BuildError, BuildResult};
pub use executor::{DryRun, PlanExecutor, execute_plan, run_plan};
pub use plan::{BuildPlan, CommandSpec};
pub use pusher::{ImagePusher, split_image_tag};
pub use resolver::BuildPlanResolver;
