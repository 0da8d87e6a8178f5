//! 実行計画の実行
//!
//! [`PlanExecutor`] を実装した型が [`CommandSpec`] を実際に処理する。
//! 計画の組み立て側はどの実装が使われるかを知らない。

use crate::config::{EngineKind, EngineSettings};
use crate::docker_api::DockerApi;
use crate::docker_cli::DockerCli;
use crate::error::BuildResult;
use crate::plan::{BuildPlan, CommandSpec};
use colored::Colorize;

/// 1 コマンドずつ実行する外部エンジン
#[allow(async_fn_in_trait)]
pub trait PlanExecutor {
    async fn execute(&self, command: &CommandSpec) -> BuildResult<()>;
}

/// 計画を順番に実行する
///
/// 最初に失敗したコマンドで止まり、そのエラーをそのまま返す（再試行しない）。
/// build が失敗した場合 push は実行されない。
pub async fn run_plan<E: PlanExecutor>(executor: &E, plan: &BuildPlan) -> BuildResult<()> {
    let total = plan.len();

    for (index, command) in plan.iter().enumerate() {
        tracing::info!("[{}/{}] {}", index + 1, total, command);
        executor.execute(command).await?;
    }

    Ok(())
}

/// 設定に応じたエンジンで計画を実行する
pub async fn execute_plan(plan: &BuildPlan, settings: &EngineSettings) -> BuildResult<()> {
    match settings.engine {
        EngineKind::Cli => {
            let executor = DockerCli::new(settings)?;
            run_plan(&executor, plan).await
        }
        EngineKind::Api => {
            let executor = DockerApi::connect(settings)?;
            run_plan(&executor, plan).await
        }
        EngineKind::DryRun => {
            let executor = DryRun::new(settings);
            run_plan(&executor, plan).await
        }
    }
}

/// 実行せずにコマンドラインを表示するだけのエンジン
pub struct DryRun {
    cli: DockerCli,
}

impl DryRun {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            cli: DockerCli::unchecked(settings),
        }
    }

    /// `cli` エンジンが実行するコマンドライン
    pub fn render(&self, command: &CommandSpec) -> String {
        self.cli.command_line(command)
    }
}

impl PlanExecutor for DryRun {
    async fn execute(&self, command: &CommandSpec) -> BuildResult<()> {
        println!("{} {}", "→".blue(), self.render(command));
        Ok(())
    }
}
