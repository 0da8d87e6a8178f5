use anyhow::Context;
use colored::Colorize;
use opsim_image_build::{
    BuildError, BuildPlanResolver, EngineSettings, ParseOutcome, execute_plan, parse_args, usage,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // ログは stderr。stdout はヘルプと計画の表示に使う
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(report(&err)),
    }
}

async fn run() -> anyhow::Result<()> {
    let config = match parse_args(std::env::args_os())? {
        ParseOutcome::HelpRequested => {
            println!("{}", usage().trim_end());
            return Ok(());
        }
        ParseOutcome::Resolved(config) => config,
    };

    let settings = EngineSettings::from_env().context("エンジン設定を読み込めません")?;
    let plan = BuildPlanResolver::plan(&config);

    println!("{}", "OpSim4 イメージをビルドします".bold());
    println!("  tag:          {}", config.tag().cyan());
    println!("  SIMS_VERSION: {}", config.sims_version().cyan());
    println!("  push:         {}", config.push());
    println!();

    execute_plan(&plan, &settings)
        .await
        .with_context(|| format!("{} の処理に失敗しました", config.tag()))?;

    println!();
    println!("{}", "✓ 完了しました".green());
    Ok(())
}

/// エラーを表示して終了コードを返す
fn report(err: &anyhow::Error) -> u8 {
    let Some(build_err) = err.chain().find_map(|e| e.downcast_ref::<BuildError>()) else {
        eprintln!("{} {:#}", "✗".red(), err);
        return 1;
    };

    if let BuildError::InvalidArguments(msg) = build_err {
        eprintln!("{} {}", "error:".red(), msg);
        eprintln!();
        eprintln!("{}", usage().trim_end());
    } else {
        if err.chain().count() > 1 {
            eprintln!("{} {}", "✗".red(), err);
        }
        eprintln!("{}", build_err.user_message());
    }

    build_err.exit_code()
}
