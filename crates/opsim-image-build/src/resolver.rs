use crate::config::{BuildConfig, DEFAULT_SIMS_VERSION, DEFAULT_TAG};
use crate::plan::{BuildPlan, CommandSpec};

/// 入力値からビルド設定を解決し、実行計画を組み立てる
///
/// どちらの操作も副作用を持たない。
pub struct BuildPlanResolver;

impl BuildPlanResolver {
    /// ビルド設定の解決
    ///
    /// 未指定または空文字列の場合はデフォルト値を使う。
    /// 値の中身（タグの書式など）は検証せずそのまま通す。
    pub fn resolve(
        raw_tag: Option<&str>,
        raw_sims_version: Option<&str>,
        raw_push: bool,
    ) -> BuildConfig {
        let tag = non_empty_or(raw_tag, DEFAULT_TAG);
        let sims_version = non_empty_or(raw_sims_version, DEFAULT_SIMS_VERSION);

        BuildConfig::new(tag, sims_version, raw_push)
    }

    /// 実行計画の組み立て
    ///
    /// 1. build（常に）
    /// 2. push（`config.push()` が true の場合のみ）
    pub fn plan(config: &BuildConfig) -> BuildPlan {
        let mut commands = vec![CommandSpec::Build {
            tag: config.tag().to_string(),
            sims_version: config.sims_version().to_string(),
        }];

        if config.push() {
            commands.push(CommandSpec::Push {
                tag: config.tag().to_string(),
            });
        }

        BuildPlan::new(commands)
    }
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}
