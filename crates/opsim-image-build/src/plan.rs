//! 実行計画
//!
//! 外部エンジンに渡すコマンドの記述 ([`CommandSpec`]) と、その順序付きの列
//! ([`BuildPlan`]) を定義します。ここでは何も実行しません。

use crate::config::SIMS_VERSION_ARG;
use std::fmt;

/// 外部エンジンに依頼する 1 コマンド分の記述
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// キャッシュなしでイメージをビルドしてタグを付ける
    Build { tag: String, sims_version: String },
    /// タグ付きイメージをレジストリへ送る
    Push { tag: String },
}

impl CommandSpec {
    pub fn action(&self) -> &'static str {
        match self {
            CommandSpec::Build { .. } => "build",
            CommandSpec::Push { .. } => "push",
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            CommandSpec::Build { tag, .. } | CommandSpec::Push { tag } => tag,
        }
    }

    /// ビルド引数 (`SIMS_VERSION`, 値)。push には無い。
    pub fn build_arg(&self) -> Option<(&'static str, &str)> {
        match self {
            CommandSpec::Build { sims_version, .. } => Some((SIMS_VERSION_ARG, sims_version)),
            CommandSpec::Push { .. } => None,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Build { tag, sims_version } => {
                write!(f, "build {} ({}={})", tag, SIMS_VERSION_ARG, sims_version)
            }
            CommandSpec::Push { tag } => write!(f, "push {}", tag),
        }
    }
}

/// 順序付きのコマンド列
///
/// 先頭は常に build。push は build の後にだけ現れる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    commands: Vec<CommandSpec>,
}

impl BuildPlan {
    pub(crate) fn new(commands: Vec<CommandSpec>) -> Self {
        Self { commands }
    }

    /// 先頭から辿るイテレータ。何度でも作り直せる。
    pub fn iter(&self) -> std::slice::Iter<'_, CommandSpec> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }
}

impl<'a> IntoIterator for &'a BuildPlan {
    type Item = &'a CommandSpec;
    type IntoIter = std::slice::Iter<'a, CommandSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
