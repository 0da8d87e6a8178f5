use crate::builder::ImageBuilder;
use crate::config::EngineSettings;
use crate::context::ContextBuilder;
use crate::error::BuildResult;
use crate::executor::PlanExecutor;
use crate::plan::CommandSpec;
use crate::pusher::ImagePusher;
use bollard::Docker;
use std::collections::HashMap;
use std::path::PathBuf;

/// Docker デーモンの API を直接呼び出して計画を実行するエンジン
pub struct DockerApi {
    builder: ImageBuilder,
    pusher: ImagePusher,
    context: PathBuf,
    dockerfile: PathBuf,
}

impl DockerApi {
    /// ローカルのデーモンに接続する
    pub fn connect(settings: &EngineSettings) -> BuildResult<Self> {
        settings.check_paths()?;

        let docker = Docker::connect_with_local_defaults()?;
        tracing::debug!("Connected to Docker daemon");

        Ok(Self {
            builder: ImageBuilder::new(docker.clone()),
            pusher: ImagePusher::new(docker),
            context: settings.context.clone(),
            dockerfile: settings.dockerfile_path(),
        })
    }
}

impl PlanExecutor for DockerApi {
    async fn execute(&self, command: &CommandSpec) -> BuildResult<()> {
        match command {
            CommandSpec::Build { tag, .. } => {
                let context_data = ContextBuilder::create_context(&self.context, &self.dockerfile)?;
                let build_args: HashMap<String, String> = command
                    .build_arg()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .into_iter()
                    .collect();

                self.builder
                    .build_image(context_data, tag, &build_args, true)
                    .await
            }
            CommandSpec::Push { tag } => self.pusher.push(tag).await,
        }
    }
}
