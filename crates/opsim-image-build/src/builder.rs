use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::image::BuildImageOptions;
use colored::Colorize;
use futures_util::stream::StreamExt;
use std::collections::HashMap;

/// Docker API 経由でイメージをビルドする
pub struct ImageBuilder {
    docker: Docker,
}

impl ImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// tar.gz のコンテキストからイメージをビルドしてタグを付ける
    pub async fn build_image(
        &self,
        context_data: Vec<u8>,
        tag: &str,
        build_args: &HashMap<String, String>,
        no_cache: bool,
    ) -> BuildResult<()> {
        tracing::info!("Building image: {}", tag);

        let build_args_refs: HashMap<&str, &str> = build_args
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        #[allow(deprecated)]
        let options = BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            buildargs: build_args_refs,
            nocache: no_cache,
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        tracing::debug!("Build options: {:?}", options);

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context_data));
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(output) => handle_build_output(output)?,
                Err(e) => return Err(BuildError::DockerConnection(e)),
            }
        }

        tracing::info!("Successfully built: {}", tag);
        Ok(())
    }
}

/// ビルドストリームの 1 メッセージを処理
fn handle_build_output(output: bollard::models::BuildInfo) -> BuildResult<()> {
    if let Some(stream) = output.stream {
        print!("{}", stream);
    }

    if let Some(error) = output.error {
        return Err(BuildError::BuildFailed(error));
    }

    if let Some(error_detail) = output.error_detail {
        let error_msg = error_detail
            .message
            .unwrap_or_else(|| "Unknown build error".to_string());
        return Err(BuildError::BuildFailed(error_msg));
    }

    if let Some(status) = output.status {
        println!("{}", status.cyan());
    }

    Ok(())
}
