//! イメージプッシュ処理
//!
//! ビルドしたイメージをコンテナレジストリにプッシュします。

use crate::auth::RegistryAuth;
use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::models::PushImageInfo;
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    docker: Docker,
    auth: RegistryAuth,
}

impl ImagePusher {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuth::new(),
        }
    }

    /// イメージ参照（`repo[:tag]`）をそのままレジストリにプッシュ
    ///
    /// タグの書式は検証しない。不正な参照はデーモン側のエラーとして返る。
    pub async fn push(&self, reference: &str) -> BuildResult<()> {
        let (image, tag) = split_image_tag(reference)?;
        let credentials = self.auth.get_credentials(reference)?;

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> { tag: tag.clone() };

        println!("  → {}", format!("{}:{}", image, tag).cyan());

        #[allow(deprecated)]
        let mut stream = self.docker.push_image(image.as_str(), Some(options), credentials);

        let mut last_status = String::new();
        let mut error_message: Option<String> = None;

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error {
                        error_message = Some(err);
                    } else {
                        handle_progress(&info, &mut last_status);
                    }
                }
                Err(e) => {
                    return Err(BuildError::PushFailed {
                        message: e.to_string(),
                    });
                }
            }
        }

        println!();

        if let Some(err) = error_message {
            return Err(BuildError::PushFailed { message: err });
        }

        tracing::info!("Pushed {}:{}", image, tag);
        Ok(())
    }
}

/// プッシュ進捗を表示
fn handle_progress(info: &PushImageInfo, last_status: &mut String) {
    let Some(status) = &info.status else {
        return;
    };
    let progress = info.progress.as_deref().unwrap_or("");

    match status.as_str() {
        "Pushing" => {
            print!("\r  ↑ {} {}     ", status, progress);
            std::io::stdout().flush().ok();
        }
        "Pushed" => {
            println!("\r  {} Pushed                    ", "✓".green());
        }
        "Layer already exists" => {
            println!("\r  {} Layer already exists      ", "✓".green());
        }
        // 準備中は表示しない
        "Preparing" | "Waiting" => {}
        _ => {
            if status != last_status {
                println!("\r  ℹ {}                    ", status);
                *last_status = status.clone();
            }
        }
    }
}

/// イメージ名とタグを分離
///
/// 空のタグ（`repo:`）とダイジェスト参照（`repo@sha256:...`）は push できないのでエラー。
///
/// # Examples
/// - `mareuter/opsim4:opsim4` -> `("mareuter/opsim4", "opsim4")`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", "latest")`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", "dev")`
pub fn split_image_tag(image: &str) -> BuildResult<(String, String)> {
    let invalid = |reason: &str| BuildError::PushFailed {
        message: format!("{}: {}", reason, image),
    };

    if image.contains('@') {
        return Err(invalid("digest references cannot be pushed"));
    }

    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        let potential_image = &image[..pos];

        // 最後の `/` より前の `:` はレジストリのポート番号
        if !potential_tag.contains('/') {
            if potential_tag.is_empty() {
                return Err(invalid("empty tag in image reference"));
            }
            return Ok((potential_image.to_string(), potential_tag.to_string()));
        }
    }

    Ok((image.to_string(), "latest".to_string()))
}
