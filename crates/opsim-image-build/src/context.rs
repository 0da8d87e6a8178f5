use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use tar::Builder;

/// 500MB を超えるコンテキストは警告する
const LARGE_CONTEXT_BYTES: usize = 500 * 1024 * 1024;

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストを tar.gz にまとめる
    ///
    /// Dockerfile はアーカイブ直下の `Dockerfile` として格納する。
    /// コンテキスト直下の `Dockerfile` を使う場合は二重に追加しない。
    pub fn create_context(context_path: &Path, dockerfile_path: &Path) -> BuildResult<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", context_path.display());

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            if is_context_dockerfile(context_path, dockerfile_path) {
                tar.append_dir_all(".", context_path)?;
            } else {
                // 外部の Dockerfile と衝突しないよう、コンテキスト直下の Dockerfile は入れない
                append_context_without_dockerfile(&mut tar, context_path)?;

                let content = std::fs::read(dockerfile_path)
                    .map_err(|_| BuildError::DockerfileNotFound(dockerfile_path.to_path_buf()))?;

                let mut header = tar::Header::new_gnu();
                header.set_path("Dockerfile").map_err(|e| {
                    BuildError::InvalidConfig(format!("Failed to set Dockerfile path: {}", e))
                })?;
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();

                tar.append(&header, &content[..])?;
            }

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        if archive_data.len() > LARGE_CONTEXT_BYTES {
            tracing::warn!(
                "ビルドコンテキストが大きすぎます（{}MB）。.dockerignore で不要なファイルを除外してください。",
                archive_data.len() / 1024 / 1024
            );
        }

        Ok(archive_data)
    }
}

fn append_context_without_dockerfile<W: Write>(
    tar: &mut Builder<W>,
    context_path: &Path,
) -> BuildResult<()> {
    tar.append_dir(".", context_path)?;

    for entry in std::fs::read_dir(context_path)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == "Dockerfile" {
            continue;
        }

        let path = entry.path();
        let archive_path = Path::new(".").join(&name);
        if path.is_dir() {
            tar.append_dir_all(&archive_path, &path)?;
        } else {
            tar.append_path_with_name(&path, &archive_path)?;
        }
    }

    Ok(())
}

fn is_context_dockerfile(context_path: &Path, dockerfile_path: &Path) -> bool {
    let default = context_path.join("Dockerfile");
    match (default.canonicalize(), dockerfile_path.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
