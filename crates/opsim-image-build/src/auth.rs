//! レジストリ認証処理
//!
//! push 先レジストリの認証情報を Docker の config.json から探し、
//! Bollard の `DockerCredentials` に変換します。

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Docker Hub の既定レジストリ
const DOCKER_HUB: &str = "docker.io";

/// `docker login` が Docker Hub の認証情報を保存するキー
const DOCKER_HUB_INDEX: &str = "https://index.docker.io/v1/";

/// config.json の必要な部分だけ
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64 の "username:password"
    auth: Option<String>,
}

/// `docker-credential-<helper> get` の応答
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

#[derive(Debug)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG/config.json`、未設定なら `~/.docker/config.json` を使う
    pub fn new() -> Self {
        let config_dir = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            });

        Self::with_config_path(config_dir.join("config.json"))
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// イメージ参照の push 先レジストリに対する認証情報
    ///
    /// config.json が無い・該当エントリが無い場合は `Ok(None)`（匿名で push を試みる）。
    pub fn get_credentials(&self, image: &str) -> BuildResult<Option<DockerCredentials>> {
        let registry = registry_of(image);

        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load_docker_config()?;

        for key in auth_keys(&registry) {
            if let Some(entry) = config.auths.get(key)
                && let Some(auth_b64) = &entry.auth
                && let Some(creds) = decode_auth(auth_b64, &registry)?
            {
                tracing::debug!("Found credentials in auths for {}", registry);
                return Ok(Some(creds));
            }
        }

        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential helper: {}", helper);
            for key in auth_keys(&registry) {
                if let Ok(Some(creds)) = get_from_helper(helper, key, &registry) {
                    return Ok(Some(creds));
                }
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn load_docker_config(&self) -> BuildResult<DockerConfig> {
        let failed = |message: String| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message,
        };

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| failed(format!("Failed to read config.json: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| failed(format!("Failed to parse config.json: {}", e)))
    }
}

/// イメージ参照からレジストリのホスト部分を取り出す
///
/// 先頭要素に `.` か `:` を含む場合、または `localhost` の場合だけレジストリとみなす。
/// それ以外は Docker Hub。
///
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `mareuter/opsim4:opsim4` -> `docker.io`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn registry_of(image: &str) -> String {
    if let Some((first, _)) = image.split_once('/')
        && (first.contains('.') || first.contains(':') || first == "localhost")
    {
        return first.to_string();
    }

    DOCKER_HUB.to_string()
}

/// config.json 上で探すキー（Docker Hub は旧形式のキーでも保存される）
fn auth_keys(registry: &str) -> Vec<&str> {
    if registry == DOCKER_HUB {
        vec![DOCKER_HUB, DOCKER_HUB_INDEX]
    } else {
        vec![registry]
    }
}

/// `DockerCredentials::serveraddress` に入れる値（Docker Hub は `docker login` と同じキー）
fn server_address(registry: &str) -> String {
    if registry == DOCKER_HUB {
        DOCKER_HUB_INDEX.to_string()
    } else {
        registry.to_string()
    }
}

fn decode_auth(auth_b64: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let failed = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth_b64)
        .map_err(|e| failed(format!("Failed to decode auth: {}", e)))?;
    let auth_str =
        String::from_utf8(decoded).map_err(|e| failed(format!("Invalid UTF-8 in auth: {}", e)))?;

    Ok(auth_str
        .split_once(':')
        .map(|(username, password)| DockerCredentials {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            serveraddress: Some(server_address(registry)),
            ..Default::default()
        }))
}

/// credential helper に問い合わせる
fn get_from_helper(
    helper: &str,
    server: &str,
    registry: &str,
) -> BuildResult<Option<DockerCredentials>> {
    let helper_cmd = format!("docker-credential-{}", helper);
    let failed = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let mut child = Command::new(&helper_cmd)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| failed(format!("Failed to run {}: {}", helper_cmd, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(server.as_bytes()).ok();
    }

    let output = child
        .wait_with_output()
        .map_err(|e| failed(format!("Credential helper failed: {}", e)))?;

    if !output.status.success() {
        tracing::debug!(
            "Credential helper returned error for {}: {}",
            server,
            String::from_utf8_lossy(&output.stderr)
        );
        return Ok(None);
    }

    let response: CredentialResponse = serde_json::from_slice(&output.stdout)
        .map_err(|e| failed(format!("Failed to parse credential helper response: {}", e)))?;

    Ok(Some(DockerCredentials {
        username: Some(response.username),
        password: Some(response.secret),
        serveraddress: Some(server_address(registry)),
        ..Default::default()
    }))
}
