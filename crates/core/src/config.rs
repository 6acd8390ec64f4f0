use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;

static SESSION_FILE_NAME: &str = "session.json";
static ENV_DATA_DIR: &str = "TEAMDESK_DATA_DIR";
static ENV_API_URL: &str = "TEAMDESK_API_URL";
static ENV_TIMEOUT_SECS: &str = "TEAMDESK_TIMEOUT_SECS";

pub const DEFAULT_API_URL: &str = "http://localhost/teamdesk/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "teamdesk", "teamdesk"));

#[derive(Debug, Clone)]
pub struct AppConfig {
    data_dir: PathBuf,
    session_path: PathBuf,
    api_base_url: String,
    request_timeout: Duration,
}

impl AppConfig {
    /// Resolve the data directory and backend location from overrides,
    /// environment variables and platform defaults.
    pub fn discover(
        data_dir_override: Option<PathBuf>,
        api_url_override: Option<String>,
    ) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir_override)?;
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory at {}", data_dir.display())
            })?;
        }
        let api_base_url = api_url_override
            .or_else(|| env::var(ENV_API_URL).ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let request_timeout = match env::var(ENV_TIMEOUT_SECS) {
            Ok(raw) => parse_timeout(&raw)?,
            Err(_) => DEFAULT_TIMEOUT,
        };
        Self::from_parts(data_dir, &api_base_url, request_timeout)
    }

    /// Construct [`AppConfig`] directly from resolved values.
    pub fn from_parts(data_dir: PathBuf, api_base_url: &str, request_timeout: Duration) -> Result<Self> {
        let api_base_url = api_base_url.trim().trim_end_matches('/').to_string();
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(anyhow!(
                "API URL '{}' must start with http:// or https://",
                api_base_url
            ));
        }
        let session_path = data_dir.join(SESSION_FILE_NAME);
        Ok(Self {
            data_dir,
            session_path,
            api_base_url,
            request_timeout,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'"))?;
    if secs == 0 {
        return Err(anyhow!("{ENV_TIMEOUT_SECS} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }

    if let Ok(env_dir) = env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(env_dir));
    }

    if cfg!(debug_assertions) {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let dev_dir = manifest_dir.join("..").join("tmp").join("dev-teamdesk");
        return Ok(dev_dir);
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Ok(project.data_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".teamdesk"));
    }

    Ok(env::current_dir()?.join(".teamdesk"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::tempdir;

    #[test]
    fn discover_creates_override_directory() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("nested").join("teamdesk");

        let config =
            AppConfig::discover(Some(dir.clone()), Some("http://example.test/api/".into())).unwrap();

        assert!(dir.is_dir());
        assert_eq!(config.session_path(), dir.join("session.json"));
        assert_eq!(config.api_base_url(), "http://example.test/api");
    }

    #[test]
    fn rejects_non_http_urls() {
        let temp = tempdir().unwrap();
        let err = AppConfig::from_parts(temp.path().into(), "ftp://files", DEFAULT_TIMEOUT)
            .unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[rstest]
    #[case("45", Some(45))]
    #[case(" 5 ", Some(5))]
    #[case("0", None)]
    #[case("soon", None)]
    fn timeout_values(#[case] raw: &str, #[case] expected: Option<u64>) {
        let parsed = parse_timeout(raw).ok().map(|d| d.as_secs());
        assert_eq!(parsed, expected);
    }
}
