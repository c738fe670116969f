use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{WikiError, WikiResult};
use crate::paths::parse_allowed_roots;

pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub upstream: UpstreamSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct UpstreamSection {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub locale: Option<String>,
    pub timeout_ms: Option<u64>,
    pub allowed_roots: Option<String>,
}

impl WikiConfig {
    /// Resolve the upstream base URL: env WIKIJS_BASE_URL > config > None.
    pub fn base_url(&self) -> Option<String> {
        env_override("WIKIJS_BASE_URL").or_else(|| self.upstream.base_url.clone())
    }

    /// Resolve the API token: env WIKIJS_API_TOKEN > config > None.
    pub fn api_token(&self) -> Option<String> {
        env_override("WIKIJS_API_TOKEN").or_else(|| self.upstream.api_token.clone())
    }

    /// Resolve the content locale: env WIKIJS_LOCALE > config > "en".
    pub fn locale(&self) -> String {
        env_override("WIKIJS_LOCALE")
            .or_else(|| self.upstream.locale.clone())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
    }

    /// Per-call HTTP timeout: env WIKIMGR_HTTP_TIMEOUT_MS > config > default.
    pub fn timeout_ms(&self) -> u64 {
        env_override("WIKIMGR_HTTP_TIMEOUT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.upstream.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Allowed page roots: env WIKIMGR_ALLOWED_ROOTS > config > built-in set.
    pub fn allowed_roots(&self) -> Vec<String> {
        let raw =
            env_override("WIKIMGR_ALLOWED_ROOTS").or_else(|| self.upstream.allowed_roots.clone());
        parse_allowed_roots(raw.as_deref())
    }

    /// Validate connection settings before any network call is attempted.
    pub fn resolved(&self) -> WikiResult<ResolvedUpstream> {
        let base_url = self.base_url().ok_or_else(|| {
            WikiError::Configuration("upstream base URL is not configured".to_string())
        })?;
        let api_token = self.api_token().ok_or_else(|| {
            WikiError::Configuration("upstream API token is not configured".to_string())
        })?;

        Ok(ResolvedUpstream {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            locale: self.locale(),
            timeout_ms: self.timeout_ms(),
            allowed_roots: self.allowed_roots(),
        })
    }
}

/// Connection settings with required fields present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpstream {
    pub base_url: String,
    pub api_token: String,
    pub locale: String,
    pub timeout_ms: u64,
    pub allowed_roots: Vec<String>,
}

impl ResolvedUpstream {
    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", self.base_url)
    }
}

/// Load a WikiConfig from a TOML file. Returns defaults if the file does
/// not exist; a file that exists but does not parse is a configuration
/// error, not a silent fallback.
pub fn load_config(config_path: &Path) -> WikiResult<WikiConfig> {
    if !config_path.exists() {
        return Ok(WikiConfig::default());
    }
    let content = fs::read_to_string(config_path).map_err(|error| {
        WikiError::Configuration(format!("failed to read {}: {error}", config_path.display()))
    })?;
    toml::from_str(&content).map_err(|error| {
        WikiError::Configuration(format!("failed to parse {}: {error}", config_path.display()))
    })
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn configured() -> WikiConfig {
        WikiConfig {
            upstream: UpstreamSection {
                base_url: Some("https://wiki.example.org/".to_string()),
                api_token: Some("token-1".to_string()),
                locale: None,
                timeout_ms: Some(5_000),
                allowed_roots: Some("homelab,ai".to_string()),
            },
        }
    }

    #[test]
    fn default_config_has_no_connection_settings() {
        let config = WikiConfig::default();
        assert!(config.upstream.base_url.is_none());
        assert!(config.upstream.api_token.is_none());
        assert_eq!(config.locale(), "en");
        assert_eq!(config.timeout_ms(), DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn resolved_fails_without_base_url() {
        let error = WikiConfig::default().resolved().expect_err("must fail");
        assert!(matches!(error, WikiError::Configuration(_)));
    }

    #[test]
    fn resolved_fails_without_token() {
        let config = WikiConfig {
            upstream: UpstreamSection {
                base_url: Some("https://wiki.example.org".to_string()),
                ..UpstreamSection::default()
            },
        };
        let error = config.resolved().expect_err("must fail");
        assert!(matches!(error, WikiError::Configuration(_)));
    }

    #[test]
    fn resolved_trims_trailing_slash_and_builds_graphql_url() {
        let resolved = configured().resolved().expect("resolved");
        assert_eq!(resolved.base_url, "https://wiki.example.org");
        assert_eq!(resolved.graphql_url(), "https://wiki.example.org/graphql");
        assert_eq!(resolved.timeout_ms, 5_000);
        assert_eq!(resolved.allowed_roots, vec!["homelab", "ai"]);
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/wikimgr.toml")).expect("load config");
        assert_eq!(config, WikiConfig::default());
    }

    #[test]
    fn load_config_parses_upstream_section() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("wikimgr.toml");
        fs::write(
            &config_path,
            r#"
[upstream]
base_url = "https://wiki.example.org"
api_token = "secret"
locale = "de"
timeout_ms = 2500
allowed_roots = "homelab, projects"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.upstream.base_url.as_deref(),
            Some("https://wiki.example.org")
        );
        assert_eq!(config.upstream.api_token.as_deref(), Some("secret"));
        assert_eq!(config.locale(), "de");
        assert_eq!(config.timeout_ms(), 2500);
        assert_eq!(config.allowed_roots(), vec!["homelab", "projects"]);
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("wikimgr.toml");
        fs::write(&config_path, "[other]\nkey = \"value\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.upstream.base_url.is_none());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("wikimgr.toml");
        fs::write(&config_path, "[upstream\nbase_url = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(matches!(error, WikiError::Configuration(_)));
    }
}
