use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-pr.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub ncbi: NcbiSection,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub http: HttpSection,
    #[serde(default)]
    pub summary: SummarySection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub usage: UsageSection,
    #[serde(default)]
    pub browser: BrowserSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NcbiSection {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ResolverSection {
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub poll_attempts: Option<usize>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub attempts: Option<usize>,
    #[serde(default)]
    pub cluster_hint_search: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HttpSection {
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub retry_interval_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub transient_retries: Option<usize>,
    #[serde(default)]
    pub transient_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SummarySection {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub requests_per_minute: Option<u64>,
    #[serde(default)]
    pub tokens_per_minute: Option<u64>,
    #[serde(default)]
    pub requests_per_day: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct OutputSection {
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub pdf: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UsageSection {
    #[serde(default)]
    pub ledger_path: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BrowserSection {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub startup_wait_secs: Option<u64>,
    #[serde(default)]
    pub capture_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub chunk_size: usize,
    pub poll_attempts: usize,
    pub poll_interval_secs: u64,
    pub attempts: usize,
    pub cluster_hint_search: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            chunk_size: 70,
            poll_attempts: 10,
            poll_interval_secs: 5,
            attempts: 3,
            cluster_hint_search: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Polls of a `202 Accepted` resource before giving up.
    pub max_retries: usize,
    pub retry_interval_secs: u64,
    pub timeout_secs: u64,
    /// Resends after a transport fault, 429 or 5xx. The delay grows linearly per attempt.
    pub transient_retries: usize,
    pub transient_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_retries: 10,
            retry_interval_secs: 3,
            timeout_secs: 30,
            transient_retries: 3,
            transient_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageLimits {
    pub requests_per_minute: u64,
    pub tokens_per_minute: u64,
    pub requests_per_day: u64,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: 15,
            tokens_per_minute: 1_000_000,
            requests_per_day: 1500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySettings {
    pub model: String,
    pub api_key_env: String,
    pub api_key_file: Option<Utf8PathBuf>,
    pub limits: UsageLimits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    pub path: Option<Utf8PathBuf>,
    pub startup_wait_secs: u64,
    pub capture_wait_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub species: String,
    pub ncbi_email: Option<String>,
    pub ncbi_tool: String,
    pub resolver: ResolverSettings,
    pub http: HttpSettings,
    pub summary: SummarySettings,
    pub output_dir: Utf8PathBuf,
    pub output_file_name: String,
    pub pdf: bool,
    pub ledger_path: Utf8PathBuf,
    pub browser: BrowserSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `kira-pr.json` (or the given path). Without an explicit path a missing file means
    /// defaults; an explicit path that cannot be read is an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let species = config
            .species
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| "Homo sapiens".to_string());
        if species.is_empty() {
            return Err(KiraError::EmptySpecies);
        }

        let resolver_defaults = ResolverSettings::default();
        let resolver = ResolverSettings {
            chunk_size: config
                .resolver
                .chunk_size
                .filter(|size| *size > 0)
                .unwrap_or(resolver_defaults.chunk_size),
            poll_attempts: config
                .resolver
                .poll_attempts
                .unwrap_or(resolver_defaults.poll_attempts),
            poll_interval_secs: config
                .resolver
                .poll_interval_secs
                .unwrap_or(resolver_defaults.poll_interval_secs),
            attempts: config
                .resolver
                .attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(resolver_defaults.attempts),
            cluster_hint_search: config
                .resolver
                .cluster_hint_search
                .unwrap_or(resolver_defaults.cluster_hint_search),
        };

        let http_defaults = HttpSettings::default();
        let http = HttpSettings {
            max_retries: config.http.max_retries.unwrap_or(http_defaults.max_retries),
            retry_interval_secs: config
                .http
                .retry_interval_secs
                .unwrap_or(http_defaults.retry_interval_secs),
            timeout_secs: config
                .http
                .timeout_secs
                .unwrap_or(http_defaults.timeout_secs),
            transient_retries: config
                .http
                .transient_retries
                .unwrap_or(http_defaults.transient_retries),
            transient_delay_ms: config
                .http
                .transient_delay_ms
                .unwrap_or(http_defaults.transient_delay_ms),
        };

        let limit_defaults = UsageLimits::default();
        let summary = SummarySettings {
            model: config
                .summary
                .model
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            api_key_env: config
                .summary
                .api_key_env
                .unwrap_or_else(|| "GEMINI_API_KEY".to_string()),
            api_key_file: config.summary.api_key_file.map(Utf8PathBuf::from),
            limits: UsageLimits {
                requests_per_minute: config
                    .summary
                    .requests_per_minute
                    .unwrap_or(limit_defaults.requests_per_minute),
                tokens_per_minute: config
                    .summary
                    .tokens_per_minute
                    .unwrap_or(limit_defaults.tokens_per_minute),
                requests_per_day: config
                    .summary
                    .requests_per_day
                    .unwrap_or(limit_defaults.requests_per_day),
            },
        };

        let ledger_path = match config.usage.ledger_path {
            Some(path) => Utf8PathBuf::from(path),
            None => default_ledger_path()?,
        };

        let browser = BrowserSettings {
            path: config.browser.path.map(Utf8PathBuf::from),
            startup_wait_secs: config.browser.startup_wait_secs.unwrap_or(5),
            capture_wait_secs: config.browser.capture_wait_secs.unwrap_or(6),
        };

        Ok(ResolvedConfig {
            schema_version,
            species,
            ncbi_email: config.ncbi.email,
            ncbi_tool: config
                .ncbi
                .tool
                .unwrap_or_else(|| "kira-protein-report".to_string()),
            resolver,
            http,
            summary,
            output_dir: Utf8PathBuf::from(config.output.dir.unwrap_or_else(|| "report".to_string())),
            output_file_name: config
                .output
                .file_name
                .unwrap_or_else(|| "Protein report".to_string()),
            pdf: config.output.pdf.unwrap_or(true),
            ledger_path,
            browser,
        })
    }
}

fn default_ledger_path() -> Result<Utf8PathBuf, KiraError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("kira-protein-report")
                    .join("usage.json"),
            )
            .ok()
        })
        .ok_or_else(|| KiraError::Filesystem("unable to resolve cache directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let mut config = Config::default();
        config.usage.ledger_path = Some("/tmp/usage.json".to_string());

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.species, "Homo sapiens");
        assert_eq!(resolved.resolver.chunk_size, 70);
        assert_eq!(resolved.http.max_retries, 10);
        assert_eq!(resolved.http.transient_retries, 3);
        assert_eq!(resolved.http.transient_delay_ms, 200);
        assert_eq!(resolved.summary.limits.requests_per_day, 1500);
        assert_eq!(resolved.ledger_path.as_str(), "/tmp/usage.json");
    }
}
