//! Runtime configuration: clap arguments with environment fallbacks, plus the opt-in env file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use synaptic_core::{AnalysisStore, CompletionBackend, Variant};
use synaptic_local::fetch::FetchPolicy;
use synaptic_local::fs_store::FsStore;
use synaptic_local::gemini::GeminiClient;
use synaptic_local::openai_compat::OpenAiCompatClient;
use synaptic_local::pipeline::PipelineConfig;
use synaptic_local::prompt::DEFAULT_MAX_PROMPT_CHARS;
use synaptic_local::rest_store::{RestStore, RestStoreConfig};

pub const ENV_FILE_VAR: &str = "SYNAPTIC_ENV_FILE";

/// Load `KEY=VALUE` lines from `path` into the process env.
///
/// Variables already set in the process env win. Blank lines and `#` comments are skipped.
/// Returns how many variables were set. Values are never logged.
pub fn load_env_file(path: &Path) -> std::io::Result<usize> {
    let txt = std::fs::read_to_string(path)?;
    let mut n = 0usize;
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
            n += 1;
        }
    }
    Ok(n)
}

/// Apply `SYNAPTIC_ENV_FILE` if set. Unreadable files are ignored.
pub fn load_env_file_from_env() -> Option<(PathBuf, usize)> {
    let p = std::env::var(ENV_FILE_VAR).ok()?;
    let p = PathBuf::from(p.trim());
    if p.as_os_str().is_empty() {
        return None;
    }
    let n = load_env_file(&p).ok()?;
    Some((p, n))
}

pub(crate) fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    #[value(name = "openai_compat", alias = "openai-compat")]
    OpenaiCompat,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenaiCompat => "openai_compat",
        }
    }

    /// Whether the credentials this provider needs are present (booleans only, never values).
    pub fn configured(self) -> bool {
        match self {
            Provider::Gemini => has_env("GEMINI_API_KEY") || has_env("SYNAPTIC_GEMINI_API_KEY"),
            Provider::OpenaiCompat => {
                // `--model` falls back to SYNAPTIC_MODEL, which satisfies the model requirement.
                has_env("SYNAPTIC_OPENAI_COMPAT_BASE_URL")
                    && (has_env("SYNAPTIC_OPENAI_COMPAT_MODEL") || has_env("SYNAPTIC_MODEL"))
            }
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Prompt variant: classic (four string lists) or ranked (six ranked lists + structured data).
    #[arg(long, env = "SYNAPTIC_VARIANT", default_value = "ranked")]
    pub variant: Variant,
    /// Completion provider.
    #[arg(long, env = "SYNAPTIC_PROVIDER", value_enum, default_value = "gemini")]
    pub provider: Provider,
    /// Model override (provider default when unset).
    #[arg(long, env = "SYNAPTIC_MODEL")]
    pub model: Option<String>,
    /// Per-attempt fetch timeout (ms).
    #[arg(long, env = "SYNAPTIC_FETCH_TIMEOUT_MS", default_value_t = 12_000)]
    pub fetch_timeout_ms: u64,
    /// Fetch retries after the first attempt.
    #[arg(long, env = "SYNAPTIC_FETCH_RETRIES", default_value_t = 2)]
    pub fetch_retries: u32,
    /// Pause between fetch attempts (ms).
    #[arg(long, env = "SYNAPTIC_RETRY_DELAY_MS", default_value_t = 0)]
    pub retry_delay_ms: u64,
    /// Upper bound on page text sent to the model (chars).
    #[arg(long, env = "SYNAPTIC_MAX_PROMPT_CHARS", default_value_t = DEFAULT_MAX_PROMPT_CHARS)]
    pub max_prompt_chars: usize,
}

impl AnalysisArgs {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            variant: self.variant,
            fetch: FetchPolicy {
                timeout_ms: self.fetch_timeout_ms.max(1),
                max_retries: self.fetch_retries,
                retry_delay_ms: self.retry_delay_ms,
                ..FetchPolicy::default()
            },
            max_prompt_chars: self.max_prompt_chars.max(1),
            ..PipelineConfig::default()
        }
    }

    /// The configured completion backend, or `NotConfigured` when its credentials are missing.
    pub fn completion_backend(&self) -> synaptic_core::Result<Arc<dyn CompletionBackend>> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| synaptic_core::Error::NotConfigured(format!("http client: {e}")))?;
        let backend: Arc<dyn CompletionBackend> = match self.provider {
            Provider::Gemini => Arc::new(GeminiClient::from_env(client, self.model.clone())?),
            Provider::OpenaiCompat => {
                Arc::new(OpenAiCompatClient::from_env(client, self.model.clone())?)
            }
        };
        Ok(backend)
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory for local history/bookmarks (default: platform data dir + /synaptic).
    #[arg(long, env = "SYNAPTIC_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("synaptic")
}

pub fn rest_store_configured() -> bool {
    has_env("SYNAPTIC_REST_URL") && has_env("SYNAPTIC_REST_API_KEY") && has_env("SYNAPTIC_REST_USER_ID")
}

impl StoreArgs {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn local_store(&self) -> FsStore {
        FsStore::new(self.data_dir())
    }

    /// Remote store when `SYNAPTIC_REST_*` is configured, otherwise the local data dir.
    pub fn open(&self) -> Arc<dyn AnalysisStore> {
        if rest_store_configured() {
            if let Ok(cfg) = RestStoreConfig::from_env() {
                return Arc::new(RestStore::new(reqwest::Client::new(), cfg));
            }
        }
        Arc::new(self.local_store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct T {
        #[command(flatten)]
        a: AnalysisArgs,
    }

    #[test]
    fn env_file_never_overrides_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("env");
        std::fs::write(
            &p,
            "# comment\nSYNAPTIC_TEST_ENVFILE_A=from_file\nexport SYNAPTIC_TEST_ENVFILE_B=\"quoted\"\nnot a pair\n",
        )
        .unwrap();
        std::env::set_var("SYNAPTIC_TEST_ENVFILE_A", "from_process");
        let n = load_env_file(&p).unwrap();
        assert_eq!(n, 1);
        assert_eq!(std::env::var("SYNAPTIC_TEST_ENVFILE_A").unwrap(), "from_process");
        assert_eq!(std::env::var("SYNAPTIC_TEST_ENVFILE_B").unwrap(), "quoted");
    }

    #[test]
    fn analysis_args_map_onto_pipeline_config() {
        let t = T::parse_from([
            "t",
            "--variant",
            "classic",
            "--provider",
            "openai_compat",
            "--fetch-retries",
            "0",
            "--fetch-timeout-ms",
            "500",
        ]);
        assert_eq!(t.a.provider, Provider::OpenaiCompat);
        let cfg = t.a.pipeline_config();
        assert_eq!(cfg.variant, Variant::Classic);
        assert_eq!(cfg.fetch.max_retries, 0);
        assert_eq!(cfg.fetch.timeout_ms, 500);
        assert_eq!(cfg.min_text_chars, 100);
    }
}
