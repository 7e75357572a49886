//! Configuração do aimaster carregada a partir de `aimaster.toml`.
//!
//! A struct [`AppConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `AIMASTERING_API_KEY` tem precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{API_URL, DEFAULT_MODE, MasteringClient};
use crate::state_machine::ProgressPolicy;
use crate::tracker::TrackerConfig;

pub const CONFIG_FILE: &str = "aimaster.toml";
pub const API_KEY_ENV: &str = "AIMASTERING_API_KEY";

/// Configuração de nível superior carregada de `aimaster.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Credencial bearer da API de masterização.
    #[serde(default)]
    pub api_key: String,

    /// URL base da API remota.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Modo de masterização enviado na criação de cada job.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Intervalo entre consultas de status, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Falhas consecutivas de consulta toleradas antes de parar o polling.
    #[serde(default)]
    pub max_poll_retries: u32,

    /// Tratamento de regressões de progresso: "verbatim" ou "monotonic".
    #[serde(default)]
    pub progress_policy: ProgressPolicy,

    /// Timeout total de cada requisição, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout de conexão, em segundos.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

// Valor padrão para a URL base: o serviço público.
fn default_base_url() -> String {
    API_URL.to_string()
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

// Valor padrão para o intervalo de polling: 5 segundos.
fn default_poll_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            mode: default_mode(),
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_retries: 0,
            progress_policy: ProgressPolicy::default(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Carrega a configuração de `aimaster.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<AppConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para a chave API.
        Ok(config.with_env_key(std::env::var(API_KEY_ENV).ok()))
    }

    fn with_env_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key
            && !key.is_empty()
        {
            self.api_key = key;
        }
        self
    }

    /// Chave configurada ou, na falta dela, uma chave de convidado descartável.
    pub fn api_key_or_guest(&self) -> String {
        if self.api_key.is_empty() {
            format!("guest_{}", Uuid::new_v4().simple())
        } else {
            self.api_key.clone()
        }
    }

    /// Parâmetros do rastreador derivados desta configuração.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::default()
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_max_poll_retries(self.max_poll_retries)
            .with_progress_policy(self.progress_policy)
    }

    /// Constrói o cliente HTTP com credencial, URL, timeouts e modo configurados.
    pub fn client(&self) -> Result<MasteringClient> {
        let client = MasteringClient::with_timeouts(
            self.api_key_or_guest(),
            &self.base_url,
            Duration::from_secs(self.connect_timeout_secs),
            Duration::from_secs(self.request_timeout_secs),
        )?;
        Ok(client.with_mode(self.mode.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.base_url, "https://api.aimastering.com");
        assert_eq!(config.mode, "default");
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.max_poll_retries, 0);
        assert_eq!(config.progress_policy, ProgressPolicy::Verbatim);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_key = "sk-test-123"
            poll_interval_secs = 2
            progress_policy = "monotonic"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "sk-test-123");
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.progress_policy, ProgressPolicy::Monotonic);
        assert_eq!(config.mode, "default");
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "base_url = \"http://localhost:9000\"\nmax_poll_retries = 2\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.max_poll_retries, 2);
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn env_key_overrides_file_unless_empty() {
        let config = AppConfig {
            api_key: "from-file".into(),
            ..Default::default()
        };
        assert_eq!(config.clone().with_env_key(Some("from-env".into())).api_key, "from-env");
        assert_eq!(config.clone().with_env_key(Some(String::new())).api_key, "from-file");
        assert_eq!(config.with_env_key(None).api_key, "from-file");
    }

    #[test]
    fn guest_key_when_unconfigured() {
        let config = AppConfig::default();
        let key = config.api_key_or_guest();
        assert!(key.starts_with("guest_"));
        assert_ne!(key, config.api_key_or_guest());
    }

    #[test]
    fn tracker_config_mirrors_settings() {
        let config = AppConfig {
            poll_interval_secs: 2,
            max_poll_retries: 3,
            ..Default::default()
        };
        let tracker = config.tracker_config();
        assert_eq!(tracker.poll_interval, Duration::from_secs(2));
        assert_eq!(tracker.max_poll_retries, 3);
    }
}
