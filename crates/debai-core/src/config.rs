use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DebaiError, Result};

/// Top-level configuration for DebAI.
///
/// Loaded from `~/.debai/config.toml` by default. Every section falls back
/// to its defaults when missing, so a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebaiConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chat: ChatLimitsConfig,
}

impl DebaiConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DebaiConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DebaiError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.memory.max_turns == 0 {
            return Err(DebaiError::Config(
                "memory.max_turns must be at least 1".to_string(),
            ));
        }
        if self.memory.summary_threshold > self.memory.max_turns {
            return Err(DebaiError::Config(format!(
                "memory.summary_threshold ({}) exceeds memory.max_turns ({})",
                self.memory.summary_threshold, self.memory.max_turns
            )));
        }
        if !(0.0..=1.0).contains(&self.llm.min_confidence) {
            return Err(DebaiError::Config(format!(
                "llm.min_confidence must be within 0.0..=1.0, got {}",
                self.llm.min_confidence
            )));
        }
        if !matches!(self.llm.provider.as_str(), "keyword" | "openai") {
            return Err(DebaiError::Config(format!(
                "llm.provider must be \"keyword\" or \"openai\", got \"{}\"",
                self.llm.provider
            )));
        }
        if !matches!(self.email.transport.as_str(), "smtp" | "outbox") {
            return Err(DebaiError::Config(format!(
                "email.transport must be \"smtp\" or \"outbox\", got \"{}\"",
                self.email.transport
            )));
        }
        if self.email.sender_name.trim().is_empty() {
            return Err(DebaiError::Config(
                "email.sender_name must not be empty".to_string(),
            ));
        }
        if self.chat.max_message_length == 0 {
            return Err(DebaiError::Config(
                "chat.max_message_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.debai/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl GeneralConfig {
    /// The data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_mb: 25,
        }
    }
}

/// Text-completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "keyword" (offline, deterministic) or "openai" (any
    /// OpenAI-compatible chat-completions endpoint).
    pub provider: String,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Extra attempts after a failed or timed-out call.
    pub max_retries: u32,
    /// Tool choices below this confidence are treated as unclear.
    pub min_confidence: f32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "keyword".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "openai/gpt-oss-120b".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 1,
            min_confidence: 0.4,
            temperature: 0.0,
        }
    }
}

/// Outgoing email settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// "smtp" or "outbox" (write .eml files instead of sending).
    pub transport: String,
    pub sender_address: String,
    /// Name used in the From header and the signature block.
    pub sender_name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// SMTP login; defaults to the sender address when empty.
    pub username: String,
    /// Environment variable holding the SMTP password.
    pub password_env: String,
    pub outbox_dir: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: "outbox".to_string(),
            sender_address: "debai@localhost".to_string(),
            sender_name: "DebAI Assistant".to_string(),
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password_env: "EMAIL_APP_PASSWORD".to_string(),
            outbox_dir: "outbox".to_string(),
        }
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Turns kept per session before FIFO eviction.
    pub max_turns: usize,
    /// Log length at which the older half is summarized.
    pub summary_threshold: usize,
    /// Turns replayed to the completion service as context.
    pub context_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: 50,
            summary_threshold: 40,
            context_turns: 50,
        }
    }
}

/// Document output and upload locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub output_dir: String,
    pub upload_dir: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            output_dir: "generated_docs".to_string(),
            upload_dir: "uploads".to_string(),
        }
    }
}

/// Limits applied to inbound chat messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatLimitsConfig {
    pub max_message_length: usize,
}

impl Default for ChatLimitsConfig {
    fn default() -> Self {
        Self {
            max_message_length: 4000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = DebaiConfig::default();
        assert_eq!(config.general.data_dir, "~/.debai/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.max_upload_mb, 25);
        assert_eq!(config.llm.provider, "keyword");
        assert_eq!(config.llm.max_retries, 1);
        assert_eq!(config.email.transport, "outbox");
        assert_eq!(config.memory.max_turns, 50);
        assert_eq!(config.memory.summary_threshold, 40);
        assert_eq!(config.documents.output_dir, "generated_docs");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"

[server]
port = 9000

[llm]
provider = "openai"
model = "llama-3.1-8b-instant"
timeout_secs = 10

[email]
transport = "smtp"
sender_name = "Debashis"

[memory]
max_turns = 20
summary_threshold = 10
"#;
        let file = create_temp_config(content);
        let config = DebaiConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.llm.timeout_secs, 10);
        assert_eq!(config.email.sender_name, "Debashis");
        assert_eq!(config.email.smtp_port, 587);
        assert_eq!(config.memory.max_turns, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = DebaiConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.memory.max_turns, 50);
        assert_eq!(config.llm.min_confidence, 0.4);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = DebaiConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.debai/data");
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let file = create_temp_config("[memory\nmax_turns = ");
        assert!(matches!(
            DebaiConfig::load(file.path()),
            Err(DebaiError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = DebaiConfig::default();
        config.email.sender_name = "Sayandip".to_string();
        config.save(&path).unwrap();

        let reloaded = DebaiConfig::load(&path).unwrap();
        assert_eq!(reloaded.email.sender_name, "Sayandip");
        assert_eq!(reloaded.memory.max_turns, config.memory.max_turns);
    }

    // ---- validate ----

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = DebaiConfig::default();
        config.memory.max_turns = 0;
        config.memory.summary_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_threshold_above_capacity() {
        let mut config = DebaiConfig::default();
        config.memory.summary_threshold = 60;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("summary_threshold"));
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = DebaiConfig::default();
        config.llm.provider = "carrier-pigeon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_confidence_out_of_range() {
        let mut config = DebaiConfig::default();
        config.llm.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_transport() {
        let mut config = DebaiConfig::default();
        config.email.transport = "fax".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_sender_name() {
        let mut config = DebaiConfig::default();
        config.email.sender_name = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sender_name"));
    }

    // ---- paths ----

    #[test]
    fn test_expand_home_plain_path() {
        assert_eq!(expand_home("/var/lib/debai"), PathBuf::from("/var/lib/debai"));
    }

    #[test]
    fn test_expand_home_tilde() {
        let expanded = expand_home("~/.debai/data");
        assert!(expanded.ends_with(".debai/data"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
