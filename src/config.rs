//! YAML settings
//!
//! Every field has a default, so an absent file or a partial one is fine.
//!
//! ```yaml
//! completion:
//!   base_url: https://api.openai.com/v1
//!   model: gpt-4o-mini
//!   api_key_env: OPENAI_API_KEY
//!   stream: true
//! chunking:
//!   max_chars: 50000
//!   max_chapters: 20
//! write_notes: true
//! prompts:
//!   custom_type_prompts:
//!     mystery: Track every clue and whether it is fair to the reader.
//! ```

use crate::analysis::{AnalysisConfig, AnalysisMode, ChunkLimits, Stage, DEFAULT_MAX_CHAPTERS, DEFAULT_MAX_CHARS};
use crate::llm::HttpClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "novel-analyzer";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 300,
            stream: false,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_chars: usize,
    pub max_chapters: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            max_chapters: DEFAULT_MAX_CHAPTERS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Replacement instructions keyed by stage id
    pub custom_prompts: HashMap<Stage, String>,
    /// Extra guidance keyed by novel type
    pub custom_type_prompts: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub completion: CompletionSettings,
    pub chunking: ChunkingSettings,
    /// Where checkpoints, records and notes live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub write_notes: bool,
    pub prompts: PromptSettings,
}

impl Settings {
    /// `~/.config/novel-analyzer/config.yaml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.yaml"))
    }

    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = if text.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, path)
    }

    /// Load `path` when given (it must exist), else the default path when it
    /// exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::load(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::Invalid("completion.model is empty".to_string()));
        }
        if self.chunking.max_chars == 0 || self.chunking.max_chapters == 0 {
            return Err(ConfigError::Invalid(
                "chunking limits must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"))
                .join(APP_DIR)
        })
    }

    pub fn chunk_limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_chars: self.chunking.max_chars,
            max_chapters: self.chunking.max_chapters,
        }
    }

    /// HTTP client settings, reading the API key from the environment
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            base_url: self.completion.base_url.clone(),
            api_key: std::env::var(&self.completion.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_secs(self.completion.timeout_secs),
            stream: self.completion.stream,
            temperature: self.completion.temperature,
        }
    }

    /// Analysis config for one run, carrying the prompt overrides
    pub fn analysis_config(&self, mode: AnalysisMode, novel_type: &str) -> AnalysisConfig {
        AnalysisConfig {
            custom_prompts: self.prompts.custom_prompts.clone(),
            custom_type_prompts: self.prompts.custom_type_prompts.clone(),
            ..AnalysisConfig::new(mode, novel_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_yaml("", Path::new("c.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.chunk_limits(), ChunkLimits::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let yaml = "completion:\n  model: local-llama\n  stream: true\nchunking:\n  max_chapters: 5\n";
        let settings = Settings::from_yaml(yaml, Path::new("c.yaml")).unwrap();
        assert_eq!(settings.completion.model, "local-llama");
        assert!(settings.completion.stream);
        assert_eq!(settings.completion.base_url, "https://api.openai.com/v1");
        assert_eq!(settings.chunking.max_chapters, 5);
        assert_eq!(settings.chunking.max_chars, DEFAULT_MAX_CHARS);
    }

    #[test]
    fn prompts_flow_into_analysis_config() {
        let yaml = "prompts:\n  custom_prompts:\n    synopsis: One line only.\n  custom_type_prompts:\n    mystery: Track clues.\n";
        let settings = Settings::from_yaml(yaml, Path::new("c.yaml")).unwrap();
        let config = settings.analysis_config(AnalysisMode::Deep, "mystery");
        assert_eq!(config.mode, AnalysisMode::Deep);
        assert_eq!(
            config.custom_prompts.get(&Stage::Synopsis).map(String::as_str),
            Some("One line only.")
        );
        assert!(config.custom_type_prompts.contains_key("mystery"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Settings::from_yaml("chunking:\n  max_chars: 0\n", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Settings::from_yaml("completion: [1, 2]", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn load_reads_file_and_reports_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "write_notes: true").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert!(settings.write_notes);

        let missing = Settings::load_or_default(Some(Path::new("/nonexistent/novel.yaml")));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn explicit_data_dir_wins() {
        let settings = Settings {
            data_dir: Some(PathBuf::from("/tmp/novels")),
            ..Default::default()
        };
        assert_eq!(settings.data_dir(), PathBuf::from("/tmp/novels"));
    }
}
