use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::languages;

const DEFAULT_SOURCE_LANG: &str = "en";
const DEFAULT_TARGET_LANG: &str = "hi";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub source_lang: String,
    pub target_lang: String,
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    pub machine_translation: bool,
    pub contact_email: Option<String>,
    pub font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.mymemory.translated.net/get".into(),
            source_lang: DEFAULT_SOURCE_LANG.into(),
            target_lang: DEFAULT_TARGET_LANG.into(),
            debounce_ms: 500,
            request_timeout_secs: 10,
            machine_translation: true,
            contact_email: None,
            font_path: None,
        }
    }
}

impl Config {
    pub fn app_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".into());
            PathBuf::from(appdata).join("quick-translate")
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("quick-translate")
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let base = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
                    PathBuf::from(home).join(".config")
                });
            base.join("quick-translate")
        }
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let config = Self::from_toml(&contents)?;
            tracing::info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let dir = Self::app_dir();
            if let Err(e) = std::fs::create_dir_all(&dir) {
                tracing::warn!("Failed to create config directory: {}", e);
            } else if let Err(e) = std::fs::write(&path, DEFAULT_CONFIG) {
                tracing::warn!("Failed to write default config: {}", e);
            } else {
                tracing::info!("Created default config at {}", path.display());
            }
            Ok(Config::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.sanitize();
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(50))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn sanitize(&mut self) {
        if !languages::is_supported(&self.source_lang) {
            tracing::warn!(
                "Unsupported source_lang {:?}, using {}",
                self.source_lang,
                DEFAULT_SOURCE_LANG
            );
            self.source_lang = DEFAULT_SOURCE_LANG.into();
        }
        if !languages::is_supported(&self.target_lang) {
            tracing::warn!(
                "Unsupported target_lang {:?}, using {}",
                self.target_lang,
                DEFAULT_TARGET_LANG
            );
            self.target_lang = DEFAULT_TARGET_LANG.into();
        }
        if self.contact_email.as_deref().is_some_and(|e| e.trim().is_empty()) {
            self.contact_email = None;
        }
    }

    fn config_path() -> PathBuf {
        Self::app_dir().join("config.toml")
    }
}

const DEFAULT_CONFIG: &str = "\
# Quick Translate configuration

# MyMemory translation endpoint
# api_url = \"https://api.mymemory.translated.net/get\"

# Languages selected on startup (en, hi, es, fr, de, zh, ja, ko, ru, it, pt, ar, bn, pa, vi)
# source_lang = \"en\"
# target_lang = \"hi\"

# Quiet period after the last edit before a request is sent (minimum 50)
# debounce_ms = 500

# HTTP timeout in seconds
# request_timeout_secs = 10

# Allow machine translation results (mt=1)
# machine_translation = true

# Contact email sent to MyMemory for the larger free quota
# contact_email = \"\"

# Extra font used as a fallback for scripts the built-in fonts lack
# (e.g. a Devanagari or CJK .ttf)
# font_path = \"\"
";
