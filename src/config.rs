use crate::{
    compose::ComposeLimits,
    storage::{KvStore, CONFIG_KEY},
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub dlsite_cookie: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub compose: ComposeLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_url: String::new(),
            dlsite_cookie: String::new(),
            log_level: default_log_level(),
            compose: ComposeLimits::default(),
        }
    }
}

impl AppConfig {
    pub fn load_or_create(store: &dyn KvStore) -> Result<Self> {
        if let Some(raw) = store.load(CONFIG_KEY)? {
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save(store)?;
        Ok(config)
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        store.save(CONFIG_KEY, &raw)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "bot-token" | "bot_token" => self.bot_token = value.to_string(),
            "chat-id" | "chat_id" => self.chat_id = value.to_string(),
            "api-url" | "api_url" => self.api_url = value.trim_end_matches('/').to_string(),
            "dlsite-cookie" | "dlsite_cookie" => self.dlsite_cookie = value.to_string(),
            "log-level" | "log_level" => {
                if value.parse::<log::LevelFilter>().is_err() {
                    bail!("Unknown log level: {value}");
                }
                self.log_level = value.to_ascii_lowercase();
            }
            "budget" => self.compose.budget = parse_limit(key, value)?,
            "head-chars" | "head_chars" => self.compose.head_chars = parse_limit(key, value)?,
            "head-lines" | "head_lines" => self.compose.head_lines = parse_limit(key, value)?,
            _ => bail!("Unknown config key: {key}"),
        }
        Ok(())
    }

    pub fn has_messenger(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    pub fn redacted(&self) -> AppConfig {
        let mut config = self.clone();
        if !config.bot_token.is_empty() {
            let visible: String = config.bot_token.chars().take(4).collect();
            config.bot_token = format!("{visible}***");
        }
        config
    }
}

fn parse_limit(key: &str, value: &str) -> Result<usize> {
    let parsed: usize = value
        .parse()
        .with_context(|| format!("{key} must be a positive number"))?;
    if parsed == 0 {
        bail!("{key} must be a positive number");
    }
    Ok(parsed)
}

fn default_log_level() -> String {
    "info".to_string()
}
