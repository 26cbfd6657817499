use serde::Deserialize;
use std::fs;
use std::path::Path;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub deepseek: DeepSeekConfig,
    pub ark: ArkConfig,
    pub baidu: BaiduConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Default for DeepSeekConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            base_url: "https://api.deepseek.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArkConfig {
    pub api_key: String,
    pub model: String,
    /// Lighter model used for web-search grounding.
    pub search_model: String,
    pub base_url: String,
}

impl Default for ArkConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "doubao-seed-1-6-251015".to_string(),
            search_model: "doubao-seed-1-6-flash-250828".to_string(),
            base_url: "https://ark.cn-beijing.volces.com/api/v3".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BaiduConfig {
    pub baike_api_key: String,
    pub baike_url: String,
    pub deepsearch_api_key: String,
    pub deepsearch_url: String,
}

impl Default for BaiduConfig {
    fn default() -> Self {
        Self {
            baike_api_key: String::new(),
            baike_url: "https://appbuilder.baidu.com/v2/baike/lemma/get_content".to_string(),
            deepsearch_api_key: String::new(),
            deepsearch_url: "https://qianfan.baidubce.com/v2/ai_search/chat/completions".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            static_dir: "static".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 0 disables caching.
    pub ttl_secs: u64,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_entries: 256,
        }
    }
}

impl Config {
    pub fn ark_enabled(&self) -> bool {
        !self.ark.api_key.is_empty()
    }

    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DEEPSEEK_API_KEY") { self.deepseek.api_key = v; }
        if let Some(v) = get("DEEPSEEK_MODEL") { self.deepseek.model = v; }
        if let Some(v) = get("DEEPSEEK_BASE_URL") { self.deepseek.base_url = v; }
        if let Some(v) = get("ARK_API_KEY") { self.ark.api_key = v; }
        if let Some(v) = get("ARK_MODEL_ID") { self.ark.model = v; }
        if let Some(v) = get("BAIDU_BAIKE_API_KEY") { self.baidu.baike_api_key = v; }
        if let Some(v) = get("BAIDU_DEEPSEARCH_API_KEY") { self.baidu.deepsearch_api_key = v; }
        if let Some(v) = get("STATIC_DIR") { self.server.static_dir = v; }

        if let Some(v) = get("SERVER_PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => log::warn!("Ignoring invalid SERVER_PORT: {}", v),
            }
        }
        if let Some(v) = get("CACHE_TTL_SECS") {
            match v.parse() {
                Ok(ttl) => self.cache.ttl_secs = ttl,
                Err(_) => log::warn!("Ignoring invalid CACHE_TTL_SECS: {}", v),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.deepseek.api_key.is_empty() {
            anyhow::bail!("DeepSeek API key is required (set DEEPSEEK_API_KEY or [deepseek].api_key)");
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

/// Load `.env`, then the optional TOML file, then environment overrides.
pub fn load_config(path: &str) -> Result<Config> {
    if let Err(e) = dotenv::dotenv() {
        log::debug!("No .env file loaded: {}", e);
    }

    let mut config = if Path::new(path).exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        parse_config(&content).with_context(|| format!("Invalid config file {}", path))?
    } else {
        log::info!("Config file {} not found, using defaults", path);
        Config::default()
    };

    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_partial_file_with_defaults() {
        let config = parse_config(
            r#"
[deepseek]
api_key = "sk-test"

[cache]
ttl_secs = 30
"#,
        )
        .unwrap();

        assert_eq!(config.deepseek.api_key, "sk-test");
        assert_eq!(config.deepseek.model, "deepseek-chat");
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.cache.max_entries, 256);
        assert_eq!(config.server.port, 8080);
        assert!(!config.ark_enabled());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = parse_config("[server]\nport = 9000\n").unwrap();
        let env: HashMap<&str, &str> = [
            ("DEEPSEEK_API_KEY", "sk-env"),
            ("ARK_API_KEY", "ark-env"),
            ("SERVER_PORT", "9100"),
            ("CACHE_TTL_SECS", "not-a-number"),
            ("DEEPSEEK_MODEL", "  "),
        ]
        .into_iter()
        .collect();

        config.apply_env_with(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.deepseek.api_key, "sk-env");
        assert_eq!(config.deepseek.model, "deepseek-chat");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.cache.ttl_secs, 600);
        assert!(config.ark_enabled());
    }

    #[test]
    fn validate_requires_deepseek_key() {
        let mut config = Config::default();
        assert!(config.validate().is_err());
        config.deepseek.api_key = "sk".into();
        assert!(config.validate().is_ok());
    }
}
