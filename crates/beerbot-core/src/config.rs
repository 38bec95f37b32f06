//! Layered configuration and path helpers.
//!
//! Uses Figment to merge serialized defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (`__` separates nesting, e.g.
//! `APP_STORE__URL`) into [`Settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::HighlightStyle;

/// Index names the bot's commands search against.
pub const BEER_INDEX: &str = "fts_idx_beers";
pub const BREWERY_INDEX: &str = "fts_idx_breweries";
pub const BREWERY_LOCATION_INDEX: &str = "fts_idx_brewery_by_location";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl Environment {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "dev" | "development" => Ok(Self::Development),
            "prod" | "production" => Ok(Self::Production),
            "test" | "testing" => Ok(Self::Testing),
            other => Err(Error::InvalidConfig(format!(
                "unknown environment '{other}', expected one of: development, production, testing"
            ))),
        }
    }

    /// Environment named by `RUST_ENV`, defaulting to development.
    pub fn from_env() -> Result<Self> {
        Self::parse(&env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()))
    }

    fn file_name(self) -> &'static str {
        match self {
            Self::Development => "config.dev.toml",
            Self::Production => "config.prod.toml",
            Self::Testing => "config.test.toml",
        }
    }
}

/// A named full-text index over the bucket: the searchable fields and the
/// document `type` it is restricted to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: String,
    #[serde(default)]
    pub doc_type: Option<String>,
    pub fields: Vec<String>,
}

impl IndexDefinition {
    pub fn new(name: &str, doc_type: Option<&str>, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            doc_type: doc_type.map(str::to_string),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

fn default_indexes() -> Vec<IndexDefinition> {
    vec![
        IndexDefinition::new(BEER_INDEX, Some("beer"), &["name", "description", "style", "category"]),
        IndexDefinition::new(BREWERY_INDEX, Some("brewery"), &["name", "description"]),
        IndexDefinition::new(BREWERY_LOCATION_INDEX, Some("brewery"), &["city", "state", "country"]),
    ]
}

/// Connection settings for the document store.
///
/// `url` names the root directory holding buckets (`file://` prefix
/// optional); the bucket is the namespace opened under it. `password` is
/// carried for stores that authenticate; the embedded store does not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub bucket: String,
    pub password: Option<String>,
    pub create_if_missing: bool,
    pub timeout_ms: Option<u64>,
    pub writer_heap_bytes: usize,
    pub indexes: Vec<IndexDefinition>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "file://./data".to_string(),
            bucket: "beer-sample".to_string(),
            password: None,
            create_if_missing: false,
            timeout_ms: None,
            writer_heap_bytes: 50_000_000,
            indexes: default_indexes(),
        }
    }
}

impl StoreConfig {
    /// Root directory named by `url`, with `~` and `$VAR` expanded.
    pub fn root_dir(&self) -> PathBuf {
        expand_path(&self.url)
    }

    pub fn bucket_dir(&self) -> PathBuf {
        self.root_dir().join(&self.bucket)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub highlight_style: HighlightStyle,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 10, highlight_style: HighlightStyle::Html }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlackConfig {
    pub api_token: Option<String>,
    pub channel: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self { api_token: None, channel: None, api_base: "https://slack.com/api".to_string(), timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub store: StoreConfig,
    pub search: SearchConfig,
    pub slack: SlackConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    pub fn validate_for_env(&self, env: Environment) -> Result<()> {
        if self.store.url.trim().is_empty() {
            return Err(Error::InvalidConfig("store.url must not be empty".to_string()));
        }
        if self.store.bucket.trim().is_empty() {
            return Err(Error::InvalidConfig("store.bucket must not be empty".to_string()));
        }
        if self.store.indexes.is_empty() {
            return Err(Error::InvalidConfig("store.indexes must define at least one index".to_string()));
        }
        let mut seen = HashSet::new();
        for index in &self.store.indexes {
            if !seen.insert(index.name.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate index '{}'", index.name)));
            }
            if index.fields.is_empty() {
                return Err(Error::InvalidConfig(format!("index '{}' has no fields", index.name)));
            }
        }
        if self.search.default_limit == 0 {
            return Err(Error::InvalidConfig("search.default_limit must be > 0".to_string()));
        }
        match env {
            Environment::Development | Environment::Testing => {}
            Environment::Production => {
                if self.slack.api_token.is_none() || self.slack.channel.is_none() {
                    return Err(Error::InvalidConfig(
                        "production requires slack.api_token and slack.channel".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
    env: Environment,
}

impl Config {
    /// Load `config.toml` + `config.<env>.toml` + `APP_*` env vars for the
    /// environment named by `RUST_ENV`.
    pub fn load() -> Result<Self> {
        Self::load_for_env(Environment::from_env()?)
    }

    pub fn load_for_env(env: Environment) -> Result<Self> {
        Self::load_from_dir(Path::new("."), env)
    }

    pub fn load_from_dir(dir: &Path, env: Environment) -> Result<Self> {
        Self::load_with_overrides(dir, env, &[])
    }

    /// Like [`Config::load_from_dir`], with `(key, value)` overrides (dotted
    /// keys, e.g. `slack.api_token`) layered on top before validation.
    pub fn load_with_overrides(dir: &Path, env: Environment, overrides: &[(&str, String)]) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")))
            .merge(Toml::file(dir.join(env.file_name())))
            .merge(Env::prefixed("APP_").split("__"));
        for (key, value) in overrides {
            figment = figment.merge(Serialized::default(key, value.clone()));
        }
        Self::from_figment(figment, env)
    }

    pub fn from_toml_str(toml: &str, env: Environment) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        Self::from_figment(figment, env)
    }

    fn from_figment(figment: Figment, env: Environment) -> Result<Self> {
        let config = Self { figment, env };
        config.settings()?.validate_for_env(env)?;
        Ok(config)
    }

    pub fn env(&self) -> Environment {
        self.env
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Layer an override on top of everything loaded so far.
    pub fn set<V: Serialize>(self, key: &str, value: V) -> Result<Self> {
        let figment = self.figment.merge(Serialized::default(key, value));
        Self::from_figment(figment, self.env)
    }
}

/// Turn a store url or config path into a local path: an optional
/// `file://` scheme is dropped, then `$VAR`/`${VAR}` and a leading `~` are
/// expanded. Unknown variables are left as written.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    let raw = raw.strip_prefix("file://").unwrap_or(raw);
    let with_vars = shellexpand::env(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    PathBuf::from(shellexpand::tilde(&with_vars).as_ref())
}
