//! Locally stored provider configurations.
//!
//! Providers live in `providers.toml` next to `config.toml`:
//!
//! ```toml
//! active_provider = "0d7c…"
//!
//! [[providers]]
//! id = "0d7c…"
//! family = "anthropic"
//! source = "official"
//! label = "Work Claude"
//! api_key = "sk-ant-…"
//! model = "claude-3-5-sonnet-20241022"
//! ```
//!
//! Older files stored a single `provider` field naming the vendor or
//! aggregator instead of `family` + `source`. Those records are migrated on
//! load; records that cannot be understood either way are dropped with a
//! warning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::config::{config_dir, write_atomically};
use crate::core::registry::{find_family, SourceKind};

pub const PROVIDERS_FILE: &str = "providers.toml";

const LEGACY_LLAMA_HOSTS: &[&str] = &["together", "fireworks", "cerebras", "sambanova"];

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub family: String,
    pub source: SourceKind,
    #[serde(default)]
    pub label: String,
    #[serde(alias = "apiKey")]
    pub api_key: String,
    /// Canonical model id; one of the family's variants.
    pub model: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("source", &self.source)
            .field("label", &self.label)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Input for [`ProviderStore::add`]; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewProvider {
    pub family: String,
    pub source: SourceKind,
    pub label: Option<String>,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderStoreError {
    #[error("failed to read providers at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse providers at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write providers at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize providers: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown model family '{0}'")]
    UnknownFamily(String),

    #[error("'{model}' is not a {family} model")]
    UnknownModel { family: String, model: String },

    #[error("{family} cannot be reached through {kind} yet")]
    SourceUnavailable { family: String, kind: SourceKind },

    #[error("no provider with id '{0}'")]
    UnknownProvider(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProvidersFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_provider: Option<String>,
    #[serde(default)]
    providers: Vec<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct LegacyProvider {
    #[serde(default)]
    id: Option<String>,
    provider: String,
    #[serde(default)]
    label: String,
    #[serde(alias = "apiKey", default)]
    api_key: String,
    #[serde(default)]
    model: String,
}

impl LegacyProvider {
    fn migrate(self) -> ProviderConfig {
        let (family, source) = if self.provider == "openrouter" {
            (family_from_aggregator_model(&self.model), SourceKind::OpenRouter)
        } else if LEGACY_LLAMA_HOSTS.contains(&self.provider.as_str()) {
            ("llama", SourceKind::Official)
        } else if let Some(family) = find_family(&self.provider) {
            (family.id.as_str(), SourceKind::Official)
        } else {
            ("openai", SourceKind::Official)
        };

        ProviderConfig {
            id: self.id.unwrap_or_else(new_provider_id),
            family: family.to_string(),
            source,
            label: self.label,
            api_key: self.api_key,
            model: self.model,
        }
    }
}

fn family_from_aggregator_model(model: &str) -> &'static str {
    if model.contains("deepseek") {
        "deepseek"
    } else if model.contains("anthropic") {
        "anthropic"
    } else if model.contains("gemini") || model.contains("google") {
        "gemini"
    } else if model.contains("mistral") {
        "mistral"
    } else if model.contains("llama") {
        "llama"
    } else if model.contains("qwen") {
        "qwen"
    } else {
        "openai"
    }
}

fn new_provider_id() -> String {
    Uuid::new_v4().to_string()
}

fn parse_record(value: toml::Value) -> Option<ProviderConfig> {
    let has_family = value.get("family").is_some();
    if !has_family && value.get("provider").is_some() {
        return match value.try_into::<LegacyProvider>() {
            Ok(legacy) => {
                debug!("migrating legacy provider record '{}'", legacy.provider);
                Some(legacy.migrate())
            }
            Err(err) => {
                warn!("dropping unreadable legacy provider record: {err}");
                None
            }
        };
    }

    match value.try_into::<ProviderConfig>() {
        Ok(provider) => Some(provider),
        Err(err) => {
            warn!("dropping provider record without family/source: {err}");
            None
        }
    }
}

/// Checks a provider against the catalog before it is stored.
pub fn validate(
    family_id: &str,
    source: SourceKind,
    model: &str,
) -> Result<(), ProviderStoreError> {
    let family =
        find_family(family_id).ok_or_else(|| ProviderStoreError::UnknownFamily(family_id.into()))?;

    if family.variant(model).is_none() {
        return Err(ProviderStoreError::UnknownModel {
            family: family.id.clone(),
            model: model.to_string(),
        });
    }

    match family.source(source) {
        Some(config) if !config.coming_soon => Ok(()),
        _ => Err(ProviderStoreError::SourceUnavailable {
            family: family.id.clone(),
            kind: source,
        }),
    }
}

#[derive(Debug)]
pub struct ProviderStore {
    path: PathBuf,
    active_provider: Option<String>,
    providers: Vec<ProviderConfig>,
}

impl ProviderStore {
    pub fn default_path() -> PathBuf {
        config_dir().join(PROVIDERS_FILE)
    }

    pub fn load_default() -> Result<Self, ProviderStoreError> {
        Self::load(Self::default_path())
    }

    /// Loads the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ProviderStoreError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                active_provider: None,
                providers: Vec::new(),
            });
        }

        let contents = fs::read_to_string(&path).map_err(|source| ProviderStoreError::Read {
            path: path.clone(),
            source,
        })?;
        let file: ProvidersFile =
            toml::from_str(&contents).map_err(|source| ProviderStoreError::Parse {
                path: path.clone(),
                source,
            })?;

        let providers: Vec<ProviderConfig> =
            file.providers.into_iter().filter_map(parse_record).collect();
        let active_provider = file
            .active_provider
            .filter(|id| providers.iter().any(|p| &p.id == id));

        Ok(Self {
            path,
            active_provider,
            providers,
        })
    }

    pub fn save(&self) -> Result<(), ProviderStoreError> {
        let records = self
            .providers
            .iter()
            .map(toml::Value::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let file = ProvidersFile {
            active_provider: self.active_provider.clone(),
            providers: records,
        };
        let contents = toml::to_string_pretty(&file)?;
        write_atomically(&self.path, contents.as_bytes()).map_err(|source| {
            ProviderStoreError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_provider.as_deref()
    }

    pub fn active(&self) -> Option<&ProviderConfig> {
        self.active_provider.as_deref().and_then(|id| self.get(id))
    }

    pub fn set_active(&mut self, id: Option<&str>) -> Result<(), ProviderStoreError> {
        if let Some(id) = id {
            if self.get(id).is_none() {
                return Err(ProviderStoreError::UnknownProvider(id.to_string()));
            }
        }
        self.active_provider = id.map(str::to_owned);
        Ok(())
    }

    /// Validates and stores a new provider, making it the active one.
    pub fn add(&mut self, new: NewProvider) -> Result<&ProviderConfig, ProviderStoreError> {
        validate(&new.family, new.source, &new.model)?;

        let label = match new.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => default_label(&new.family, new.source),
        };
        let provider = ProviderConfig {
            id: new_provider_id(),
            family: new.family,
            source: new.source,
            label,
            api_key: new.api_key,
            model: new.model,
        };

        self.active_provider = Some(provider.id.clone());
        self.providers.push(provider);
        Ok(&self.providers[self.providers.len() - 1])
    }

    pub fn update(&mut self, provider: ProviderConfig) -> Result<(), ProviderStoreError> {
        validate(&provider.family, provider.source, &provider.model)?;
        let slot = self
            .providers
            .iter_mut()
            .find(|p| p.id == provider.id)
            .ok_or_else(|| ProviderStoreError::UnknownProvider(provider.id.clone()))?;
        *slot = provider;
        Ok(())
    }

    /// Removes a provider, clearing the active id if it pointed at it.
    pub fn remove(&mut self, id: &str) -> Option<ProviderConfig> {
        let index = self.providers.iter().position(|p| p.id == id)?;
        if self.active_provider.as_deref() == Some(id) {
            self.active_provider = None;
        }
        Some(self.providers.remove(index))
    }
}

fn default_label(family_id: &str, source: SourceKind) -> String {
    let family = find_family(family_id).map(|f| f.name.as_str()).unwrap_or(family_id);
    match source {
        SourceKind::Official => family.to_string(),
        SourceKind::OpenRouter => format!("{family} via OpenRouter"),
    }
}
