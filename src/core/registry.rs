//! Built-in model family catalog
//!
//! The catalog is embedded from `builtin_families.toml` at build time and
//! parsed once on first use. Lookups never mutate it, so every accessor hands
//! out `'static` references that are safe to share across tasks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// How a family's models are reached: straight from the vendor or via an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Official,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

/// The streaming protocol shape spoken by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    Cohere,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelVariant {
    /// Canonical model id, used as the key into a source's model map.
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub label: String,
    pub wire_format: WireFormat,
    pub endpoint: String,
    /// Canonical model id → id the source expects.
    #[serde(default)]
    pub model_map: HashMap<String, String>,
    #[serde(default)]
    pub coming_soon: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelFamily {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub popular: bool,
    pub description: String,
    pub variants: Vec<ModelVariant>,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize)]
struct BuiltinFamiliesConfig {
    families: Vec<ModelFamily>,
}

static FAMILIES: LazyLock<Vec<ModelFamily>> = LazyLock::new(load_builtin_families);

fn load_builtin_families() -> Vec<ModelFamily> {
    const CONFIG_CONTENT: &str = include_str!("builtin_families.toml");

    let config: BuiltinFamiliesConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_families.toml");

    config.families
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Official => "official",
            SourceKind::OpenRouter => "openrouter",
        }
    }

    /// Aggregators want the calling app to identify itself.
    pub fn is_aggregator(self) -> bool {
        self == SourceKind::OpenRouter
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "official" => Ok(SourceKind::Official),
            "openrouter" => Ok(SourceKind::OpenRouter),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

impl WireFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            WireFormat::OpenAi => "openai",
            WireFormat::Anthropic => "anthropic",
            WireFormat::Gemini => "gemini",
            WireFormat::Cohere => "cohere",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ModelFamily {
    pub fn source(&self, kind: SourceKind) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.kind == kind)
    }

    pub fn available_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| !s.coming_soon)
    }

    pub fn variant(&self, id: &str) -> Option<&ModelVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.description.to_lowercase().contains(query)
            || self.id.contains(query)
            || self
                .variants
                .iter()
                .any(|v| v.label.to_lowercase().contains(query))
    }
}

impl SourceConfig {
    /// The id this source expects for a canonical model id.
    pub fn model_id_for<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.model_map
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }
}

/// Every family, in catalog order.
pub fn families() -> &'static [ModelFamily] {
    &FAMILIES
}

pub fn find_family(id: &str) -> Option<&'static ModelFamily> {
    FAMILIES.iter().find(|f| f.id == id)
}

/// Looks up a family, falling back to the first catalog entry for unknown ids.
pub fn get_family(id: &str) -> &'static ModelFamily {
    find_family(id).unwrap_or(&FAMILIES[0])
}

pub fn list_popular() -> Vec<&'static ModelFamily> {
    FAMILIES.iter().filter(|f| f.popular).collect()
}

/// Case-insensitive substring search over name, description, id and variant labels.
pub fn search(query: &str) -> Vec<&'static ModelFamily> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return FAMILIES.iter().collect();
    }
    FAMILIES.iter().filter(|f| f.matches(&query)).collect()
}
