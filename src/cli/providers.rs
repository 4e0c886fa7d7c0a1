use std::error::Error;

use clap::Subcommand;

use crate::cli::API_KEY_ENV;
use crate::core::providers::{NewProvider, ProviderConfig, ProviderStore};
use crate::core::registry::{find_family, SourceKind};

#[derive(Subcommand)]
pub enum ProviderCommand {
    /// List configured providers
    List,
    /// Add a provider and make it active
    Add {
        /// Model family id, see 'supercharge families'
        #[arg(long)]
        family: String,
        /// How to reach the family: official or openrouter
        #[arg(long, default_value = "official")]
        source: SourceKind,
        /// Canonical model id from the family
        #[arg(long)]
        model: String,
        /// Display label
        #[arg(long)]
        label: Option<String>,
        /// API key (falls back to SUPERCHARGE_API_KEY)
        #[arg(long)]
        key: Option<String>,
    },
    /// Remove a provider
    Remove {
        id: String,
    },
    /// Make a provider the active one
    Use {
        id: String,
    },
}

pub fn run(command: ProviderCommand) -> Result<(), Box<dyn Error>> {
    let mut store = ProviderStore::load_default()?;

    match command {
        ProviderCommand::List => list_providers(&store),
        ProviderCommand::Add {
            family,
            source,
            model,
            label,
            key,
        } => {
            let Some(api_key) = key.or_else(|| std::env::var(API_KEY_ENV).ok()) else {
                eprintln!("❌ No API key given. Pass --key or set {API_KEY_ENV}.");
                std::process::exit(1);
            };
            let added = match store.add(NewProvider {
                family,
                source,
                label,
                api_key,
                model,
            }) {
                Ok(provider) => provider.clone(),
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            };
            store.save()?;
            println!("✅ Added {} ({}) and made it active", added.label, added.id);
        }
        ProviderCommand::Remove { id } => match store.remove(&id) {
            Some(removed) => {
                store.save()?;
                println!("✅ Removed {}", removed.label);
            }
            None => {
                eprintln!("❌ No provider with id '{id}'");
                std::process::exit(1);
            }
        },
        ProviderCommand::Use { id } => {
            if let Err(e) = store.set_active(Some(&id)) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            store.save()?;
            println!("✅ Active provider is now {id}");
        }
    }
    Ok(())
}

fn list_providers(store: &ProviderStore) {
    if store.providers().is_empty() {
        println!("No providers configured.");
        return;
    }

    println!("Configured Providers:\n");
    for provider in store.providers() {
        let marker = if store.active_id() == Some(provider.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {}", describe(provider));
    }
    if store.active_id().is_some() {
        println!("\n* = active provider");
    }
}

fn describe(provider: &ProviderConfig) -> String {
    let model = find_family(&provider.family)
        .and_then(|family| family.variant(&provider.model))
        .map(|variant| variant.label.as_str())
        .unwrap_or(provider.model.as_str());
    format!(
        "{}  {}  [{} / {}]  {}",
        provider.id, provider.label, provider.family, provider.source, model
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_uses_the_variant_label() {
        let provider = ProviderConfig {
            id: "abc".into(),
            family: "openai".into(),
            source: SourceKind::OpenRouter,
            label: "OpenAI via OpenRouter".into(),
            api_key: "secret".into(),
            model: "gpt-4o-mini".into(),
        };
        let text = describe(&provider);
        assert_eq!(
            text,
            "abc  OpenAI via OpenRouter  [openai / openrouter]  GPT-4o Mini"
        );
        assert!(!text.contains("secret"));
    }
}
