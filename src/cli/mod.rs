//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod chats;
pub mod families;
pub mod providers;
pub mod say;
pub mod sink;

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::cli::chat::run_chat;
use crate::cli::chats::ChatsCommand;
use crate::cli::families::list_families;
use crate::cli::providers::ProviderCommand;
use crate::cli::say::run_say;
use crate::core::config::Config;
use crate::core::providers::{ProviderConfig, ProviderStore};
use crate::core::store::FileChatStore;

pub const API_KEY_ENV: &str = "SUPERCHARGE_API_KEY";

#[derive(Parser)]
#[command(name = "supercharge")]
#[command(about = "Stream chat replies from OpenAI, Anthropic, Gemini, Cohere and OpenRouter")]
#[command(
    long_about = "Supercharge is a terminal chat client. Pick a model family, choose how to \
reach it (the vendor's own API or OpenRouter), and chat with replies streamed as they arrive.\n\n\
Getting started:\n\
  supercharge families                 Browse model families\n\
  supercharge provider add --family anthropic --model claude-sonnet-4-20250514\n\
  supercharge chat                     Start chatting with the active provider\n\n\
Environment Variables:\n\
  SUPERCHARGE_API_KEY   API key used by 'provider add' when --key is omitted\n\
  RUST_LOG              Log filter for diagnostics on stderr (default: warn)\n\n\
Controls:\n\
  Enter             Send the message\n\
  Ctrl+C            Stop the reply in progress, or quit at the prompt\n\
  /provider [ID]    List providers, or switch the chat to another one\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse or search model families
    Families {
        /// Text to match against family ids, names and descriptions
        query: Option<String>,
        /// Only show popular families
        #[arg(long)]
        popular: bool,
    },
    /// Manage provider configurations
    Provider {
        #[command(subcommand)]
        command: ProviderCommand,
    },
    /// Start an interactive chat (default)
    Chat {
        /// Provider id to use instead of the active one
        #[arg(short = 'p', long)]
        provider: Option<String>,
        /// Continue a saved chat
        #[arg(short = 'r', long, value_name = "CHAT_ID")]
        resume: Option<String>,
    },
    /// Send one prompt and print the reply
    Say {
        /// Provider id to use instead of the active one
        #[arg(short = 'p', long)]
        provider: Option<String>,
        /// Prompt text
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Manage saved chats
    Chats {
        #[command(subcommand)]
        command: ChatsCommand,
    },
    /// Show or change configuration values
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommand>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print every setting and its current value
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key, e.g. render.tick_ms
        key: String,
        /// New value
        value: String,
    },
    /// Reset a configuration value to its default
    Unset {
        /// Configuration key
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat {
        provider: None,
        resume: None,
    }) {
        Commands::Families { query, popular } => {
            list_families(query.as_deref(), popular);
            Ok(())
        }
        Commands::Provider { command } => providers::run(command),
        Commands::Chat { provider, resume } => run_chat(provider, resume).await,
        Commands::Say { provider, prompt } => run_say(provider, prompt).await,
        Commands::Chats { command } => chats::run(command).await,
        Commands::Config { command } => run_config(command.unwrap_or(ConfigCommand::Show)),
    }
}

fn run_config(command: ConfigCommand) -> Result<(), Box<dyn Error>> {
    match command {
        ConfigCommand::Show => Config::load()?.print_all(),
        ConfigCommand::Set { key, value } => {
            if let Err(e) = Config::mutate(|config| config.set_value(&key, &value)) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            println!("✅ Set {key} to: {value}");
        }
        ConfigCommand::Unset { key } => {
            if let Err(e) = Config::mutate(|config| config.unset_value(&key)) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            println!("✅ Unset {key}");
        }
    }
    Ok(())
}

/// Picks the provider a session should use: the requested id, else the active one.
pub(crate) fn select_provider(
    store: &ProviderStore,
    requested: Option<&str>,
) -> Result<ProviderConfig, String> {
    let provider = match requested {
        Some(id) => store
            .get(id)
            .ok_or_else(|| format!("No provider with id '{id}'. Run 'supercharge provider list'."))?,
        None => store.active().ok_or_else(|| {
            "No active provider. Add one with 'supercharge provider add'.".to_string()
        })?,
    };
    Ok(provider.clone())
}

pub(crate) fn open_chat_store(config: &Config) -> Arc<FileChatStore> {
    Arc::new(FileChatStore::new(config.chats_dir()))
}

/// Cancels `token` on Ctrl-C until the returned guard is dropped.
pub(crate) fn cancel_on_ctrl_c(token: &CancellationToken) -> CtrlCGuard {
    let token = token.clone();
    CtrlCGuard(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    }))
}

pub(crate) struct CtrlCGuard(tokio::task::JoinHandle<()>);

impl Drop for CtrlCGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::providers::NewProvider;
    use crate::core::registry::SourceKind;
    use tempfile::tempdir;

    #[test]
    fn no_subcommand_parses() {
        let args = Args::try_parse_from(["supercharge"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn say_collects_the_whole_prompt() {
        let args =
            Args::try_parse_from(["supercharge", "say", "-p", "abc", "what", "is", "this?"])
                .unwrap();
        match args.command {
            Some(Commands::Say { provider, prompt }) => {
                assert_eq!(provider.as_deref(), Some("abc"));
                assert_eq!(prompt, vec!["what", "is", "this?"]);
            }
            _ => panic!("expected say"),
        }
    }

    #[test]
    fn provider_add_parses_source_kind() {
        let args = Args::try_parse_from([
            "supercharge",
            "provider",
            "add",
            "--family",
            "claude",
            "--source",
            "openrouter",
            "--model",
            "claude-sonnet-4-5",
        ])
        .unwrap();
        match args.command {
            Some(Commands::Provider {
                command: ProviderCommand::Add { source, key, .. },
            }) => {
                assert_eq!(source, SourceKind::OpenRouter);
                assert!(key.is_none());
            }
            _ => panic!("expected provider add"),
        }
    }

    #[test]
    fn unknown_source_kind_is_rejected() {
        let result = Args::try_parse_from([
            "supercharge",
            "provider",
            "add",
            "--family",
            "claude",
            "--source",
            "bedrock",
            "--model",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn select_provider_prefers_requested_then_active() {
        let dir = tempdir().unwrap();
        let mut store = ProviderStore::load(dir.path().join("providers.toml")).unwrap();
        assert!(select_provider(&store, None).is_err());

        let first = store
            .add(NewProvider {
                family: "openai".into(),
                source: SourceKind::Official,
                label: None,
                api_key: "k1".into(),
                model: "gpt-4o-mini".into(),
            })
            .unwrap()
            .id
            .clone();
        let second = store
            .add(NewProvider {
                family: "openai".into(),
                source: SourceKind::OpenRouter,
                label: None,
                api_key: "k2".into(),
                model: "gpt-4o-mini".into(),
            })
            .unwrap()
            .id
            .clone();

        assert_eq!(select_provider(&store, None).unwrap().id, second);
        assert_eq!(select_provider(&store, Some(&first)).unwrap().id, first);
        assert!(select_provider(&store, Some("nope")).is_err());
    }
}
