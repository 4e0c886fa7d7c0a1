//! One-shot "say" command

use std::error::Error;

use tokio_util::sync::CancellationToken;

use crate::cli::chat::report;
use crate::cli::sink::TerminalSink;
use crate::cli::{cancel_on_ctrl_c, select_provider};
use crate::core::adapters::ChatClient;
use crate::core::config::Config;
use crate::core::conversation::{Conversation, TurnOutcome};
use crate::core::providers::ProviderStore;

pub async fn run_say(provider: Option<String>, prompt: Vec<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: supercharge say <prompt>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let providers = ProviderStore::load_default()?;
    let provider = match select_provider(&providers, provider.as_deref()) {
        Ok(provider) => provider,
        Err(message) => {
            eprintln!("❌ {message}");
            std::process::exit(1);
        }
    };

    let client = ChatClient::from_config(&config)?;
    let mut conversation =
        Conversation::new(provider, client)?.with_render_settings(&config.render);

    let cancel = CancellationToken::new();
    let _guard = cancel_on_ctrl_c(&cancel);
    let mut sink = TerminalSink::stdout();
    let outcome = conversation.send(&prompt, &mut sink, cancel).await;
    println!();
    report(&outcome);

    if matches!(outcome, TurnOutcome::Failed(_)) {
        std::process::exit(1);
    }
    Ok(())
}
