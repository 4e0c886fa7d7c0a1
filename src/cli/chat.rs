//! Line-oriented interactive chat.

use std::error::Error;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::cli::sink::TerminalSink;
use crate::cli::{cancel_on_ctrl_c, open_chat_store, select_provider};
use crate::core::adapters::ChatClient;
use crate::core::config::Config;
use crate::core::conversation::{Conversation, TurnOutcome};
use crate::core::message::{ChatMessage, Role};
use crate::core::providers::ProviderStore;

const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];
const PROVIDER_COMMAND: &str = "/provider";

#[derive(Debug, PartialEq, Eq)]
enum ReplInput<'a> {
    Quit,
    /// `/provider` alone lists providers; with an id it switches.
    Provider(Option<&'a str>),
    Message(&'a str),
}

fn parse_input(input: &str) -> Option<ReplInput<'_>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if QUIT_COMMANDS.contains(&input) {
        return Some(ReplInput::Quit);
    }
    if let Some(rest) = input.strip_prefix(PROVIDER_COMMAND) {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            let id = rest.trim();
            return Some(ReplInput::Provider((!id.is_empty()).then_some(id)));
        }
    }
    Some(ReplInput::Message(input))
}

pub async fn run_chat(
    provider: Option<String>,
    resume: Option<String>,
) -> Result<(), Box<dyn Error>> {
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
    let store = open_chat_store(&config);
    let conversation = match resume {
        Some(chat_id) => Conversation::resume(provider, client, store, &chat_id).await?,
        None => Conversation::new(provider, client)?.with_store(store),
    };
    let mut conversation = conversation.with_render_settings(&config.render);

    let route = conversation.route();
    eprintln!(
        "💬 {} · {} via {}",
        conversation.provider().label,
        route.model_id,
        route.source
    );
    eprintln!("Ctrl+C stops a reply; /provider <id> switches model; /quit leaves.");
    print_history(conversation.messages());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sink = TerminalSink::stdout();

    loop {
        eprint!("\n> ");
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            eprintln!();
            break;
        };

        let input = match parse_input(&line) {
            None => continue,
            Some(ReplInput::Quit) => break,
            Some(ReplInput::Provider(None)) => {
                for provider in providers.providers() {
                    let marker = if provider.id == conversation.provider().id { "*" } else { " " };
                    eprintln!("{marker} {}  {}  {}", provider.id, provider.label, provider.model);
                }
                continue;
            }
            Some(ReplInput::Provider(Some(id))) => {
                match select_provider(&providers, Some(id)) {
                    Ok(provider) => match conversation.set_provider(provider) {
                        Ok(()) => eprintln!(
                            "✅ Now using {} · {}",
                            conversation.provider().label,
                            conversation.route().model_id
                        ),
                        Err(e) => eprintln!("❌ {e}"),
                    },
                    Err(message) => eprintln!("❌ {message}"),
                }
                continue;
            }
            Some(ReplInput::Message(text)) => text,
        };

        let cancel = CancellationToken::new();
        let _guard = cancel_on_ctrl_c(&cancel);
        let outcome = conversation.send(input, &mut sink, cancel).await;
        println!();
        report(&outcome);
    }

    if let Some(chat_id) = conversation.chat_id() {
        eprintln!("Saved as {chat_id}");
    }
    Ok(())
}

fn print_history(messages: &[ChatMessage]) {
    for message in messages {
        match message.role {
            Role::User => println!("\n> {}", message.content),
            Role::Assistant => println!("{}", message.content),
            Role::System => {}
        }
    }
}

pub(crate) fn report(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed => {}
        TurnOutcome::Cancelled => eprintln!("⏹  Stopped"),
        TurnOutcome::Failed(err) => eprintln!("❌ Error: {err}"),
    }
}
