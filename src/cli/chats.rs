use std::error::Error;

use chrono::Local;
use clap::Subcommand;

use crate::cli::open_chat_store;
use crate::core::config::Config;
use crate::core::message::Role;
use crate::core::store::{ChatSession, ChatStore, StoreError};

#[derive(Subcommand)]
pub enum ChatsCommand {
    /// List saved chats, newest first
    List,
    /// Print a saved chat
    Show { id: String },
    /// Delete a saved chat
    Delete { id: String },
    /// Rename a saved chat
    Rename {
        id: String,
        #[arg(trailing_var_arg = true, required = true)]
        title: Vec<String>,
    },
}

pub async fn run(command: ChatsCommand) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let store = open_chat_store(&config);

    let result = match command {
        ChatsCommand::List => list_chats(store.as_ref()).await,
        ChatsCommand::Show { id } => show_chat(store.as_ref(), &id).await,
        ChatsCommand::Delete { id } => store.delete_chat(&id).await.map(|()| {
            println!("✅ Deleted {id}");
        }),
        ChatsCommand::Rename { id, title } => {
            let title = title.join(" ");
            store.rename_chat(&id, &title).await.map(|()| {
                println!("✅ Renamed {id} to: {title}");
            })
        }
    };

    match result {
        Err(StoreError::NotFound(id)) => {
            eprintln!("❌ No saved chat with id '{id}'");
            std::process::exit(1);
        }
        other => Ok(other?),
    }
}

async fn list_chats(store: &dyn ChatStore) -> Result<(), StoreError> {
    let chats = store.list_chats().await?;
    if chats.is_empty() {
        println!("No saved chats.");
        return Ok(());
    }
    for chat in &chats {
        println!("{}", summary_line(chat));
    }
    Ok(())
}

async fn show_chat(store: &dyn ChatStore, id: &str) -> Result<(), StoreError> {
    let chat = store.get_chat(id).await?;
    println!("# {}\n", chat.title);
    for message in store.list_messages(id).await? {
        let speaker = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
            Role::System => "System",
        };
        println!("{speaker}: {}\n", message.content);
    }
    Ok(())
}

fn summary_line(chat: &ChatSession) -> String {
    let created = chat.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
    format!("{}  {created}  {}", chat.id, chat.title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn summary_starts_with_id_and_ends_with_title() {
        let chat = ChatSession {
            id: "0b6f".into(),
            title: "Trip planning".into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        };
        let line = summary_line(&chat);
        assert!(line.starts_with("0b6f  2025-0"), "{line}");
        assert!(line.ends_with("  Trip planning"), "{line}");
    }
}
