//! CRM chat client - terminal front end
//!
//! Joins one room, prints everything the server pushes and sends what is
//! typed on stdin.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use crmchat_client::logging;
use crmchat_client::ws::{ChatEvent, ChatMutation, ConnectionStatus};
use crmchat_client::{ChatClient, ChatConfig, ChatStore};
use crmchat_shared::MessageKind;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Debug, PartialEq)]
enum Command {
    Send(String),
    Edit { id: String, content: String },
    Delete(String),
    Read(String),
    Typing(bool),
    Reconnect,
    Room(String),
    Logout,
    Quit,
    Invalid(&'static str),
}

impl Command {
    fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Command::Send(line.to_string()));
        };

        let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
        let args = args.trim();
        let command = match name {
            "edit" => match args.split_once(' ') {
                Some((id, content)) if !content.trim().is_empty() => Command::Edit {
                    id: id.to_string(),
                    content: content.trim().to_string(),
                },
                _ => Command::Invalid("usage: /edit <id> <text>"),
            },
            "delete" if !args.is_empty() => Command::Delete(args.to_string()),
            "delete" => Command::Invalid("usage: /delete <id>"),
            "read" if !args.is_empty() => Command::Read(args.to_string()),
            "read" => Command::Invalid("usage: /read <id>"),
            "typing" => match args {
                "on" => Command::Typing(true),
                "off" => Command::Typing(false),
                _ => Command::Invalid("usage: /typing on|off"),
            },
            "reconnect" => Command::Reconnect,
            "room" if !args.is_empty() => Command::Room(args.to_string()),
            "room" => Command::Invalid("usage: /room <id>"),
            "logout" => Command::Logout,
            "quit" | "exit" => Command::Quit,
            _ => Command::Invalid("unknown command"),
        };
        Some(command)
    }
}

fn print_event(event: &ChatEvent) {
    match event {
        ChatEvent::Mutation(ChatMutation::AppendMessage { message, .. }) => println!(
            "[{}] {}: {}",
            message.id,
            message.sender_name().unwrap_or("?"),
            message.content
        ),
        ChatEvent::Mutation(ChatMutation::ReplaceMessage { message, .. }) => {
            println!("[{}] (edited) {}", message.id, message.content)
        }
        ChatEvent::Mutation(ChatMutation::RemoveMessage { message_id, .. }) => {
            println!("[{}] (deleted)", message_id)
        }
        ChatEvent::Mutation(ChatMutation::SetTyping {
            username,
            is_typing: true,
            ..
        }) => println!("* {} is typing...", username),
        ChatEvent::Mutation(ChatMutation::SetTyping { .. }) => {}
        ChatEvent::Mutation(ChatMutation::SetPresence {
            username, status, ..
        }) => println!("* {} is {}", username, status.as_str()),
        ChatEvent::MessageRead(receipt) => {
            println!("* {} read [{}]", receipt.username, receipt.message_id)
        }
        ChatEvent::Connected { room_id } => println!("* connected to room {}", room_id),
        ChatEvent::Disconnected { room_id, close } => {
            println!("* disconnected from room {}: {}", room_id, close.describe())
        }
        ChatEvent::Error(signal) => eprintln!("! {:?}: {}", signal.kind, signal.message),
    }
}

async fn watch_status(mut status: watch::Receiver<ConnectionStatus>) {
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().clone();
        if let Some(delay) = current.retry_in {
            println!(
                "* reconnecting in {:.1}s (attempt {})",
                delay.as_secs_f32(),
                current.attempt
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(logging::DEFAULT_FILTER);

    let room_id = std::env::args()
        .nth(1)
        .context("usage: crmchat-client <room-id>")?;
    let config = ChatConfig::from_env();

    let store = Arc::new(Mutex::new(ChatStore::new()));
    let sink_store = store.clone();
    let client = ChatClient::with_native_transport(config, move |event| {
        print_event(&event);
        if let Ok(mut store) = sink_store.lock() {
            store.apply(&event);
        }
    });
    tokio::spawn(watch_status(client.status()));

    client.set_authenticated(true).await;
    client.set_room(Some(room_id)).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        let outbound = matches!(
            command,
            Command::Send(_)
                | Command::Edit { .. }
                | Command::Delete(_)
                | Command::Read(_)
                | Command::Typing(_)
        );
        match command {
            Command::Send(content) => client.send_message(content, MessageKind::Text, None),
            Command::Edit { id, content } => client.edit_message(id, content),
            Command::Delete(id) => client.delete_message(id),
            Command::Read(id) => client.mark_as_read(id),
            Command::Typing(on) => client.set_typing(on),
            Command::Reconnect => client.reconnect().await,
            Command::Room(room_id) => {
                if let (Some(previous), Ok(mut store)) = (client.room_id(), store.lock()) {
                    store.clear_room(&previous);
                }
                client.set_room(Some(room_id)).await;
            }
            Command::Logout => client.set_authenticated(false).await,
            Command::Quit => break,
            Command::Invalid(usage) => eprintln!("{}", usage),
        }
        if outbound && !client.is_open() {
            eprintln!(
                "! not connected, nothing sent{}",
                client
                    .last_error()
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            );
        }
    }

    client.disconnect().await;
    Ok(())
}
