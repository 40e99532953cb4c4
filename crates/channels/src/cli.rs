//! CLI channel: interactive terminal-based chat.
//!
//! Reads from stdin, writes to stdout. Used by `trufa chat` to talk to the
//! bot without a Telegram token. Prompts with buttons are printed as a
//! numbered row; typing `/pick N` presses button N of the most recent one.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;
use trufa_core::channel::{
    CallbackQuery, Channel, ChatMember, ChatType, InboundEvent, IncomingMessage, InlineKeyboard,
};
use trufa_core::error::ChannelError;
use trufa_core::media::{MediaFormat, MediaItem};

const CHAT_ID: &str = "cli_session";
const LOCAL_USER: &str = "local_user";

/// The last message sent with buttons, kept so `/pick` can press one.
#[derive(Debug, Clone)]
struct LastPrompt {
    text: String,
    keyboard: InlineKeyboard,
}

/// What a line typed by the user turns into.
#[derive(Debug)]
enum LineAction {
    Exit,
    Skip,
    Notice(String),
    Event(InboundEvent),
}

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    chat_type: ChatType,
    last_prompt: Arc<Mutex<Option<LastPrompt>>>,
}

impl CliChannel {
    /// A channel whose messages look like they come from `chat_type`.
    pub fn new(chat_type: ChatType) -> Self {
        Self {
            chat_type,
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new(ChatType::Private)
    }
}

fn parse_line(
    line: &str,
    chat_type: ChatType,
    last_prompt: Option<&LastPrompt>,
    callback_seq: u64,
) -> LineAction {
    let line = line.trim();
    if line.is_empty() {
        return LineAction::Skip;
    }

    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return LineAction::Exit;
    }

    if let Some(arg) = line.strip_prefix("/pick") {
        let Some(prompt) = last_prompt else {
            return LineAction::Notice("No hay ningun boton que pulsar.".into());
        };
        let Ok(n) = arg.trim().parse::<usize>() else {
            return LineAction::Notice("Uso: /pick N".into());
        };
        let Some(button) = n.checked_sub(1).and_then(|i| prompt.keyboard.buttons().nth(i)) else {
            return LineAction::Notice(format!(
                "Elige entre 1 y {}.",
                prompt.keyboard.button_count()
            ));
        };
        return LineAction::Event(InboundEvent::Callback(CallbackQuery {
            id: format!("cli-{callback_seq}"),
            chat_id: CHAT_ID.into(),
            message_text: Some(prompt.text.clone()),
            payload: Some(button.payload.clone()),
            sender_id: Some(LOCAL_USER.into()),
        }));
    }

    LineAction::Event(InboundEvent::Message(IncomingMessage {
        chat_id: CHAT_ID.into(),
        chat_type,
        sender_id: Some(LOCAL_USER.into()),
        sender_name: Some("User".into()),
        text: Some(line.to_string()),
        sent_at: Utc::now(),
    }))
}

fn render_keyboard(keyboard: &InlineKeyboard) -> String {
    keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| format!("[{}]", b.label))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let chat_type = self.chat_type;
        let last_prompt = Arc::clone(&self.last_prompt);

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();
            let mut callback_seq = 0u64;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let action = {
                            let prompt = last_prompt.lock().unwrap_or_else(|e| e.into_inner());
                            parse_line(&line, chat_type, prompt.as_ref(), callback_seq)
                        };

                        match action {
                            LineAction::Exit => break,
                            LineAction::Skip => continue,
                            LineAction::Notice(text) => eprintln!("{text}"),
                            LineAction::Event(event) => {
                                if matches!(event, InboundEvent::Callback(_)) {
                                    callback_seq += 1;
                                }
                                if tx.send(Ok(event)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), ChannelError> {
        println!("{content}");
        if let Some(keyboard) = keyboard {
            println!("{}", render_keyboard(keyboard));
            *self.last_prompt.lock().unwrap_or_else(|e| e.into_inner()) = Some(LastPrompt {
                text: content.to_string(),
                keyboard: keyboard.clone(),
            });
        }
        Ok(())
    }

    async fn send_media(&self, _chat_id: &str, media: &MediaItem) -> Result<(), ChannelError> {
        let tag = match media.format {
            MediaFormat::Photo => "foto",
            MediaFormat::Animation => "gif",
        };
        println!("[{tag}] {}", media.url);
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), ChannelError> {
        debug!(callback_id, "CLI callback acknowledged");
        Ok(())
    }

    async fn chat_administrators(&self, _chat_id: &str) -> Result<Vec<ChatMember>, ChannelError> {
        // The local user administers their own terminal.
        Ok(vec![ChatMember {
            user_id: LOCAL_USER.into(),
            username: Some(LOCAL_USER.into()),
        }])
    }
}
