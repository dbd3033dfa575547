//! PeerChat - single-peer TCP chat with clipboard sharing
//!
//! This is the main entry point for the PeerChat application. Status lines
//! and chat go to stdout, diagnostics to stderr. Lines typed on stdin are
//! sent to the peer unless they start with a `/` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use peer_chat::{
    clipboard::{ClipboardOrigin, SystemClipboard},
    config::{Config, ConfigManager, PeerAddress},
    events::ChannelSink,
    logging::{init_logging, LogLevel},
    node::PeerNode,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const HELP: &str = "\
Commands:
  /connect <host> <port>   connect to a peer
  /reconnect               connect to the last peer
  /disconnect              drop the current peer
  /clipboard on|off        toggle clipboard sharing
  /history                 list clipboard history
  /recopy <id>             copy a history entry back to the clipboard
  /forget <id>             remove a history entry
  /status                  show connection details
  /quit                    exit
Anything else is sent as a chat message.";

/// A parsed stdin line
#[derive(Debug, PartialEq)]
enum Command {
    Connect(PeerAddress),
    Reconnect,
    Disconnect,
    Clipboard(bool),
    History,
    Recopy(Uuid),
    Forget(Uuid),
    Status,
    Help,
    Quit,
    Chat(String),
    Invalid(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if !trimmed.starts_with('/') {
            return Some(Command::Chat(line.to_string()));
        }

        let mut parts = trimmed.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let command = match (name, args.as_slice()) {
            ("/connect", [host, port]) => match port.parse::<u16>() {
                Ok(port) => Command::Connect(PeerAddress::new(*host, port)),
                Err(_) => Command::Invalid(format!("Invalid port: {}", port)),
            },
            ("/connect", _) => Command::Invalid("Usage: /connect <host> <port>".to_string()),
            ("/reconnect", []) => Command::Reconnect,
            ("/disconnect", []) => Command::Disconnect,
            ("/clipboard", ["on"]) => Command::Clipboard(true),
            ("/clipboard", ["off"]) => Command::Clipboard(false),
            ("/clipboard", _) => Command::Invalid("Usage: /clipboard on|off".to_string()),
            ("/history", []) => Command::History,
            ("/recopy", [id]) => match Uuid::parse_str(id) {
                Ok(id) => Command::Recopy(id),
                Err(_) => Command::Invalid(format!("Invalid entry id: {}", id)),
            },
            ("/recopy", _) => Command::Invalid("Usage: /recopy <id>".to_string()),
            ("/forget", [id]) => match Uuid::parse_str(id) {
                Ok(id) => Command::Forget(id),
                Err(_) => Command::Invalid(format!("Invalid entry id: {}", id)),
            },
            ("/forget", _) => Command::Invalid("Usage: /forget <id>".to_string()),
            ("/status", []) => Command::Status,
            ("/help", _) => Command::Help,
            ("/quit", _) | ("/exit", _) => Command::Quit,
            _ => Command::Invalid(format!("Unknown command: {} (try /help)", trimmed)),
        };
        Some(command)
    }
}

/// Application state
struct App {
    config_manager: ConfigManager,
    config: Config,
    node: PeerNode,
}

impl App {
    /// Loads the configuration and starts the node
    async fn initialize(sink: ChannelSink) -> Result<Self> {
        info!("Initializing PeerChat...");

        let config_manager = ConfigManager::new().context("Failed to locate configuration")?;
        let config = config_manager
            .load_or_create_default()
            .context("Failed to load configuration")?;

        info!("Configuration loaded from: {:?}", config_manager.config_file());
        info!("Network - Listen port: {}", config.network.listen_port);
        info!("Clipboard - Sharing: {}", config.clipboard.enabled);

        let node = PeerNode::start(&config, Arc::new(SystemClipboard::new()), Arc::new(sink))
            .await
            .context("Failed to start peer")?;

        Ok(Self {
            config_manager,
            config,
            node,
        })
    }

    /// Runs the command loop until `/quit`, Ctrl+C or end of input
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<String>) -> Result<()> {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());

        println!("PeerChat on {} listening at {}", host, self.node.local_addr());
        println!(
            "Clipboard sharing is {}. Type /help for commands.",
            if self.node.sharing_enabled() { "on" } else { "off" }
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received");
                    break;
                }
                Some(line) = events.recv() => println!("{}", line),
                line = lines.next_line() => match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if let Some(command) = Command::parse(&line) {
                            if command == Command::Quit {
                                break;
                            }
                            self.execute(command).await;
                        }
                    }
                    None => break,
                },
            }
        }

        info!("Shutting down PeerChat...");
        self.node.shutdown().await;

        // Flush whatever the shutdown produced
        while let Ok(line) = events.try_recv() {
            println!("{}", line);
        }
        Ok(())
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::Connect(peer) => self.connect(peer).await,
            Command::Reconnect => match self.config.network.last_peer.clone() {
                Some(peer) => self.connect(peer).await,
                None => println!("No previous peer to reconnect to"),
            },
            Command::Disconnect => {
                if let Err(e) = self.node.disconnect().await {
                    debug!("Disconnect: {}", e);
                }
            }
            Command::Clipboard(enabled) => {
                self.node.set_sharing(enabled);
                println!(
                    "Clipboard sharing {}",
                    if enabled { "enabled" } else { "disabled" }
                );
                self.config.clipboard.enabled = enabled;
                self.save_config();
            }
            Command::History => self.print_history().await,
            Command::Recopy(id) => match self.node.recopy(id).await {
                Ok(()) => println!("Copied entry {} to the clipboard", id),
                Err(e) => println!("{}", e),
            },
            Command::Forget(id) => match self.node.forget(id).await {
                Ok(()) => println!("Removed entry {} from the history", id),
                Err(e) => println!("{}", e),
            },
            Command::Status => self.print_status().await,
            Command::Help => println!("{}", HELP),
            Command::Chat(text) => {
                // Failures are already reported on the event sink
                if let Err(e) = self.node.send_text(text).await {
                    debug!("Send: {}", e);
                }
            }
            Command::Invalid(message) => println!("{}", message),
            Command::Quit => {}
        }
    }

    async fn connect(&mut self, peer: PeerAddress) {
        if self.node.connect(peer.clone()).await.is_ok() {
            self.config.network.last_peer = Some(peer);
            self.save_config();
        }
    }

    fn save_config(&self) {
        if let Err(e) = self.config_manager.save(&self.config) {
            warn!("Failed to save configuration: {}", e);
        }
    }

    async fn print_history(&self) {
        let entries = match self.node.history().await {
            Ok(entries) => entries,
            Err(e) => {
                println!("{}", e);
                return;
            }
        };

        if entries.is_empty() {
            println!("Clipboard history is empty");
            return;
        }

        for entry in entries.iter().rev() {
            let origin = match entry.origin {
                ClipboardOrigin::Local => "local",
                ClipboardOrigin::Remote => "peer",
            };
            let at = entry.captured_at.time();
            println!(
                "{} {:02}:{:02}:{:02} [{}] {}",
                entry.id,
                at.hour(),
                at.minute(),
                at.second(),
                origin,
                preview(&entry.content)
            );
        }
    }

    async fn print_status(&self) {
        match self.node.status().await {
            Ok(status) => {
                println!(
                    "State: {} for {}s ({} links so far)",
                    status.state,
                    status.time_in_state.as_secs(),
                    status.links_established
                );
                if let Some(link) = status.link {
                    println!(
                        "Peer: {} ({}, link {}, up {}s)",
                        link.remote,
                        link.origin,
                        link.id,
                        link.uptime.as_secs()
                    );
                    println!(
                        "Sent: {} messages / {} bytes, received: {} messages / {} bytes",
                        link.stats.messages_sent,
                        link.stats.bytes_sent,
                        link.stats.messages_received,
                        link.stats.bytes_received
                    );
                }
                if status.dialing {
                    println!("Dial in progress");
                }
                println!(
                    "Clipboard sharing: {}",
                    if self.node.sharing_enabled() { "on" } else { "off" }
                );
            }
            Err(e) => println!("{}", e),
        }
    }
}

/// First line of `content`, cut to 60 characters
///
/// Ends in "..." only when something visible was left out.
fn preview(content: &str) -> String {
    let mut lines = content.lines();
    let first = lines.next().unwrap_or_default();
    let mut preview: String = first.chars().take(60).collect();
    if first.chars().count() > 60 || lines.next().is_some() {
        preview.push_str("...");
    }
    preview
}

#[tokio::main]
async fn main() {
    // Debug mode when RUST_LOG is set
    let log_level = if std::env::var("RUST_LOG").is_ok() {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    init_logging(log_level);

    info!("Starting PeerChat v{}", env!("CARGO_PKG_VERSION"));

    let (sink, events) = ChannelSink::new();

    match App::initialize(sink).await {
        Ok(app) => {
            if let Err(e) = app.run(events).await {
                error!("Application error: {:#}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Failed to initialize application: {:#}", e);
            std::process::exit(1);
        }
    }

    info!("PeerChat stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat() {
        assert_eq!(
            Command::parse("hello there"),
            Some(Command::Chat("hello there".to_string()))
        );
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn test_parse_connect() {
        assert_eq!(
            Command::parse("/connect 10.0.0.2 5000"),
            Some(Command::Connect(PeerAddress::new("10.0.0.2", 5000)))
        );
        assert!(matches!(
            Command::parse("/connect 10.0.0.2 notaport"),
            Some(Command::Invalid(_))
        ));
        assert!(matches!(Command::parse("/connect"), Some(Command::Invalid(_))));
    }

    #[test]
    fn test_parse_clipboard_toggle() {
        assert_eq!(Command::parse("/clipboard on"), Some(Command::Clipboard(true)));
        assert_eq!(Command::parse("/clipboard off"), Some(Command::Clipboard(false)));
        assert!(matches!(
            Command::parse("/clipboard maybe"),
            Some(Command::Invalid(_))
        ));
    }

    #[test]
    fn test_parse_recopy() {
        let id = Uuid::new_v4();
        assert_eq!(
            Command::parse(&format!("/recopy {}", id)),
            Some(Command::Recopy(id))
        );
        assert!(matches!(Command::parse("/recopy 42"), Some(Command::Invalid(_))));
    }

    #[test]
    fn test_parse_forget() {
        let id = Uuid::new_v4();
        assert_eq!(
            Command::parse(&format!("/forget {}", id)),
            Some(Command::Forget(id))
        );
        assert!(matches!(Command::parse("/forget"), Some(Command::Invalid(_))));
        assert!(matches!(Command::parse("/forget nope"), Some(Command::Invalid(_))));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(matches!(Command::parse("/frobnicate"), Some(Command::Invalid(_))));
        assert_eq!(Command::parse("/quit"), Some(Command::Quit));
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview("first\nsecond"), "first...");
        assert_eq!(preview(&"a".repeat(80)), format!("{}...", "a".repeat(60)));
        assert_eq!(preview(&"a".repeat(60)), "a".repeat(60));
        assert_eq!(preview("abc\n"), "abc");
        assert_eq!(preview("abc\r\n"), "abc");
    }
}
