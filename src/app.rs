use std::collections::VecDeque;
use std::sync::mpsc;

use anyhow::Result;
use forca_bridge::host::demo::{ECHO_LATER, LOAD_WORDS, NORMALIZE_WORD, WORD_LENGTH};
use forca_bridge::model::config::AppConfig;
use forca_bridge::{
    BridgeClient, Completion, CorrelationId, Deferred, ResolutionChannel, Value,
    host::DemoHost,
};

use crate::msg::Msg;

pub struct App {
    bridge: BridgeClient,
    host: DemoHost,
    resolutions: ResolutionChannel,
    outstanding: Vec<Deferred>,
    notifications: VecDeque<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig, completions: mpsc::Sender<Completion>) -> Self {
        let host = DemoHost::install(&config.bridge, &config.host, completions);
        let bridge = BridgeClient::with_host(&config.bridge, host.table());
        let resolutions = bridge.resolution_channel();

        let mut app = Self {
            bridge,
            host,
            resolutions,
            outstanding: Vec::new(),
            notifications: VecDeque::new(),
            should_quit: false,
        };
        app.push_notification(format!(
            "host ready: {} (type `help` for commands)",
            app.bridge.is_host_ready()
        ));
        app
    }

    // ── Update ───────────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Line(line) => self.handle_command(line),
            Msg::Completion(completion) => self.handle_completion(completion),
            Msg::InputClosed => self.quit(),
        }
        self.poll_outstanding();
        Ok(())
    }

    pub fn take_notifications(&mut self) -> Vec<String> {
        self.notifications.drain(..).collect()
    }

    fn handle_command(&mut self, line: String) {
        let tokens = split_command_input(&line);
        let Some((command, rest)) = tokens.split_first() else {
            return;
        };

        match command.text.as_str() {
            "help" => self.push_help(),
            "quit" | "q" => self.quit(),
            "saved" => {
                let note = match self.host.last_saved() {
                    Some(value) => format!("saved: {value}"),
                    None => "saved: nothing yet".to_string(),
                };
                self.push_notification(note);
            }
            "pending" => {
                let ids = self.bridge.pending_ids();
                if ids.is_empty() {
                    self.push_notification("pending: none".to_string());
                } else {
                    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                    self.push_notification(format!("pending: {}", ids.join(", ")));
                }
            }
            "cancel" => match rest.first().and_then(|token| parse_call_id(&token.text)) {
                Some(id) => {
                    if let Err(err) = self.bridge.cancel(id) {
                        self.push_notification(format!("cancel: {err}"));
                    }
                }
                None => self.push_notification("usage: cancel <id>".to_string()),
            },
            "sync" | "send" | "async" => {
                let Some((name, args)) = rest.split_first() else {
                    self.push_notification(format!("usage: {} <capability> [args..]", command.text));
                    return;
                };
                let args = args.iter().map(Token::to_value);
                self.dispatch(&command.text, &name.text, args);
            }
            other => self.push_notification(format!("unknown command: {other}")),
        }
    }

    fn dispatch(&mut self, convention: &str, name: &str, args: impl Iterator<Item = Value>) {
        let note = match convention {
            "sync" => match self.bridge.call_sync(name, args) {
                Ok(value) => format!("{name} → {value}"),
                Err(err) => format!("error: {err}"),
            },
            "send" => match self.bridge.send_to_host(name, args) {
                Ok(()) => format!("{name}: sent"),
                Err(err) => format!("error: {err}"),
            },
            _ => match self.bridge.call_async(name, args) {
                Ok(deferred) => {
                    let note = match deferred.id() {
                        Some(id) => format!("{name}: dispatched as {id}"),
                        None => format!("{name}: not dispatched"),
                    };
                    self.outstanding.push(deferred);
                    note
                }
                Err(err) => format!("error: {err}"),
            },
        };
        self.push_notification(note);
    }

    fn handle_completion(&mut self, completion: Completion) {
        if let Err(err) = self.resolutions.deliver(completion) {
            self.push_notification(format!("protocol error: {err}"));
        }
    }

    fn poll_outstanding(&mut self) {
        let mut settled = Vec::new();
        self.outstanding.retain_mut(|deferred| match deferred.try_wait() {
            Some(outcome) => {
                let label = deferred
                    .id()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                settled.push(match outcome {
                    Ok(value) => format!("{label} {}: {value}", deferred.capability()),
                    Err(err) => format!("{label} {} failed: {err}", deferred.capability()),
                });
                false
            }
            None => true,
        });

        for note in settled {
            self.push_notification(note);
        }
    }

    fn quit(&mut self) {
        if self.should_quit {
            return;
        }
        let abandoned = self.bridge.shutdown();
        if abandoned > 0 {
            tracing::warn!(abandoned, "quitting with pending host calls");
        }
        self.should_quit = true;
    }

    fn push_help(&mut self) {
        let notes = [
            "commands:".to_string(),
            "  sync <capability> [args..]".to_string(),
            "  send <capability> [args..]".to_string(),
            "  async <capability> [args..]".to_string(),
            "  pending".to_string(),
            "  saved".to_string(),
            "  cancel <id>".to_string(),
            "  quit (alias: q)".to_string(),
            format!(
                "capabilities: {}, {NORMALIZE_WORD}, {WORD_LENGTH}, {LOAD_WORDS}, {ECHO_LATER}",
                self.bridge.liveness_marker()
            ),
        ];
        for note in notes {
            self.push_notification(note);
        }
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
}

impl Token {
    fn to_value(&self) -> Value {
        if self.quoted {
            return Value::Str(self.text.clone());
        }

        match self.text.as_str() {
            "null" => Value::Null,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            text => {
                if let Ok(n) = text.parse::<i64>() {
                    Value::Int(n)
                } else if let Ok(x) = text.parse::<f64>()
                    && x.is_finite()
                {
                    Value::Float(x)
                } else {
                    Value::Str(text.to_string())
                }
            }
        }
    }
}

/// Whitespace-separated tokens. Quoted tokens keep their spaces and honour `\` escapes.
fn split_command_input(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = raw.trim().chars().peekable();

    while let Some(&first) = chars.peek() {
        if first.is_whitespace() {
            chars.next();
            continue;
        }

        if first == '"' || first == '\'' {
            chars.next();
            let mut out = String::new();
            let mut escaped = false;
            for ch in chars.by_ref() {
                if escaped {
                    out.push(ch);
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == first {
                    break;
                } else {
                    out.push(ch);
                }
            }
            if escaped {
                out.push('\\');
            }
            tokens.push(Token {
                text: out,
                quoted: true,
            });
        } else {
            let mut out = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                out.push(ch);
                chars.next();
            }
            tokens.push(Token {
                text: out,
                quoted: false,
            });
        }
    }

    tokens
}

fn parse_call_id(raw: &str) -> Option<CorrelationId> {
    raw.strip_prefix("call-")
        .unwrap_or(raw)
        .parse::<u64>()
        .ok()
        .map(CorrelationId::from_raw)
}
