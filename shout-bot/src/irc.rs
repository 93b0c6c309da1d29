use crate::bot::ShoutBot;
use crate::config::BotConfig;
use crate::types::{BotError, ChatEvent, Result};
use async_trait::async_trait;
use interfaces::defs::{InboundEvent, Transport};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

/// Longest line we send, CRLF excluded
const MAX_LINE_BYTES: usize = 510;

/// Mode prefixes that may precede a nick in a names reply
const NICK_MODE_PREFIXES: &[char] = &['@', '+', '%', '&', '~'];

pub type IrcLines = Lines<BufReader<OwnedReadHalf>>;

/// One protocol line: `[:prefix] COMMAND params... [:trailing]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ')?;
                rest = tail;
                Some(prefix.to_string())
            }
            None => None,
        };

        let (middle, trailing) = match rest.split_once(" :") {
            Some((middle, trailing)) => (middle, Some(trailing)),
            None => (rest, None),
        };

        let mut words = middle.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Some(Self { prefix, command, params })
    }

    /// Nick part of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split('!').next().unwrap_or(prefix))
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// Strip line breaks and cap the line so it can't be split into extra commands.
pub fn sanitize_line(line: &str) -> String {
    let mut clean: String = line.chars().map(|c| if c == '\r' || c == '\n' { ' ' } else { c }).collect();
    if clean.len() > MAX_LINE_BYTES {
        let mut cut = MAX_LINE_BYTES;
        while !clean.is_char_boundary(cut) {
            cut -= 1;
        }
        clean.truncate(cut);
    }
    clean
}

fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Who is in which channel, keyed by lowercased names.
#[derive(Debug, Default)]
pub struct Roster {
    channels: HashMap<String, HashSet<String>>,
}

impl Roster {
    pub fn add(&mut self, channel: &str, nick: &str) {
        let nick = nick.trim_start_matches(NICK_MODE_PREFIXES);
        if nick.is_empty() {
            return;
        }
        self.channels.entry(key(channel)).or_default().insert(key(nick));
    }

    pub fn remove(&mut self, channel: &str, nick: &str) {
        if let Some(members) = self.channels.get_mut(&key(channel)) {
            members.remove(&key(nick));
        }
    }

    pub fn forget_channel(&mut self, channel: &str) {
        self.channels.remove(&key(channel));
    }

    pub fn quit(&mut self, nick: &str) {
        let nick = key(nick);
        for members in self.channels.values_mut() {
            members.remove(&nick);
        }
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        let (old, new) = (key(old), key(new));
        for members in self.channels.values_mut() {
            if members.remove(&old) {
                members.insert(new.clone());
            }
        }
    }

    pub fn contains(&self, nick: &str) -> bool {
        let nick = key(nick);
        self.channels.values().any(|members| members.contains(&nick))
    }

    pub fn count(&self, channel: &str) -> usize {
        self.channels.get(&key(channel)).map_or(0, HashSet::len)
    }
}

pub struct IrcClient {
    nick: RwLock<String>,
    autojoin: Vec<String>,
    writer: Mutex<OwnedWriteHalf>,
    roster: RwLock<Roster>,
}

impl IrcClient {
    /// Connect and register; the returned lines feed [`IrcClient::run`].
    pub async fn connect(config: &BotConfig) -> Result<(Arc<Self>, IrcLines)> {
        info!("Connecting to {}:{}", config.server, config.port);
        let stream = TcpStream::connect((config.server.as_str(), config.port)).await?;
        let (read, write) = stream.into_split();

        let client = Arc::new(Self {
            nick: RwLock::new(config.nick.clone()),
            autojoin: config.channels.clone(),
            writer: Mutex::new(write),
            roster: RwLock::new(Roster::default()),
        });

        client.send_line(&format!("NICK {}", config.nick)).await?;
        client.send_line(&format!("USER {} 0 * :{}", config.nick, config.nick)).await?;

        Ok((client, BufReader::new(read).lines()))
    }

    pub async fn nick(&self) -> String {
        self.nick.read().await.clone()
    }

    pub async fn send_line(&self, line: &str) -> Result<()> {
        let line = sanitize_line(line);
        trace!(">> {}", line);
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read until the server closes the connection.
    pub async fn run(&self, mut lines: IrcLines, bot: &ShoutBot) -> Result<()> {
        while let Some(line) = lines.next_line().await? {
            trace!("<< {}", line);
            let message = match IrcMessage::parse(&line) {
                Some(message) => message,
                None => {
                    warn!("Ignoring malformed line: {:?}", line);
                    continue;
                }
            };

            let event = match self.process(&message).await {
                Ok(event) => event,
                Err(e) => {
                    warn!("Failed to process {}: {}", message.command, e);
                    continue;
                }
            };

            if let Some(event) = event {
                if let Err(e) = bot.handle(event).await {
                    error!("Bot failed to handle {}: {}", message.command, e);
                }
            }
        }

        Err(BotError::Protocol("connection closed by server".to_string()))
    }

    /// Apply `message` to connection state and translate it into a bot event.
    pub async fn process(&self, message: &IrcMessage) -> Result<Option<ChatEvent>> {
        let own_nick = self.nick().await;
        let sender = message.nick().unwrap_or_default().to_string();
        let from_self = sender.eq_ignore_ascii_case(&own_nick);

        match message.command.as_str() {
            "PING" => {
                let token = message.param(0).unwrap_or_default();
                self.send_line(&format!("PONG :{}", token)).await?;
            }
            "001" => {
                info!("Registered as {}", own_nick);
                for channel in &self.autojoin {
                    self.send_line(&format!("JOIN {}", channel)).await?;
                }
            }
            "433" => {
                let retry = format!("{}_", own_nick);
                warn!("Nick {} in use, trying {}", own_nick, retry);
                *self.nick.write().await = retry.clone();
                self.send_line(&format!("NICK {}", retry)).await?;
            }
            "353" => {
                // <me> <symbol> <channel> :<names>
                if let (Some(channel), Some(names)) = (message.param(2), message.param(3)) {
                    let mut roster = self.roster.write().await;
                    for name in names.split(' ') {
                        roster.add(channel, name);
                    }
                }
            }
            "JOIN" => {
                if let Some(channel) = message.param(0) {
                    let mut roster = self.roster.write().await;
                    if from_self {
                        info!("Joined {}", channel);
                        roster.forget_channel(channel);
                    }
                    roster.add(channel, &sender);
                }
            }
            "PART" => {
                if let Some(channel) = message.param(0) {
                    let mut roster = self.roster.write().await;
                    if from_self {
                        roster.forget_channel(channel);
                    } else {
                        roster.remove(channel, &sender);
                    }
                }
            }
            "QUIT" => {
                self.roster.write().await.quit(&sender);
            }
            "NICK" => {
                if let Some(new_nick) = message.param(0) {
                    self.roster.write().await.rename(&sender, new_nick);
                    if from_self {
                        *self.nick.write().await = new_nick.to_string();
                    }
                }
            }
            "KICK" => {
                if let (Some(channel), Some(victim)) = (message.param(0), message.param(1)) {
                    let kicked_self = victim.eq_ignore_ascii_case(&own_nick);
                    {
                        let mut roster = self.roster.write().await;
                        if kicked_self {
                            roster.forget_channel(channel);
                        } else {
                            roster.remove(channel, victim);
                        }
                    }
                    return Ok(Some(ChatEvent::Kicked {
                        channel: channel.to_string(),
                        by: sender,
                        kicked_self,
                    }));
                }
            }
            "INVITE" => {
                if let Some(channel) = message.param(1) {
                    return Ok(Some(ChatEvent::Invite {
                        channel: channel.to_string(),
                        by: sender,
                    }));
                }
            }
            "PRIVMSG" => {
                if let (Some(target), Some(text)) = (message.param(0), message.param(1)) {
                    if is_channel(target) {
                        let mut event = InboundEvent::new(sender, target, text);
                        event.is_self = from_self;
                        return Ok(Some(ChatEvent::Message(event)));
                    }
                    return Ok(Some(ChatEvent::PrivateMessage {
                        sender,
                        text: text.to_string(),
                    }));
                }
            }
            other => {
                debug!("Unhandled command {}", other);
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl Transport for IrcClient {
    async fn send_message(&self, channel: &str, text: &str) -> anyhow::Result<()> {
        Ok(self.send_line(&format!("PRIVMSG {} :{}", channel, text)).await?)
    }

    async fn respond(&self, event: &InboundEvent, text: &str) -> anyhow::Result<()> {
        Ok(self
            .send_line(&format!("PRIVMSG {} :{}: {}", event.channel, event.sender, text))
            .await?)
    }

    async fn kick(&self, channel: &str, nick: &str) -> anyhow::Result<()> {
        Ok(self.send_line(&format!("KICK {} {}", channel, nick)).await?)
    }

    async fn user_exists(&self, nick: &str) -> anyhow::Result<bool> {
        Ok(self.roster.read().await.contains(nick))
    }

    async fn channel_participant_count(&self, channel: &str) -> anyhow::Result<usize> {
        Ok(self.roster.read().await.count(channel))
    }

    async fn join_channel(&self, channel: &str) -> anyhow::Result<()> {
        Ok(self.send_line(&format!("JOIN {}", channel)).await?)
    }
}
