//! IRC line codec.
//!
//! Frames a byte stream into [`IrcMessage`]s on CRLF boundaries and encodes
//! outgoing messages, capping each line at the 512 byte protocol limit.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

/// Maximum outgoing line length including the trailing CRLF.
pub const MAX_LINE_LENGTH: usize = 512;

/// Inbound lines may carry IRCv3 tags on top of the 512 bytes.
const MAX_INBOUND_LENGTH: usize = 8191 + MAX_LINE_LENGTH;

/// A single IRC protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    pub fn pass(password: &str) -> Self {
        Self::new("PASS", vec![password.to_string()])
    }

    pub fn nick(nick: &str) -> Self {
        Self::new("NICK", vec![nick.to_string()])
    }

    pub fn user(user: &str, realname: &str) -> Self {
        Self::new(
            "USER",
            vec![
                user.to_string(),
                "0".to_string(),
                "*".to_string(),
                realname.to_string(),
            ],
        )
    }

    pub fn join(channel: &str) -> Self {
        Self::new("JOIN", vec![channel.to_string()])
    }

    pub fn topic(channel: &str, text: &str) -> Self {
        Self::new("TOPIC", vec![channel.to_string(), text.to_string()])
    }

    pub fn notice(target: &str, text: &str) -> Self {
        Self::new("NOTICE", vec![target.to_string(), text.to_string()])
    }

    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", vec![target.to_string(), text.to_string()])
    }

    pub fn mode(target: &str, modes: &str) -> Self {
        Self::new("MODE", vec![target.to_string(), modes.to_string()])
    }

    pub fn ping(token: &str) -> Self {
        Self::new("PING", vec![token.to_string()])
    }

    pub fn pong(token: &str) -> Self {
        Self::new("PONG", vec![token.to_string()])
    }

    pub fn quit(reason: &str) -> Self {
        Self::new("QUIT", vec![reason.to_string()])
    }

    /// Parse one line without its CRLF. Returns `None` for blank or malformed lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_start();

        // IRCv3 message tags are not used
        if rest.starts_with('@') {
            rest = rest.split_once(' ')?.1.trim_start();
        }

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, remainder) = stripped.split_once(' ')?;
                rest = remainder.trim_start();
                Some(prefix.to_string())
            }
            None => None,
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut parts = head.split_whitespace();
        let command = parts.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = parts.map(String::from).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nick part of the prefix (`nick!user@host`).
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split_once('!').map(|(nick, _)| nick).unwrap_or(p))
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Last parameter, conventionally the free-text one.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Render as a protocol line without CRLF. Line breaks inside parameters
    /// are flattened to spaces.
    pub fn to_line(&self) -> String {
        let mut line = String::new();
        if let Some(prefix) = &self.prefix {
            line.push(':');
            line.push_str(prefix);
            line.push(' ');
        }
        line.push_str(&self.command);

        if let Some((last, init)) = self.params.split_last() {
            for param in init {
                line.push(' ');
                line.push_str(&sanitize(param));
            }
            line.push(' ');
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                line.push(':');
            }
            line.push_str(&sanitize(last));
        }
        line
    }
}

fn sanitize(param: &str) -> String {
    param.replace(['\r', '\n'], " ")
}

/// Bytes left for the text of `TOPIC <channel> :<text>` within one line.
pub fn topic_capacity(channel: &str) -> usize {
    let overhead = "TOPIC ".len() + channel.len() + " :".len() + 2;
    MAX_LINE_LENGTH.saturating_sub(overhead)
}

/// Truncate to at most `max` bytes without splitting a character.
fn truncate_at_char_boundary(line: &mut String, max: usize) {
    if line.len() <= max {
        return;
    }
    let mut cut = max;
    while !line.is_char_boundary(cut) {
        cut -= 1;
    }
    line.truncate(cut);
}

/// Codec for IRC lines.
#[derive(Debug, Default)]
pub struct IrcCodec;

impl IrcCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for IrcCodec {
    type Item = IrcMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(newline) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_INBOUND_LENGTH {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("IRC line exceeds {} bytes", MAX_INBOUND_LENGTH),
                    ));
                }
                return Ok(None);
            };

            let raw = src.split_to(newline + 1);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

            // Skip blank lines and keep scanning the buffer
            if let Some(message) = IrcMessage::parse(line) {
                return Ok(Some(message));
            }
        }
    }
}

impl Encoder<IrcMessage> for IrcCodec {
    type Error = io::Error;

    fn encode(&mut self, item: IrcMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut line = item.to_line();
        truncate_at_char_boundary(&mut line, MAX_LINE_LENGTH - 2);

        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// A framed IRC connection.
pub type IrcConnection<S> = Framed<S, IrcCodec>;

/// Create a new IRC connection from a stream.
pub fn new_irc_connection<S: AsyncRead + AsyncWrite>(stream: S) -> IrcConnection<S> {
    Framed::new(stream, IrcCodec::new())
}
