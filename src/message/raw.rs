//! The wire-format line parser.
//!
//! Turns one raw protocol line into a [`RawMessage`]. The parser assumes
//! well-formed server input and never fails: malformed lines yield
//! partial records with absent fields rather than errors. This matches
//! the error taxonomy of the crate, where parse anomalies are tolerated
//! silently and only transport-level trouble surfaces (as state
//! transitions).

use std::collections::HashMap;

/// Commands whose payload segment is not chat text.
///
/// `353` (RPL_NAMREPLY) carries a space-separated user list after the
/// second `:`; treating it as a message body would hand consumers a bogus
/// chat line, so `text` stays absent for it.
const TEXTLESS_COMMANDS: &[&str] = &["353"];

/// One parsed protocol line.
///
/// Constructed once per received line by [`parse_message`] and never
/// mutated afterwards; every subscriber holds its own clone.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawMessage {
    /// The exact line as received, surrounding whitespace trimmed.
    pub raw: String,
    /// Tags from the optional leading `@k1=v1;k2=v2` segment.
    ///
    /// Empty when the line carries no tag segment. Values are kept
    /// verbatim from the wire.
    pub tags: HashMap<String, String>,
    /// Origin of the line: the text between the leading `:` and the
    /// first space. For `:ronni!ronni@ronni.tmi.twitch.tv JOIN #dallas`
    /// the prefix is `ronni!ronni@ronni.tmi.twitch.tv`.
    pub prefix: String,
    /// Command name, e.g. `PRIVMSG` or `001`.
    pub command: Option<String>,
    /// Channel the line relates to, when present.
    pub channel: Option<String>,
    /// Payload after the second `:`, e.g. the chat text of a `PRIVMSG`.
    pub text: Option<String>,
}

impl RawMessage {
    /// Parses one protocol line. Never fails; see [`parse_message`].
    pub fn parse(line: &str) -> Self {
        parse_message(line)
    }

    /// The username part of the prefix: everything up to the first `!`
    /// or `.`, or the whole prefix if neither occurs.
    pub fn author(&self) -> &str {
        self.prefix
            .find(['!', '.'])
            .map_or(self.prefix.as_str(), |at| &self.prefix[..at])
    }
}

/// Parses one line received from the server into a [`RawMessage`].
///
/// Not meant for lines the client itself sends. The input is trimmed,
/// then consumed in order: optional tag segment, `:`-led metadata segment
/// (prefix, command, channel), optional `:`-led payload.
pub fn parse_message(line: &str) -> RawMessage {
    let raw = line.trim();
    let mut message = RawMessage {
        raw: raw.to_string(),
        tags: HashMap::new(),
        prefix: String::new(),
        command: None,
        channel: None,
        text: None,
    };

    let mut remaining = raw;

    if remaining.starts_with('@') {
        match remaining.split_once(' ') {
            Some((tag_segment, rest)) => {
                parse_tag_segment(tag_segment, &mut message.tags);
                remaining = rest;
            }
            // Nothing after the tags; the line is exhausted.
            None => {
                parse_tag_segment(remaining, &mut message.tags);
                return message;
            }
        }
    }

    // Drop the ':' opening the metadata segment.
    let remaining = remaining.get(1..).unwrap_or("");

    let (metadata, payload) = match remaining.split_once(':') {
        Some((metadata, payload)) => (metadata, Some(payload)),
        None => (remaining, None),
    };

    let mut words = metadata.split(' ');
    message.prefix = words.next().unwrap_or("").to_string();
    message.command = words.next().filter(|w| !w.is_empty()).map(str::to_string);
    message.channel = words.next().filter(|w| !w.is_empty()).map(str::to_string);

    if let Some(payload) = payload {
        let text = payload.trim();
        let textless = message
            .command
            .as_deref()
            .is_some_and(|command| TEXTLESS_COMMANDS.contains(&command));
        if !text.is_empty() && !textless {
            message.text = Some(text.to_string());
        }
    }

    message
}

/// Parses `@k1=v1;k2=v2` into the tag map. Pieces without a `=` are
/// dropped; for duplicate keys the last write wins.
fn parse_tag_segment(segment: &str, tags: &mut HashMap<String, String>) {
    let segment = segment.strip_prefix('@').unwrap_or(segment);
    for piece in segment.split(';') {
        if let Some((key, value)) = piece.split_once('=') {
            tags.insert(key.to_string(), value.to_string());
        }
    }
}
