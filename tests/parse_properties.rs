//! Property-based tests for chat line parsing.
//!
//! Uses proptest to generate random lines and verify that:
//! 1. Parsing never panics, no matter how mangled the input is
//! 2. Well-formed lines decompose into the components they were built from
//! 3. Parser invariants hold across random inputs

use proptest::prelude::*;
use tmi_client::parse_message;

// =============================================================================
// STRATEGIES - Generators for line components
// =============================================================================

/// Login name: letters, digits, underscores.
fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z_][a-zA-Z0-9_]{0,24}").expect("valid regex")
}

/// Command word. Numerics are fine, but 353 gets its trailing text
/// stripped by design, so it is excluded here and covered by a unit
/// test instead.
fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("PRIVMSG".to_string()),
        Just("JOIN".to_string()),
        Just("PART".to_string()),
        Just("USERNOTICE".to_string()),
        Just("001".to_string()),
        Just("366".to_string()),
    ]
}

/// Channel name with the leading `#`.
fn channel_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("#[a-z0-9_]{1,25}").expect("valid regex")
}

/// Trailing text without CR/LF; must not start or end with whitespace
/// because the parser trims the payload.
fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[!-~]([ -~]{0,100}[!-~])?").expect("valid regex")
}

/// Tag key: letters, digits, hyphens, optional `+`/vendor prefix.
fn tag_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\+?[a-zA-Z][a-zA-Z0-9\\-]{0,20}").expect("valid regex")
}

/// Tag value: anything except space, semicolon, CR, LF.
fn tag_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9._/=\\\\-]{0,40}").expect("valid regex")
}

fn tags_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((tag_key_strategy(), tag_value_strategy()), 0..8).prop_map(|mut tags| {
        // Duplicate keys are legal input but make the expected map
        // ambiguous, so keep one entry per key.
        tags.sort_by(|a, b| a.0.cmp(&b.0));
        tags.dedup_by(|a, b| a.0 == b.0);
        tags
    })
}

fn assemble(
    tags: &[(String, String)],
    nick: &str,
    command: &str,
    channel: &str,
    text: &str,
) -> String {
    let mut line = String::new();
    if !tags.is_empty() {
        line.push('@');
        let joined: Vec<String> = tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        line.push_str(&joined.join(";"));
        line.push(' ');
    }
    line.push_str(&format!(
        ":{nick}!{nick}@{nick}.tmi.twitch.tv {command} {channel} :{text}"
    ));
    line
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    /// The parser is total: any string at all produces a record.
    #[test]
    fn parse_never_panics(line in "\\PC*") {
        let _ = parse_message(&line);
    }

    /// Lines with protocol-ish punctuation sprinkled in still parse
    /// without panicking.
    #[test]
    fn parse_never_panics_on_protocol_noise(line in "[@:;=# !\\\\a-z0-9\r\n\t]*") {
        let _ = parse_message(&line);
    }

    /// A well-formed line decomposes back into its components.
    #[test]
    fn well_formed_line_decomposes(
        tags in tags_strategy(),
        nick in nickname_strategy(),
        command in command_strategy(),
        channel in channel_strategy(),
        text in text_strategy(),
    ) {
        let line = assemble(&tags, &nick, &command, &channel, &text);
        let parsed = parse_message(&line);

        prop_assert_eq!(parsed.raw.as_str(), line.as_str());
        prop_assert_eq!(parsed.prefix.as_str(), format!("{nick}!{nick}@{nick}.tmi.twitch.tv"));
        prop_assert_eq!(parsed.author(), nick.as_str());
        prop_assert_eq!(parsed.command.as_deref(), Some(command.as_str()));
        prop_assert_eq!(parsed.channel.as_deref(), Some(channel.as_str()));
        prop_assert_eq!(parsed.text.as_deref(), Some(text.as_str()));

        prop_assert_eq!(parsed.tags.len(), tags.len());
        for (key, value) in &tags {
            prop_assert_eq!(parsed.tags.get(key), Some(value));
        }
    }

    /// Tag values are kept verbatim: the first `=` splits key from
    /// value and everything after it (including further `=`) survives.
    #[test]
    fn tag_value_with_equals_survives(
        key in tag_key_strategy(),
        value in "[a-z0-9]{1,10}=[a-z0-9=]{1,10}",
    ) {
        let line = format!("@{key}={value} :n!n@n.tmi.twitch.tv PRIVMSG #c :hi");
        let parsed = parse_message(&line);
        prop_assert_eq!(parsed.tags.get(&key).map(String::as_str), Some(value.as_str()));
    }

    /// Leading and trailing whitespace never changes the outcome.
    #[test]
    fn surrounding_whitespace_is_ignored(
        nick in nickname_strategy(),
        channel in channel_strategy(),
        text in text_strategy(),
        pad_left in "[ \t]{0,5}",
        pad_right in "[ \t\r\n]{0,5}",
    ) {
        let line = format!(":{nick}!x@y PRIVMSG {channel} :{text}");
        let padded = format!("{pad_left}{line}{pad_right}");
        let mut plain = parse_message(&line);
        let padded_parsed = parse_message(&padded);
        // The raw field holds the trimmed input, so both agree in full.
        plain.raw = padded_parsed.raw.clone();
        prop_assert_eq!(plain, padded_parsed);
    }
}
