//! Channel name helpers.

/// Extension trait for converting between channel names and usernames.
///
/// Twitch channel names are the broadcaster's username prefixed with `#`;
/// commands accept either form, so callers normalize through this trait.
pub trait ChannelExt {
    /// Returns the name in channel form (`#name`).
    fn as_channel_name(&self) -> String;

    /// Returns the name in username form (no leading `#`).
    fn channel_as_username(&self) -> &str;
}

impl ChannelExt for str {
    fn as_channel_name(&self) -> String {
        if self.starts_with('#') {
            self.to_string()
        } else {
            format!("#{}", self)
        }
    }

    fn channel_as_username(&self) -> &str {
        self.strip_prefix('#').unwrap_or(self)
    }
}
