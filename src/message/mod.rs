mod raw;
mod typed;

pub use self::raw::{parse_message, RawMessage};
pub use self::typed::TwitchMessage;
