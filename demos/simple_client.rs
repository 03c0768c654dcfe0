//! Simple chat client example
//!
//! Connects to Twitch chat with the reconnect and throttle plugins
//! installed, joins a channel, and prints everything said in it.
//!
//! Run with:
//!
//! ```text
//! TMI_TOKEN=oauth:... TMI_NICK=mybot TMI_CHANNEL=somechannel \
//!     cargo run --example simple_client
//! ```

use std::env;
use std::sync::Arc;

use futures_util::StreamExt;

use tmi_client::{
    IrcState, ReconnectPlugin, ThrottlePlugin, TmiClient, TmiConfig, TwitchMessage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let token = env::var("TMI_TOKEN")?;
    let nick = env::var("TMI_NICK")?;
    let channel = env::var("TMI_CHANNEL").unwrap_or_else(|_| nick.clone());

    let client = TmiClient::new(TmiConfig::new(token, nick));
    client.register_plugin(ReconnectPlugin::new(&client))?;
    client.register_plugin(Arc::new(ThrottlePlugin::default()))?;

    let mut states = client.states();
    let mut messages = client.messages();
    client.connect().await;

    // Block until the login handshake finishes.
    while let Some(state) = states.next().await {
        println!("connection state: {:?}", state);
        if state == IrcState::Connected {
            break;
        }
    }

    client.join(&channel)?;

    println!("--- Listening for messages (Ctrl+C to exit) ---");
    while let Some(message) = messages.next().await {
        match message {
            TwitchMessage::Privmsg(raw) => {
                println!(
                    "[{}] {}: {}",
                    raw.channel.as_deref().unwrap_or("?"),
                    raw.author(),
                    raw.text.as_deref().unwrap_or("")
                );
            }
            TwitchMessage::Join(raw) => {
                println!("* {} joined {:?}", raw.author(), raw.channel);
            }
            TwitchMessage::Part(raw) => {
                println!("* {} left {:?}", raw.author(), raw.channel);
            }
            _ => {}
        }
    }

    Ok(())
}
