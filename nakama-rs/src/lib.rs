//! Nakama Rust Client SDK
//!
//! Client library for the Nakama game server: a REST client for accounts,
//! social features and storage, plus a realtime client for chat, matches,
//! matchmaking, status and parties.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use nakama_rs::rt::{ChannelType, RtCallback, RtClientListener, RtClientProtocol, MatchData};
//! use nakama_rs::{NakamaClient, Result};
//!
//! struct Printer;
//!
//! impl RtClientListener for Printer {
//!     fn on_match_data(&self, data: &MatchData) {
//!         println!("op {} from {}", data.op_code, data.presence.user_id);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Create client
//!     let client = NakamaClient::builder().host("127.0.0.1").port(7350).build()?;
//!
//!     // Authenticate
//!     let session = client.authenticate_device("my-device-id", true, None).await?;
//!     println!("Logged in as: {}", session.user_id);
//!
//!     // Connect the realtime channel
//!     let rt = Arc::new(client.create_rt_client());
//!     rt.set_listener(Arc::new(Printer));
//!     rt.spawn_ticker(Duration::from_millis(50));
//!     rt.connect(&session, true, RtClientProtocol::Json).await?;
//!
//!     // Join a chat room
//!     let (callback, joined) = RtCallback::oneshot();
//!     rt.join_chat("lobby", ChannelType::Room, None, None, callback);
//!     let channel = joined.await?;
//!     println!("joined {}", channel.id);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
#[cfg(feature = "logging")]
pub mod logging;
mod registry;
pub mod rt;
mod serde_ext;
mod session;
mod types;

pub use client::{NakamaClient, NakamaClientBuilder};
pub use config::{ClientConfig, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SERVER_KEY, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use registry::{ClientHandle, ClientRegistry};
pub use session::Session;
pub use types::*;
