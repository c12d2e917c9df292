//! irctide: an IRC client protocol session engine.
//!
//! This crate turns a raw IRC byte stream into typed events while
//! maintaining the session state a client needs: who is on which channel
//! with which modes, what the server supports, how names compare, and
//! what is still outstanding from our own requests. Outbound traffic
//! goes through a prioritized, rate-limited queue.
//!
//! The layering, bottom up:
//!
//! - [`line`]: framing, charset decoding, and tokenization
//! - [`casemap`], [`mode`], [`isupport`]: the protocol vocabulary learned
//!   at runtime from the server
//! - [`state`]: clients, channels, capabilities, and the [`Session`]
//!   aggregate
//! - [`dispatch`] and [`processors`]: one processor per command or
//!   numeric, mutating state and emitting [`Event`]s
//! - [`outqueue`]: the outbound priority queue
//! - [`engine`]: the [`IrcEngine`] tying it all together
//!
//! # Example
//!
//! ```no_run
//! use irctide::{ChannelSink, EngineConfig, Event, IrcEngine};
//!
//! # async fn demo(stream: tokio::net::tcp::OwnedReadHalf) -> irctide::Result<()> {
//! let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
//! let config = EngineConfig {
//!     nickname: "tidal".into(),
//!     auto_join: vec!["#rust".into()],
//!     ..Default::default()
//! };
//! let mut engine = IrcEngine::new(config, Box::new(ChannelSink(tx)))?;
//! engine
//!     .run(stream, |event| {
//!         if let Event::ChannelMessage { channel, source, text } = event {
//!             println!("[{channel}] <{source}> {text}");
//!         }
//!     })
//!     .await
//! # }
//! ```
//!
//! References:
//! - <https://modern.ircdocs.horse/>
//! - <https://ircv3.net/irc/>
//! - RFC 1459, RFC 2812

#![warn(missing_docs)]

pub mod casemap;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod ignore;
pub mod isupport;
pub mod line;
pub mod mode;
pub mod outqueue;
pub mod processors;
pub mod state;

pub use casemap::CaseMapping;
pub use config::{EngineConfig, RateLimitConfig};
pub use dispatch::{Context, DispatchOutcome, Processor, Registry};
pub use engine::{ChannelSink, IrcEngine};
pub use error::{EngineError, ProcessorError, Result, Severity};
pub use event::{Event, EventKind};
pub use ignore::IgnoreList;
pub use isupport::{Isupport, ServerFamily};
pub use line::{Line, LineCodec, LineDecoder, MAX_LINE_LEN};
pub use outqueue::{LineSink, OutputQueue, Priority};
pub use state::Session;
