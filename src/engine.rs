//! The session engine: wiring between transport, dispatch, and queue.
//!
//! [`IrcEngine`] owns the session state, the processor registry, the
//! output queue, and the line decoder. Bytes go in through
//! [`process_raw`](IrcEngine::process_raw) (or the async
//! [`run`](IrcEngine::run) driver); typed [`Event`]s come out; outbound
//! lines produced by processors are forwarded to the queue.
//!
//! Outgoing lines are also *observed* before they leave: JOINs feed the
//! pending-join correlation queues and list-mode queries feed the
//! per-channel query queue that disambiguates overloaded numerics.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::config::EngineConfig;
use crate::dispatch::{Context, Registry};
use crate::error::Result;
use crate::event::Event;
use crate::ignore::IgnoreList;
use crate::line::{scan_destination, Line, LineCodec, LineDecoder, Utf8Decoder};
use crate::outqueue::{LineSink, NoLimit, OutputQueue, Priority, RateLimitPolicy, WindowedRateLimiter};
use crate::processors;
use crate::state::Session;

/// A complete IRC client protocol session.
pub struct IrcEngine {
    config: EngineConfig,
    session: Session,
    registry: Registry,
    queue: Arc<OutputQueue>,
    decoder: Box<dyn LineDecoder>,
    ignore: IgnoreList,
}

impl IrcEngine {
    /// Create an engine writing outbound lines to `sink`.
    pub fn new(config: EngineConfig, sink: Box<dyn LineSink>) -> Result<Self> {
        let policy: Box<dyn RateLimitPolicy> = if config.rate_limit.enabled {
            Box::new(WindowedRateLimiter::new(
                config.rate_limit.threshold,
                Duration::from_millis(config.rate_limit.window_ms),
                Duration::from_millis(config.rate_limit.delay_ms),
            ))
        } else {
            Box::new(NoLimit)
        };
        let queue = OutputQueue::new(sink, policy);

        let mut registry = Registry::new();
        processors::register_defaults(&mut registry);

        let ignore = IgnoreList::from_patterns(&config.ignore)?;
        let session = Session::new(&config.nickname, config.case_mapping);

        Ok(Self {
            config,
            session,
            registry,
            queue,
            decoder: Box::new(Utf8Decoder),
            ignore,
        })
    }

    /// Replace the line decoder (e.g. with a
    /// [`CharsetDecoder`](crate::line::CharsetDecoder)).
    pub fn set_decoder(&mut self, decoder: Box<dyn LineDecoder>) {
        self.decoder = decoder;
    }

    /// The session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable session state, for application-level adjustments.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// The processor registry, for overriding command handling.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The output queue handle.
    pub fn queue(&self) -> &Arc<OutputQueue> {
        &self.queue
    }

    /// The ignore list.
    pub fn ignore_mut(&mut self) -> &mut IgnoreList {
        &mut self.ignore
    }

    /// Send the registration burst: CAP discovery, NICK, USER.
    pub fn start(&mut self) -> Result<()> {
        let nick = self.config.nickname.clone();
        let username = self.config.username.clone();
        let realname = self.config.realname.clone();
        self.send_line("CAP LS 302", Priority::High)?;
        self.send_line(&format!("NICK {nick}"), Priority::High)?;
        self.send_line(
            &format!("USER {username} 0 * :{realname}"),
            Priority::High,
        )?;
        Ok(())
    }

    /// Queue one outbound line, running the outgoing-line observers.
    pub fn send_line(&mut self, line: &str, priority: Priority) -> Result<()> {
        self.observe_outgoing(line);
        self.queue.send_line(line, priority)
    }

    /// Process one raw inbound line (without terminator).
    ///
    /// The raw bytes are scanned lossily for source and destination so
    /// the decoder can pick a per-target charset, then decoded and
    /// dispatched.
    pub fn process_raw(&mut self, raw: &[u8]) -> Result<Vec<Event>> {
        let lossy = String::from_utf8_lossy(raw);
        let (source, destination) = scan_destination(&lossy);
        let text = self
            .decoder
            .decode(raw, source.as_deref(), destination.as_deref());
        self.process_line(&text)
    }

    /// Process one decoded inbound line, returning the events it
    /// produced.
    pub fn process_line(&mut self, text: &str) -> Result<Vec<Event>> {
        let line = Line::parse(text);
        let now_ms = line
            .timestamp_ms()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        let mut events = Vec::new();
        let mut out = Vec::new();
        self.registry.dispatch(
            &mut Context {
                session: &mut self.session,
                config: &self.config,
                ignore: &self.ignore,
                events: &mut events,
                out: &mut out,
                now_ms,
            },
            &line,
        );

        for (priority, outbound) in out {
            self.send_line(&outbound, priority)?;
        }
        Ok(events)
    }

    /// Drive the engine from an async byte stream until EOF, invoking
    /// `on_event` for every event.
    pub async fn run<R, F>(&mut self, stream: R, mut on_event: F) -> Result<()>
    where
        R: AsyncRead + Unpin,
        F: FnMut(Event),
    {
        self.start()?;
        let mut framed = FramedRead::new(stream, LineCodec::new());
        while let Some(raw) = framed.next().await {
            let raw = raw?;
            for event in self.process_raw(&raw)? {
                on_event(event);
            }
        }
        Ok(())
    }

    /// Inspect an outgoing line before it leaves.
    ///
    /// `JOIN a,b key1,key2` records one pending-join correlation per
    /// channel. `MODE <channel> <letters>` where every letter is a list
    /// mode records the letters as outstanding list queries.
    fn observe_outgoing(&mut self, line: &str) {
        let parsed = Line::parse(line);
        match parsed.command.to_ascii_uppercase().as_str() {
            "JOIN" => {
                let Some(channels) = parsed.param(0) else { return };
                let keys: Vec<&str> = parsed
                    .param(1)
                    .map(|k| k.split(',').collect())
                    .unwrap_or_default();
                let channels: Vec<String> =
                    channels.split(',').map(str::to_string).collect();
                for (i, channel) in channels.iter().enumerate() {
                    if channel.is_empty() {
                        continue;
                    }
                    let key = keys.get(i).copied().unwrap_or_default();
                    self.session.push_pending_join(channel, key);
                }
            }
            "MODE" => {
                if parsed.params.len() != 2 {
                    return;
                }
                let (Some(channel), Some(letters)) = (parsed.param(0), parsed.param(1))
                else {
                    return;
                };
                if !self.session.is_channel_name(channel) {
                    return;
                }
                let letters = letters.strip_prefix('+').unwrap_or(letters);
                if letters.is_empty()
                    || !letters
                        .chars()
                        .all(|c| self.session.chan_list_modes.is_mode(c))
                {
                    return;
                }
                let channel = channel.to_string();
                let modes: Vec<char> = letters.chars().collect();
                if let Some(chan) = self.session.channel_mut(&channel) {
                    for mode in modes {
                        chan.list_mode_queue.push_back(mode);
                    }
                }
            }
            _ => {}
        }
    }
}

/// [`LineSink`] writing into a tokio unbounded channel, for bridging the
/// sender thread to an async write half.
pub struct ChannelSink(pub tokio::sync::mpsc::UnboundedSender<String>);

impl LineSink for ChannelSink {
    fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.0
            .send(line.to_string())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn engine() -> (IrcEngine, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel::<String>();
        let sink = move |line: &str| -> std::io::Result<()> {
            tx.send(line.to_string()).ok();
            Ok(())
        };
        let mut config = EngineConfig::default();
        config.nickname = "me".into();
        config.username = "u".into();
        config.realname = "r".into();
        config.rate_limit.enabled = false;
        let engine = IrcEngine::new(config, Box::new(sink)).unwrap();
        // Everything below asserts on direct writes.
        engine.queue().set_enabled(false);
        (engine, rx)
    }

    fn drain(rx: &mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(line);
        }
        out
    }

    #[test]
    fn start_sends_registration_burst() {
        let (mut engine, rx) = engine();
        engine.start().unwrap();
        assert_eq!(
            drain(&rx),
            vec!["CAP LS 302", "NICK me", "USER u 0 * :r"]
        );
    }

    #[test]
    fn outgoing_join_records_pending() {
        let (mut engine, _rx) = engine();
        engine
            .send_line("JOIN #a,#b onlykey", Priority::Normal)
            .unwrap();
        assert_eq!(engine.session().pending_join_len(), 2);
        let key = engine.session_mut().take_pending_join("#a");
        assert_eq!(key.as_deref(), Some("onlykey"));
        let key = engine.session_mut().take_pending_join("#b");
        assert_eq!(key.as_deref(), Some(""));
    }

    #[test]
    fn outgoing_list_query_feeds_queue() {
        let (mut engine, _rx) = engine();
        engine.process_line(":srv 001 me :Welcome").unwrap();
        engine.process_line(":me!u@h JOIN #test").unwrap();
        // The auto list query went through send_line and was observed.
        let chan = engine.session().channel("#test").unwrap();
        assert_eq!(chan.list_mode_queue.front(), Some(&'b'));
    }

    #[test]
    fn mode_with_argument_is_not_a_list_query() {
        let (mut engine, _rx) = engine();
        engine.process_line(":srv 001 me :Welcome").unwrap();
        engine.process_line(":me!u@h JOIN #test").unwrap();
        let before = engine
            .session()
            .channel("#test")
            .unwrap()
            .list_mode_queue
            .len();
        engine
            .send_line("MODE #test +b *!*@bad.host", Priority::Normal)
            .unwrap();
        engine.send_line("MODE #test +o alice", Priority::Normal).unwrap();
        let after = engine
            .session()
            .channel("#test")
            .unwrap()
            .list_mode_queue
            .len();
        assert_eq!(before, after);
    }

    #[test]
    fn process_raw_decodes_before_dispatch() {
        let (mut engine, rx) = engine();
        engine.process_raw(b"PING :token").unwrap();
        assert_eq!(drain(&rx), vec!["PONG :token"]);
    }

    #[test]
    fn events_flow_out() {
        let (mut engine, _rx) = engine();
        let events = engine.process_line(":srv 001 me :Welcome").unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::Registered)));
        assert!(engine.session().registered);
    }

    #[tokio::test]
    async fn async_driver_end_to_end() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let mut config = EngineConfig::default();
        config.nickname = "me".into();
        config.rate_limit.enabled = false;
        let mut engine = IrcEngine::new(config, Box::new(ChannelSink(tx))).unwrap();
        engine.queue().set_enabled(false);

        let input = b":srv 001 me :Welcome\r\nPING :x\r\n".to_vec();
        let mut events = Vec::new();
        engine
            .run(&input[..], |e| events.push(e))
            .await
            .unwrap();

        assert!(events.iter().any(|e| matches!(e, Event::Registered)));
        let mut sent = Vec::new();
        while let Ok(line) = rx.try_recv() {
            sent.push(line);
        }
        assert!(sent.contains(&"PONG :x".to_string()));
    }
}
