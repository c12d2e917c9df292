//! Topic handling (TOPIC, 332, 333, 329).

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;

/// Handles topic changes and the join-time topic numerics.
///
/// On join the server sends 332 (text) then 333 (setter and time); the
/// event is emitted on 333 so consumers see complete metadata. A live
/// `TOPIC` emits immediately with `is_update` set.
pub struct Topic;

impl Processor for Topic {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        match line.command.as_str() {
            "TOPIC" => {
                let channel = ctx.require_param(line, 0)?.to_string();
                let text = ctx.require_param(line, 1)?.to_string();
                let setter = line.source.clone().unwrap_or_default();
                let time = ctx.now_ms / 1000;
                let Some(chan) = ctx.session.channel_mut(&channel) else {
                    tracing::debug!(%channel, "TOPIC for untracked channel");
                    return Ok(());
                };
                chan.topic = text;
                chan.topic_setter = setter;
                chan.topic_time = time;
                let name = chan.name.clone();
                ctx.emit(Event::ChannelTopic {
                    channel: name,
                    is_update: true,
                });
                Ok(())
            }
            "332" => {
                let channel = ctx.require_param(line, 1)?.to_string();
                let text = ctx.require_param(line, 2)?.to_string();
                if let Some(chan) = ctx.session.channel_mut(&channel) {
                    chan.topic = text;
                }
                Ok(())
            }
            "333" => {
                let channel = ctx.require_param(line, 1)?.to_string();
                let setter = ctx.require_param(line, 2)?.to_string();
                let time: i64 = line
                    .param(3)
                    .and_then(|t| t.parse().ok())
                    .unwrap_or_default();
                let Some(chan) = ctx.session.channel_mut(&channel) else {
                    return Ok(());
                };
                chan.topic_setter = setter;
                chan.topic_time = time;
                let name = chan.name.clone();
                ctx.emit(Event::ChannelTopic {
                    channel: name,
                    is_update: false,
                });
                Ok(())
            }
            // 329: channel creation time.
            _ => {
                let channel = ctx.require_param(line, 1)?.to_string();
                let time: i64 = line
                    .param(2)
                    .and_then(|t| t.parse().ok())
                    .unwrap_or_default();
                if let Some(chan) = ctx.session.channel_mut(&channel) {
                    chan.create_time = time;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testutil::Harness;

    #[test]
    fn join_time_topic_emits_on_333() {
        let mut h = Harness::new();
        h.join_test_channel();
        let events = h.feed(":srv 332 me #test :the topic");
        assert!(events.iter().all(|e| !matches!(e, Event::ChannelTopic { .. })));
        let events = h.feed(":srv 333 me #test op!o@h 1600000000");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::ChannelTopic { is_update: false, .. }
        )));
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.topic, "the topic");
        assert_eq!(chan.topic_setter, "op!o@h");
        assert_eq!(chan.topic_time, 1_600_000_000);
    }

    #[test]
    fn live_topic_update() {
        let mut h = Harness::new();
        h.join_test_channel();
        let events = h.feed(":op!o@h TOPIC #test :new topic");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::ChannelTopic { is_update: true, .. }
        )));
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.topic, "new topic");
        assert_eq!(chan.topic_setter, "op!o@h");
    }

    #[test]
    fn creation_time_numeric() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":srv 329 me #test 1500000000");
        assert_eq!(
            h.session.channel("#test").unwrap().create_time,
            1_500_000_000
        );
    }
}
