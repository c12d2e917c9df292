//! QUIT handling.

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;

/// Handles `QUIT`.
///
/// Emits one per-channel echo for every channel shared with the quitting
/// client, then the network-wide quit event, and drops the client record.
pub struct Quit;

impl Processor for Quit {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let nick = line
            .source_nick()
            .ok_or_else(|| ProcessorError::fatal("QUIT without source"))?
            .to_string();
        let reason = line.param(0).unwrap_or_default().to_string();
        let folded = ctx.session.fold(&nick);

        let shared: Vec<String> = ctx
            .session
            .channels()
            .filter(|c| c.has_member(&folded))
            .map(|c| c.name.clone())
            .collect();

        let mut events = Vec::with_capacity(shared.len() + 1);
        for channel in &shared {
            events.push(Event::ChannelQuit {
                channel: channel.clone(),
                nick: nick.clone(),
                reason: reason.clone(),
            });
        }
        events.push(Event::Quit {
            nick: nick.clone(),
            reason,
        });

        if ctx.config.remove_after_callback {
            for event in events {
                ctx.emit(event);
            }
            remove(ctx, &folded, &shared);
        } else {
            remove(ctx, &folded, &shared);
            for event in events {
                ctx.emit(event);
            }
        }
        Ok(())
    }
}

fn remove(ctx: &mut Context<'_>, folded_nick: &str, shared: &[String]) {
    for channel in shared {
        if let Some(chan) = ctx.session.channel_mut(channel) {
            chan.remove_member(folded_nick);
        }
    }
    ctx.session.remove_client(folded_nick);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::processors::testutil::Harness;

    #[test]
    fn quit_echoes_per_channel() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":me!u@h JOIN #other");
        h.feed(":alice!a@h JOIN #test");
        h.feed(":alice!a@h JOIN #other");
        let events = h.feed(":alice!a@h QUIT :gone");
        let kinds: Vec<EventKind> = events.iter().map(Event::kind).collect();
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == EventKind::ChannelQuit)
                .count(),
            2
        );
        assert_eq!(*kinds.last().unwrap(), EventKind::Quit);
        assert!(h.session.client("alice").is_none());
        assert!(!h.session.channel("#test").unwrap().has_member("alice"));
    }

    #[test]
    fn quit_without_shared_channels() {
        let mut h = Harness::new();
        h.feed(":srv 001 me :Welcome");
        h.feed(":alice!a@h PRIVMSG me :hi");
        let events = h.feed(":alice!a@h QUIT");
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::Quit { reason, .. } if reason.is_empty()));
    }
}
