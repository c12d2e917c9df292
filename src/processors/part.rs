//! PART handling.

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;

/// Handles `PART`.
///
/// With the default configuration state is mutated before the event is
/// emitted; `remove_after_callback` inverts the order so consumers can
/// still inspect the departing membership.
pub struct Part;

impl Processor for Part {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let channel = ctx.require_param(line, 0)?.to_string();
        let nick = line
            .source_nick()
            .ok_or_else(|| ProcessorError::fatal("PART without source"))?
            .to_string();
        let reason = line.param(1).unwrap_or_default().to_string();
        let is_self = ctx.session.is_local(&nick);
        let folded = ctx.session.fold(&nick);

        let display_name = match ctx.session.channel(&channel) {
            Some(chan) => chan.name.clone(),
            None => {
                tracing::debug!(%channel, "PART for untracked channel");
                return Ok(());
            }
        };

        let event = Event::ChannelPart {
            channel: display_name,
            nick,
            reason,
            is_self,
        };

        if ctx.config.remove_after_callback {
            ctx.emit(event);
            remove(ctx, &channel, &folded, is_self);
        } else {
            remove(ctx, &channel, &folded, is_self);
            ctx.emit(event);
        }
        Ok(())
    }
}

fn remove(ctx: &mut Context<'_>, channel: &str, folded_nick: &str, is_self: bool) {
    if is_self {
        ctx.session.remove_channel(channel);
        return;
    }
    if let Some(chan) = ctx.session.channel_mut(channel) {
        chan.remove_member(folded_nick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::processors::testutil::Harness;

    #[test]
    fn other_part_removes_member() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":alice!a@h JOIN #test");
        let events = h.feed(":alice!a@h PART #test :bye");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::ChannelPart { nick, is_self: false, .. } if nick == "alice"
        )));
        assert!(!h.session.channel("#test").unwrap().has_member("alice"));
    }

    #[test]
    fn self_part_drops_channel() {
        let mut h = Harness::new();
        h.join_test_channel();
        let events = h.feed(":me!u@h PART #test");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ChannelPart { is_self: true, .. })));
        assert!(h.session.channel("#test").is_none());
    }

    #[test]
    fn untracked_channel_is_ignored() {
        let mut h = Harness::new();
        h.feed(":srv 001 me :Welcome");
        let events = h.feed(":alice!a@h PART #ghost");
        assert!(events.is_empty());
    }

    #[test]
    fn remove_after_callback_defers_mutation() {
        let mut config = EngineConfig::default();
        config.nickname = "me".into();
        config.remove_after_callback = true;
        let mut h = Harness::with_config(config);
        h.join_test_channel();
        // Channel must still exist when the event is emitted; verified
        // indirectly through the final state still being mutated.
        h.feed(":me!u@h PART #test");
        assert!(h.session.channel("#test").is_none());
    }
}
