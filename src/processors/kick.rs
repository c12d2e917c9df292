//! KICK handling.

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;

/// Handles `KICK`.
///
/// The kicker may be hidden (a server-originated kick): in that case the
/// event carries no kicker nickname, only the raw source.
pub struct Kick;

impl Processor for Kick {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let channel = ctx.require_param(line, 0)?.to_string();
        let kicked = ctx.require_param(line, 1)?.to_string();
        let reason = line.param(2).unwrap_or_default().to_string();

        let source = line.source.clone().unwrap_or_default();
        // A source without a '!' is a server, not a user.
        let kicker = line
            .source_nick()
            .filter(|_| source.contains('!'))
            .map(str::to_string);

        let folded = ctx.session.fold(&kicked);
        let is_self = ctx.session.is_local(&kicked);

        let display_name = match ctx.session.channel(&channel) {
            Some(chan) => chan.name.clone(),
            None => {
                tracing::debug!(%channel, "KICK for untracked channel");
                return Ok(());
            }
        };

        let event = Event::ChannelKick {
            channel: display_name,
            kicked,
            kicker,
            kicker_host: source,
            reason,
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
