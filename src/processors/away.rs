//! Away-state tracking (301, 305, 306, AWAY, WHO flags).

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;
use crate::state::AwayState;

/// Handles every line that reveals away state.
///
/// Away state is three-valued (`Unknown` until first observed); events
/// fire only on actual transitions so repeated 301s for the same away
/// user stay quiet.
pub struct Away;

impl Processor for Away {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        match line.command.as_str() {
            "301" => {
                let nick = ctx.require_param(line, 1)?.to_string();
                let reason = line.param(2).unwrap_or_default().to_string();
                set_away(ctx, &nick, AwayState::Away, reason);
                Ok(())
            }
            "305" => {
                let nick = ctx.session.local_nick().to_string();
                set_away(ctx, &nick, AwayState::Here, String::new());
                Ok(())
            }
            "306" => {
                let nick = ctx.session.local_nick().to_string();
                set_away(ctx, &nick, AwayState::Away, String::new());
                Ok(())
            }
            "AWAY" => {
                let nick = line
                    .source_nick()
                    .ok_or_else(|| ProcessorError::fatal("AWAY without source"))?
                    .to_string();
                match line.param(0) {
                    Some(reason) => {
                        set_away(ctx, &nick, AwayState::Away, reason.to_string())
                    }
                    None => set_away(ctx, &nick, AwayState::Here, String::new()),
                }
                Ok(())
            }
            // 352: WHO reply; the flags field starts with H (here) or G
            // (gone).
            _ => {
                let username = ctx.require_param(line, 2)?.to_string();
                let hostname = ctx.require_param(line, 3)?.to_string();
                let nick = ctx.require_param(line, 5)?.to_string();
                let flags = ctx.require_param(line, 6)?.to_string();
                if let Some(client) = ctx.session.client_mut(&nick) {
                    client.username = username;
                    client.hostname = hostname;
                }
                match flags.chars().next() {
                    Some('H') => set_away(ctx, &nick, AwayState::Here, String::new()),
                    Some('G') => set_away(ctx, &nick, AwayState::Away, String::new()),
                    _ => {}
                }
                Ok(())
            }
        }
    }
}

/// Apply an away-state observation, emitting events on transition only.
fn set_away(ctx: &mut Context<'_>, nick: &str, state: AwayState, reason: String) {
    let is_self = ctx.session.is_local(nick);
    let folded = ctx.session.fold(nick);

    let Some(client) = ctx.session.client_mut(nick) else {
        tracing::trace!(%nick, "away state for unknown client");
        return;
    };
    let previous = client.away;
    client.away = state;
    if state == AwayState::Away {
        if !reason.is_empty() {
            client.away_reason = reason.clone();
        }
    } else {
        client.away_reason.clear();
    }

    if previous == state {
        return;
    }
    let away = state == AwayState::Away;

    if is_self {
        ctx.emit(Event::AwayStateSelf {
            away,
            reason: reason.clone(),
        });
    }
    ctx.emit(Event::AwayStateUser {
        nick: nick.to_string(),
        away,
        reason,
    });

    let shared: Vec<String> = ctx
        .session
        .channels()
        .filter(|c| c.has_member(&folded))
        .map(|c| c.name.clone())
        .collect();
    for channel in shared {
        ctx.emit(Event::AwayStateChannelUser {
            channel,
            nick: nick.to_string(),
            away,
        });
    }
}
