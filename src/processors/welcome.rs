//! Registration (001) handling.

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;
use crate::outqueue::Priority;

/// Handles `RPL_WELCOME`.
///
/// The nickname parameter of 001 is authoritative: the placeholder local
/// client is promoted to it (servers may have truncated or mangled the
/// requested nick). A second 001 on a live session re-targets the local
/// identity the same way.
pub struct Welcome;

impl Processor for Welcome {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let nick = ctx.require_param(line, 0)?.to_string();

        if let Some(source) = &line.source {
            ctx.session.server_name = source.clone();
        }

        ctx.session.confirm_local_identity(&nick)?;

        let first = !ctx.session.registered;
        ctx.session.registered = true;
        if first {
            ctx.emit(Event::Registered);
            let joins: Vec<String> = ctx.config.auto_join.clone();
            for entry in joins {
                let (channel, key) = match entry.split_once(' ') {
                    Some((c, k)) => (c.to_string(), k.to_string()),
                    None => (entry, String::new()),
                };
                let cmd = if key.is_empty() {
                    format!("JOIN {channel}")
                } else {
                    format!("JOIN {channel} {key}")
                };
                ctx.send(Priority::Normal, cmd);
            }
        }
        Ok(())
    }
}
