//! NAMES replies (353/366).

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;

/// Handles `RPL_NAMREPLY` and `RPL_ENDOFNAMES`.
///
/// The first 353 of a burst rebuilds the membership from scratch;
/// stacked prefixes (multi-prefix) and `nick!user@host` entries
/// (userhost-in-names) are both understood.
pub struct Names;

impl Processor for Names {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        match line.command.as_str() {
            "353" => self.on_names(ctx, line),
            _ => self.on_end(ctx, line),
        }
    }
}

impl Names {
    fn on_names(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        // Params: me, visibility symbol, channel, name list.
        let channel = ctx.require_param(line, 2)?.to_string();
        let names = ctx.require_param(line, 3)?.to_string();

        let prefixes = ctx.session.user_prefixes.clone();
        let mapping = ctx.session.case_mapping();

        for entry in names.split(' ').filter(|n| !n.is_empty()) {
            let mut rest = entry;
            let mut modes = String::new();
            while let Some(c) = rest.chars().next() {
                match prefixes.mode_for(c) {
                    Some(mode) => {
                        modes = prefixes.insert_mode(&modes, mode);
                        rest = &rest[c.len_utf8()..];
                    }
                    None => break,
                }
            }
            if rest.is_empty() {
                continue;
            }
            let nick = rest.split(['!', '@']).next().unwrap_or(rest).to_string();
            ctx.session.get_or_create_client(rest);
            let folded = mapping.to_lower(&nick);

            let Some(chan) = ctx.session.channel_mut(&channel) else {
                tracing::debug!(%channel, "NAMES for untracked channel");
                return Ok(());
            };
            if !chan.adding_names {
                chan.clear_members();
                chan.adding_names = true;
            }
            chan.add_member(folded.clone());
            if let Some(member) = chan.member_mut(&folded) {
                member.modes = modes;
            }
        }
        Ok(())
    }

    fn on_end(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let channel = ctx.require_param(line, 1)?.to_string();
        let Some(chan) = ctx.session.channel_mut(&channel) else {
            return Ok(());
        };
        chan.adding_names = false;
        let name = chan.name.clone();
        ctx.emit(Event::ChannelGotNames { channel: name });
        Ok(())
    }
}
