//! JOIN handling and join-failure numerics.

use crate::dispatch::{Context, Processor};
use crate::error::{ProcessorError, Severity};
use crate::event::Event;
use crate::line::Line;
use crate::outqueue::Priority;

/// Handles `JOIN`, including the extended-join parameter shape.
pub struct Join;

impl Processor for Join {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let source = line
            .source
            .clone()
            .ok_or_else(|| ProcessorError::fatal("JOIN without source"))?;
        let channel = ctx.require_param(line, 0)?.to_string();
        let nick = line.source_nick().unwrap_or_default().to_string();
        let is_self = ctx.session.is_local(&nick);

        {
            let client = ctx.session.get_or_create_client(&source);
            // extended-join carries account and realname.
            if let Some(account) = line.param(1) {
                client.account = match account {
                    "*" => None,
                    a => Some(a.to_string()),
                };
            }
            if let Some(realname) = line.param(2) {
                client.realname = realname.to_string();
            }
        }

        let folded_nick = ctx.session.fold(&nick);
        let known = ctx.session.channel(&channel).is_some();

        if !known {
            if !is_self {
                // A join for a channel we are not on: self-healing, the
                // server will not send us more about it.
                return Err(ProcessorError::Other {
                    severity: Severity::Desync,
                    message: format!("JOIN by {nick} for untracked channel {channel}"),
                });
            }
            self.self_join(ctx, &channel, &folded_nick)?;
            return Ok(());
        }

        if is_self {
            // Already tracking the channel. If our membership is recorded
            // this is a rejoin (netsplit heal, forced rejoin): rebuild
            // from scratch. If it is not, our state is corrupt.
            let has_membership = ctx
                .session
                .channel(&channel)
                .map(|c| c.has_member(&folded_nick))
                .unwrap_or(false);
            if !has_membership {
                return Err(ProcessorError::MembershipDesync {
                    channel: channel.clone(),
                });
            }
            ctx.session.remove_channel(&channel);
            self.self_join(ctx, &channel, &folded_nick)?;
            return Ok(());
        }

        let chan = ctx
            .session
            .channel_mut(&channel)
            .ok_or_else(|| ProcessorError::fatal("channel vanished"))?;
        let added = chan.add_member(folded_nick);
        let name = chan.name.clone();
        if added {
            ctx.emit(Event::ChannelJoin {
                channel: name,
                nick,
            });
        }
        Ok(())
    }
}

impl Join {
    fn self_join(
        &self,
        ctx: &mut Context<'_>,
        channel: &str,
        folded_self: &str,
    ) -> Result<(), ProcessorError> {
        let key = ctx.session.take_pending_join(channel);
        let chan = ctx.session.get_or_create_channel(channel);
        chan.key = key.filter(|k| !k.is_empty());
        chan.add_member(folded_self.to_string());
        let name = chan.name.clone();
        ctx.emit(Event::ChannelSelfJoin {
            channel: name.clone(),
        });
        if ctx.config.auto_list_modes {
            let modes: Vec<char> = ctx.session.chan_list_modes.modes().chars().collect();
            for mode in modes {
                ctx.send(Priority::Low, format!("MODE {name} +{mode}"));
            }
        }
        Ok(())
    }
}

/// Consumes the pending-join correlation for failed joins (403, 405,
/// 471, 473, 474, 475).
pub struct JoinFailed;

impl Processor for JoinFailed {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let channel = ctx.require_param(line, 1)?.to_string();
        ctx.session.take_pending_join(&channel);
        Ok(())
    }
}
