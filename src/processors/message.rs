//! PRIVMSG and NOTICE delivery, including CTCP.

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;

const CTCP_DELIM: char = '\u{1}';

/// Handles `PRIVMSG` and `NOTICE`.
///
/// Classification happens along two axes: the target (a status-prefixed
/// channel, a channel, ourselves, or something unknown) and the payload
/// (plain text, CTCP ACTION, other CTCP, or a CTCP reply for notices).
/// Sources matching the ignore list are dropped before any event fires.
pub struct Message;

enum Payload {
    Plain(String),
    Action(String),
    Ctcp { ctcp_type: String, args: String },
}

fn split_payload(text: &str) -> Payload {
    let Some(inner) = text.strip_prefix(CTCP_DELIM) else {
        return Payload::Plain(text.to_string());
    };
    // The closing delimiter is customarily present but not required.
    let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
    let (ctcp_type, args) = match inner.split_once(' ') {
        Some((t, a)) => (t.to_string(), a.to_string()),
        None => (inner.to_string(), String::new()),
    };
    if ctcp_type.eq_ignore_ascii_case("ACTION") {
        Payload::Action(args)
    } else {
        Payload::Ctcp { ctcp_type, args }
    }
}

impl Processor for Message {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let target = ctx.require_param(line, 0)?.to_string();
        let text = line.param(1).unwrap_or_default().to_string();
        let is_notice = line.command.eq_ignore_ascii_case("NOTICE");

        let source = match &line.source {
            Some(s) => s.clone(),
            None => ctx.session.server_name.clone(),
        };
        if ctx.ignore.matches(&source) {
            tracing::trace!(%source, "ignored message source");
            return Ok(());
        }
        if let Some(s) = &line.source {
            if s.contains('!') {
                ctx.session.get_or_create_client(s);
            }
        }

        let payload = split_payload(&text);

        // Status-prefixed channel target (`@#channel`): restricted
        // delivery, plain payloads only.
        if let Some(first) = target.chars().next() {
            let rest = &target[first.len_utf8()..];
            if ctx.session.user_prefixes.is_prefix(first) && ctx.session.is_channel_name(rest) {
                if let Payload::Plain(text) = payload {
                    let channel = rest.to_string();
                    let event = if is_notice {
                        Event::ChannelModeNotice {
                            prefix: first,
                            channel,
                            source,
                            text,
                        }
                    } else {
                        Event::ChannelModeMessage {
                            prefix: first,
                            channel,
                            source,
                            text,
                        }
                    };
                    ctx.emit(event);
                    return Ok(());
                }
                // CTCP to a status target degrades to the plain channel
                // shape below.
            }
        }

        let channel_target = ctx.session.is_channel_name(&target)
            || target
                .chars()
                .next()
                .map(|c| {
                    ctx.session.user_prefixes.is_prefix(c)
                        && ctx.session.is_channel_name(&target[c.len_utf8()..])
                })
                .unwrap_or(false);
        let channel_name = if channel_target {
            let mut t = target.as_str();
            while let Some(c) = t.chars().next() {
                if ctx.session.user_prefixes.is_prefix(c) {
                    t = &t[c.len_utf8()..];
                } else {
                    break;
                }
            }
            t.to_string()
        } else {
            target.clone()
        };

        let event = if channel_target {
            let channel = channel_name;
            match (payload, is_notice) {
                (Payload::Plain(text), false) => Event::ChannelMessage {
                    channel,
                    source,
                    text,
                },
                (Payload::Plain(text), true) => Event::ChannelNotice {
                    channel,
                    source,
                    text,
                },
                (Payload::Action(text), _) => Event::ChannelAction {
                    channel,
                    source,
                    text,
                },
                (Payload::Ctcp { ctcp_type, args }, false) => Event::ChannelCtcp {
                    channel,
                    source,
                    ctcp_type,
                    args,
                },
                (Payload::Ctcp { ctcp_type, args }, true) => Event::ChannelCtcpReply {
                    channel,
                    source,
                    ctcp_type,
                    args,
                },
            }
        } else if ctx.session.is_local(&target) {
            match (payload, is_notice) {
                (Payload::Plain(text), false) => Event::PrivateMessage { source, text },
                (Payload::Plain(text), true) => Event::PrivateNotice { source, text },
                (Payload::Action(text), _) => Event::PrivateAction { source, text },
                (Payload::Ctcp { ctcp_type, args }, false) => {
                    Event::PrivateCtcp {
                        source,
                        ctcp_type,
                        args,
                    }
                }
                (Payload::Ctcp { ctcp_type, args }, true) => Event::PrivateCtcpReply {
                    source,
                    ctcp_type,
                    args,
                },
            }
        } else {
            match (payload, is_notice) {
                (Payload::Plain(text), false) => Event::UnknownMessage {
                    target,
                    source,
                    text,
                },
                (Payload::Plain(text), true) => Event::UnknownNotice {
                    target,
                    source,
                    text,
                },
                (Payload::Action(text), _) => Event::UnknownAction {
                    target,
                    source,
                    text,
                },
                (Payload::Ctcp { ctcp_type, args }, false) => Event::UnknownCtcp {
                    target,
                    source,
                    ctcp_type,
                    args,
                },
                (Payload::Ctcp { ctcp_type, args }, true) => Event::UnknownCtcpReply {
                    target,
                    source,
                    ctcp_type,
                    args,
                },
            }
        };
        ctx.emit(event);
        Ok(())
    }
}

/// Handles the pre-registration `NOTICE AUTH` pseudo-command.
pub struct NoticeAuth;

impl Processor for NoticeAuth {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let text = line.param(1).unwrap_or_default().to_string();
        ctx.emit(Event::NoticeAuth { text });
        Ok(())
    }
}
