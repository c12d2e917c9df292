//! MODE handling: live changes, 324 discovery, 221 user modes.

use crate::dispatch::{Context, Processor};
use crate::error::{ProcessorError, Severity};
use crate::event::Event;
use crate::line::Line;
use crate::state::ListModeEntry;

/// Handles `MODE`, `RPL_CHANNELMODEIS` (324) and `RPL_UMODEIS` (221).
///
/// Mode letters are classified against the managers learned from
/// ISUPPORT: prefix modes mutate a membership, list modes mutate a list
/// collection, parameterized modes store their value, boolean modes edit
/// the channel's canonical mode string. An unknown letter is learned as
/// boolean with a warning rather than derailing the whole change.
pub struct Mode;

impl Processor for Mode {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        match line.command.as_str() {
            "221" => {
                let modestring = ctx.require_param(line, 1)?.to_string();
                if let Some(client) = ctx.session.local_client_mut() {
                    client.modes.clear();
                }
                let modes = apply_user_modes(ctx, &modestring);
                ctx.emit(Event::UserModesDiscovered { modes });
                Ok(())
            }
            "324" => {
                let channel = ctx.require_param(line, 1)?.to_string();
                let modestring = ctx.require_param(line, 2)?.to_string();
                let source = line.source.clone().unwrap_or_default();
                apply_channel_modes(
                    ctx,
                    &line.raw,
                    &channel,
                    &source,
                    &modestring,
                    &line.params[3..],
                    false,
                )
            }
            _ => {
                let target = ctx.require_param(line, 0)?.to_string();
                if ctx.session.is_channel_name(&target) {
                    let modestring = ctx.require_param(line, 1)?.to_string();
                    let source = line.source.clone().unwrap_or_default();
                    apply_channel_modes(
                        ctx,
                        &line.raw,
                        &target,
                        &source,
                        &modestring,
                        &line.params[2..],
                        true,
                    )
                } else {
                    if !ctx.session.is_local(&target) {
                        tracing::debug!(%target, "user MODE for someone else");
                        return Ok(());
                    }
                    let modestring = ctx.require_param(line, 1)?.to_string();
                    let modes = apply_user_modes(ctx, &modestring);
                    ctx.emit(Event::UserModesChanged { modes });
                    Ok(())
                }
            }
        }
    }
}

/// Apply a user-mode string to the local client, returning the result.
fn apply_user_modes(ctx: &mut Context<'_>, modestring: &str) -> String {
    let manager = ctx.session.user_modes.clone();
    let mut modes = ctx
        .session
        .local_client()
        .map(|c| c.modes.clone())
        .unwrap_or_default();
    let mut adding = true;
    for c in modestring.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            _ => {
                ctx.session.user_modes.add(c);
                modes = if adding {
                    manager.insert_mode(&modes, c)
                } else {
                    manager.remove_mode(&modes, c)
                };
            }
        }
    }
    if let Some(client) = ctx.session.local_client_mut() {
        client.modes = modes.clone();
    }
    modes
}

fn next_arg(
    args: &[String],
    idx: &mut usize,
    mode: char,
    target: &str,
) -> Result<String, ProcessorError> {
    let arg = args
        .get(*idx)
        .cloned()
        .ok_or_else(|| ProcessorError::MissingModeParameter {
            mode,
            target: target.to_string(),
        })?;
    *idx += 1;
    Ok(arg)
}

fn apply_channel_modes(
    ctx: &mut Context<'_>,
    raw: &str,
    channel: &str,
    source: &str,
    modestring: &str,
    args: &[String],
    emit_singles: bool,
) -> Result<(), ProcessorError> {
    let prefixes = ctx.session.user_prefixes.clone();
    let list_modes = ctx.session.chan_list_modes.clone();
    let always_param = ctx.session.chan_always_param_modes.clone();
    let set_param = ctx.session.chan_set_param_modes.clone();
    let bool_modes = ctx.session.chan_bool_modes.clone();
    let mapping = ctx.session.case_mapping();
    let now_s = ctx.now_ms / 1000;

    let mut learned: Vec<char> = Vec::new();

    let session = &mut *ctx.session;
    let events = &mut *ctx.events;

    let Some(chan) = session.channel_mut(channel) else {
        tracing::debug!(%channel, "MODE for untracked channel");
        return Ok(());
    };
    let channel_name = chan.name.clone();

    let mut adding = true;
    let mut arg_idx = 0usize;

    for c in modestring.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            _ if prefixes.is_mode(c) => {
                let target = next_arg(args, &mut arg_idx, c, &channel_name)?;
                let folded = mapping.to_lower(&target);
                match chan.member_mut(&folded) {
                    Some(member) => {
                        member.modes = if adding {
                            prefixes.insert_mode(&member.modes, c)
                        } else {
                            prefixes.remove_mode(&member.modes, c)
                        };
                        if emit_singles {
                            events.push(Event::ChannelUserModeChanged {
                                channel: channel_name.clone(),
                                target,
                                source: source.to_string(),
                                adding,
                                mode: c,
                            });
                        }
                    }
                    None => {
                        tracing::debug!(%target, channel = %channel_name, "prefix mode for non-member");
                    }
                }
            }
            _ if list_modes.is_mode(c) => {
                let item = next_arg(args, &mut arg_idx, c, &channel_name)?;
                chan.apply_list_change(
                    c,
                    adding,
                    ListModeEntry {
                        item: item.clone(),
                        owner: source.to_string(),
                        time: now_s,
                    },
                );
                if emit_singles {
                    events.push(Event::ChannelSingleModeChanged {
                        channel: channel_name.clone(),
                        source: source.to_string(),
                        adding,
                        mode: c,
                        param: item,
                    });
                }
            }
            _ if always_param.is_mode(c) => {
                let param = next_arg(args, &mut arg_idx, c, &channel_name)?;
                if adding {
                    chan.mode_params.insert(c, param.clone());
                    if c == 'k' {
                        chan.key = Some(param.clone());
                    }
                } else {
                    chan.mode_params.remove(&c);
                    if c == 'k' {
                        chan.key = None;
                    }
                }
                if emit_singles {
                    events.push(Event::ChannelSingleModeChanged {
                        channel: channel_name.clone(),
                        source: source.to_string(),
                        adding,
                        mode: c,
                        param,
                    });
                }
            }
            _ if set_param.is_mode(c) => {
                let param = if adding {
                    next_arg(args, &mut arg_idx, c, &channel_name)?
                } else {
                    String::new()
                };
                if adding {
                    chan.mode_params.insert(c, param.clone());
                } else {
                    chan.mode_params.remove(&c);
                }
                if emit_singles {
                    events.push(Event::ChannelSingleModeChanged {
                        channel: channel_name.clone(),
                        source: source.to_string(),
                        adding,
                        mode: c,
                        param,
                    });
                }
            }
            _ => {
                if !bool_modes.is_mode(c) && !learned.contains(&c) {
                    learned.push(c);
                    events.push(Event::EngineError {
                        severity: Severity::Warning,
                        message: format!("unknown channel mode '{c}', treating as boolean"),
                        raw_line: raw.to_string(),
                    });
                }
                chan.modes = if adding {
                    bool_modes.insert_mode(&chan.modes, c)
                } else {
                    bool_modes.remove_mode(&chan.modes, c)
                };
                if emit_singles {
                    events.push(Event::ChannelSingleModeChanged {
                        channel: channel_name.clone(),
                        source: source.to_string(),
                        adding,
                        mode: c,
                        param: String::new(),
                    });
                }
            }
        }
    }

    for c in learned {
        session.chan_bool_modes.add(c);
    }

    events.push(Event::ChannelModesChanged {
        channel: channel_name,
        source: source.to_string(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchOutcome;
    use crate::event::EventKind;
    use crate::processors::testutil::Harness;

    #[test]
    fn boolean_modes_keep_canonical_order() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":op!o@h MODE #test +t");
        h.feed(":op!o@h MODE #test +n");
        let a = h.session.channel("#test").unwrap().modes.clone();

        let mut h2 = Harness::new();
        h2.join_test_channel();
        h2.feed(":op!o@h MODE #test +n");
        h2.feed(":op!o@h MODE #test +t");
        let b = h2.session.channel("#test").unwrap().modes.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn prefix_mode_changes_membership() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":alice!a@h JOIN #test");
        let events = h.feed(":op!o@h MODE #test +ov alice alice");
        assert_eq!(
            h.session.channel("#test").unwrap().member("alice").unwrap().modes,
            "ov"
        );
        assert!(h
            .session
            .user_prefixes
            .is_opped(&h.session.channel("#test").unwrap().member("alice").unwrap().modes));
        let user_changes = events
            .iter()
            .filter(|e| e.kind() == EventKind::ChannelUserModeChanged)
            .count();
        assert_eq!(user_changes, 2);
        assert_eq!(
            events.last().map(Event::kind),
            Some(EventKind::ChannelModesChanged)
        );

        h.feed(":op!o@h MODE #test -o alice");
        assert_eq!(
            h.session.channel("#test").unwrap().member("alice").unwrap().modes,
            "v"
        );
    }

    #[test]
    fn key_and_limit_modes() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":op!o@h MODE #test +kl sekrit 25");
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.key.as_deref(), Some("sekrit"));
        assert_eq!(chan.mode_params.get(&'l').map(String::as_str), Some("25"));

        h.feed(":op!o@h MODE #test -l");
        h.feed(":op!o@h MODE #test -k sekrit");
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.key, None);
        assert!(!chan.mode_params.contains_key(&'l'));
    }

    #[test]
    fn ban_via_live_mode() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":op!o@h MODE #test +b *!*@bad.host");
        assert_eq!(h.session.channel("#test").unwrap().list_mode('b').len(), 1);
        h.feed(":op!o@h MODE #test -b *!*@bad.host");
        assert!(h.session.channel("#test").unwrap().list_mode('b').is_empty());
    }

    #[test]
    fn unknown_mode_learned_with_warning() {
        let mut h = Harness::new();
        h.join_test_channel();
        let events = h.feed(":op!o@h MODE #test +Z");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::EngineError { severity: Severity::Warning, .. })));
        assert!(h.session.chan_bool_modes.is_mode('Z'));
        assert!(h.session.channel("#test").unwrap().modes.contains('Z'));
        // Second sighting is no longer a warning.
        let events = h.feed(":op!o@h MODE #test -Z");
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::EngineError { .. })));
    }

    #[test]
    fn missing_mode_parameter_is_fatal() {
        let mut h = Harness::new();
        h.join_test_channel();
        let outcome = h.feed_outcome(":op!o@h MODE #test +k");
        assert_eq!(outcome, DispatchOutcome::Failed(Severity::Fatal));
    }

    #[test]
    fn numeric_324_is_aggregate_only() {
        let mut h = Harness::new();
        h.join_test_channel();
        let events = h.feed(":srv 324 me #test +ntk sekrit");
        let singles = events
            .iter()
            .filter(|e| e.kind() == EventKind::ChannelSingleModeChanged)
            .count();
        assert_eq!(singles, 0);
        assert!(events
            .iter()
            .any(|e| e.kind() == EventKind::ChannelModesChanged));
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.key.as_deref(), Some("sekrit"));
        assert!(chan.modes.contains('n') && chan.modes.contains('t'));
    }

    #[test]
    fn user_mode_for_another_nick_is_ignored() {
        let mut h = Harness::new();
        h.feed(":srv 001 me :Welcome");
        h.feed(":me MODE me :+i");
        let events = h.feed(":srv MODE alice :+o");
        assert!(events.is_empty());
        assert_eq!(h.session.local_client().unwrap().modes, "i");
    }

    #[test]
    fn prefix_mode_for_nonmember_still_applies_rest() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":alice!a@h JOIN #test");
        let events = h.feed(":op!o@h MODE #test +oo ghost alice");
        assert_eq!(
            h.session.channel("#test").unwrap().member("alice").unwrap().modes,
            "o"
        );
        assert!(events
            .iter()
            .any(|e| e.kind() == EventKind::ChannelModesChanged));
    }

    #[test]
    fn user_modes_via_mode_and_221() {
        let mut h = Harness::new();
        h.feed(":srv 001 me :Welcome");
        let events = h.feed(":me MODE me :+iw");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::UserModesChanged { modes } if modes.contains('i'))));

        let events = h.feed(":srv 221 me :+o");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::UserModesDiscovered { modes } if modes == "o")));
        // 221 replaces, it does not accumulate.
        assert!(!h.session.local_client().unwrap().modes.contains('i'));
    }
}
