//! List-mode numerics (ban/except/invite/reop/owner lists).
//!
//! The numeric space for list replies is a mess: 367/368 are always the
//! ban list, but 344/345 mean the reop list on some networks and a
//! different list on ircu-family servers, and UnrealIRCd moved owner and
//! admin lists to 386-389. Disambiguation uses, in order: the queue of
//! list queries this engine sent (maintained by the outgoing-line hook),
//! then the detected server family. Disagreements are self-healing and
//! only logged.

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;
use crate::state::ListModeEntry;

/// Handles the list-mode item and terminal numerics.
pub struct ListModes;

struct NumericInfo {
    /// Candidate mode letters, preferred first.
    candidates: &'static [char],
    /// True for end-of-list numerics.
    terminal: bool,
}

fn classify(numeric: &str) -> Option<NumericInfo> {
    let (candidates, terminal): (&'static [char], bool) = match numeric {
        "367" => (&['b'], false),
        "368" => (&['b'], true),
        "346" => (&['I'], false),
        "347" => (&['I'], true),
        "348" => (&['e'], false),
        "349" => (&['e'], true),
        // Reop list on IRCnet; reused by ircu derivatives.
        "344" => (&['q', 'R'], false),
        "345" => (&['q', 'R'], true),
        // UnrealIRCd owner/admin lists.
        "386" => (&['q'], false),
        "387" => (&['q'], true),
        "388" => (&['a'], false),
        "389" => (&['a'], true),
        _ => return None,
    };
    Some(NumericInfo {
        candidates,
        terminal,
    })
}

impl Processor for ListModes {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let Some(info) = classify(&line.command) else {
            return Ok(());
        };
        let channel = ctx.require_param(line, 1)?.to_string();

        let reuses_reop = ctx.session.server_family.reuses_reop_numerics();
        let Some(chan) = ctx.session.channel_mut(&channel) else {
            tracing::debug!(%channel, numeric = %line.command, "list reply for untracked channel");
            return Ok(());
        };

        // Resolve ambiguous numerics against our own outstanding queries,
        // falling back to the server family.
        let mode = if info.candidates.len() == 1 {
            info.candidates[0]
        } else {
            match chan.list_mode_queue.front() {
                Some(&queued) if info.candidates.contains(&queued) => queued,
                Some(&queued) => {
                    tracing::debug!(
                        numeric = %line.command,
                        queued = %queued,
                        "list numeric disagrees with query queue"
                    );
                    if reuses_reop {
                        'R'
                    } else {
                        info.candidates[0]
                    }
                }
                None => {
                    if reuses_reop {
                        'R'
                    } else {
                        info.candidates[0]
                    }
                }
            }
        };

        if !info.terminal {
            let item = ctx.require_param(line, 2)?.to_string();
            let owner = line.param(3).unwrap_or_default().to_string();
            let time = line
                .param(4)
                .and_then(|t| t.parse().ok())
                .unwrap_or_default();
            let Some(chan) = ctx.session.channel_mut(&channel) else {
                return Ok(());
            };
            chan.add_list_entry(mode, ListModeEntry { item, owner, time });
            return Ok(());
        }

        let Some(chan) = ctx.session.channel_mut(&channel) else {
            return Ok(());
        };
        chan.finish_list(mode);
        if chan.list_mode_queue.front() == Some(&mode) {
            chan.list_mode_queue.pop_front();
        }
        if chan.list_mode_queue.is_empty() && !chan.got_list_modes {
            chan.got_list_modes = true;
            let name = chan.name.clone();
            ctx.emit(Event::ChannelGotListModes { channel: name });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isupport::ServerFamily;
    use crate::processors::testutil::Harness;

    fn joined() -> Harness {
        let mut h = Harness::new();
        h.join_test_channel();
        // Mirror the outgoing-line hook: the auto list query queued 'b'.
        h.session
            .channel_mut("#test")
            .unwrap()
            .list_mode_queue
            .push_back('b');
        h
    }

    #[test]
    fn ban_list_batch() {
        let mut h = joined();
        h.feed(":srv 367 me #test a!*@* op 100");
        h.feed(":srv 367 me #test b!*@* op 200");
        h.feed(":srv 367 me #test c!*@* op 300");
        let events = h.feed(":srv 368 me #test :End of ban list");
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.list_mode('b').len(), 3);
        assert_eq!(chan.list_mode('b')[1].owner, "op");
        assert_eq!(chan.list_mode('b')[2].time, 300);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ChannelGotListModes { .. })));
        assert!(chan.got_list_modes);
    }

    #[test]
    fn got_list_modes_fires_once() {
        let mut h = joined();
        h.feed(":srv 368 me #test :End of ban list");
        // Server resends the terminal; the milestone does not repeat.
        let events = h.feed(":srv 368 me #test :End of ban list");
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::ChannelGotListModes { .. })));
    }

    #[test]
    fn milestone_waits_for_all_queued_lists() {
        let mut h = joined();
        h.session
            .channel_mut("#test")
            .unwrap()
            .list_mode_queue
            .push_back('e');
        let events = h.feed(":srv 368 me #test :End of ban list");
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::ChannelGotListModes { .. })));
        let events = h.feed(":srv 349 me #test :End of exception list");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ChannelGotListModes { .. })));
    }

    #[test]
    fn rebatch_replaces_entries() {
        let mut h = joined();
        h.feed(":srv 367 me #test stale!*@* op 1");
        h.feed(":srv 368 me #test :End");
        h.feed(":srv 367 me #test fresh!*@* op 2");
        h.feed(":srv 368 me #test :End");
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.list_mode('b').len(), 1);
        assert_eq!(chan.list_mode('b')[0].item, "fresh!*@*");
    }

    #[test]
    fn ambiguous_numeric_follows_query_queue() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.session
            .channel_mut("#test")
            .unwrap()
            .list_mode_queue
            .push_back('q');
        h.feed(":srv 344 me #test someone!*@*");
        h.feed(":srv 345 me #test :End");
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.list_mode('q').len(), 1);
        assert!(chan.list_mode('R').is_empty());
    }

    #[test]
    fn ambiguous_numeric_follows_family_without_queue() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.session.server_family = ServerFamily::Snircd;
        h.feed(":srv 344 me #test account1");
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.list_mode('R').len(), 1);
    }

    #[test]
    fn unreal_owner_list() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":srv 386 me #test owner!*@*");
        h.feed(":srv 387 me #test :End");
        let chan = h.session.channel("#test").unwrap();
        assert_eq!(chan.list_mode('q').len(), 1);
    }
}
