//! IRCv3 capability negotiation (CAP).

use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::line::Line;
use crate::outqueue::Priority;
use crate::state::CapState;

/// Handles the `CAP` command and drives automatic negotiation.
///
/// The engine opens with `CAP LS 302`; this processor records the
/// advertised capabilities, requests the configured ones (one `REQ` per
/// capability so a rejection cannot sink the whole set), and closes with
/// `CAP END` once nothing is pending. Negotiation runs at most once per
/// connection.
pub struct Cap;

impl Processor for Cap {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let subcommand = ctx.require_param(line, 1)?.to_ascii_uppercase();
        match subcommand.as_str() {
            "LS" => self.on_ls(ctx, line),
            // CLEAR carries the same modifier-prefixed tokens as ACK.
            "ACK" | "CLEAR" => self.on_ack(ctx, line),
            "NAK" => self.on_nak(ctx, line),
            "NEW" => self.on_new(ctx, line),
            "DEL" => self.on_del(ctx, line),
            other => {
                tracing::debug!(subcommand = other, "unhandled CAP subcommand");
                Ok(())
            }
        }
    }
}

impl Cap {
    fn on_ls(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        // Multi-line LS: "CAP * LS * :..." marks a continuation.
        let more_coming = line.param(2) == Some("*");
        let caps = if more_coming {
            ctx.require_param(line, 3)?
        } else {
            ctx.require_param(line, 2)?
        };

        for cap in caps.split(' ').filter(|c| !c.is_empty()) {
            let name = cap.split('=').next().unwrap_or(cap);
            if !ctx.session.caps.is_known(name) {
                ctx.session.caps.set(name, CapState::Disabled);
            }
        }

        if more_coming || ctx.session.caps.has_capped {
            return Ok(());
        }
        ctx.session.caps.has_capped = true;

        let mut requested = 0;
        for cap in ctx.config.requested_caps.clone() {
            if ctx.session.caps.state(&cap) == Some(CapState::Disabled) {
                ctx.session.caps.set(&cap, CapState::Pending);
                ctx.send(Priority::High, format!("CAP REQ :{cap}"));
                requested += 1;
            }
        }
        if requested == 0 {
            self.finish(ctx);
        }
        Ok(())
    }

    fn on_ack(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let caps = ctx.require_param(line, 2)?.to_string();
        let mut need_ack: Vec<String> = Vec::new();
        for cap in caps.split(' ').filter(|c| !c.is_empty()) {
            match cap.chars().next() {
                Some('-') => {
                    let name = &cap[1..];
                    ctx.session.caps.set(name, CapState::Disabled);
                    ctx.emit(Event::CapabilityState {
                        name: name.to_string(),
                        enabled: false,
                    });
                }
                Some('~') => {
                    // Sticky ACK: held in NeedAck until our confirming
                    // ACK goes out below.
                    let name = cap[1..].to_string();
                    ctx.session.caps.set(&name, CapState::NeedAck);
                    need_ack.push(name);
                }
                Some('=') => {
                    ctx.session.caps.set(&cap[1..], CapState::Enabled);
                }
                _ => {
                    ctx.session.caps.set(cap, CapState::Enabled);
                    ctx.emit(Event::CapabilityState {
                        name: cap.to_string(),
                        enabled: true,
                    });
                }
            }
        }
        for name in need_ack {
            ctx.send(Priority::High, format!("CAP ACK :{name}"));
            ctx.session.caps.set(&name, CapState::Enabled);
            ctx.emit(Event::CapabilityState {
                name,
                enabled: true,
            });
        }
        self.maybe_finish(ctx);
        Ok(())
    }

    fn on_nak(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let caps = ctx.require_param(line, 2)?.to_string();
        for cap in caps.split(' ').filter(|c| !c.is_empty()) {
            ctx.session.caps.set(cap, CapState::Invalid);
        }
        self.maybe_finish(ctx);
        Ok(())
    }

    fn on_new(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let caps = ctx.require_param(line, 2)?.to_string();
        for cap in caps.split(' ').filter(|c| !c.is_empty()) {
            let name = cap.split('=').next().unwrap_or(cap).to_string();
            if ctx.session.caps.is_enabled(&name) {
                continue;
            }
            ctx.session.caps.set(&name, CapState::Disabled);
            if ctx.config.requested_caps.iter().any(|c| c == &name) {
                ctx.session.caps.set(&name, CapState::Pending);
                ctx.send(Priority::High, format!("CAP REQ :{name}"));
            }
        }
        Ok(())
    }

    fn on_del(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let caps = ctx.require_param(line, 2)?.to_string();
        for cap in caps.split(' ').filter(|c| !c.is_empty()) {
            let was_enabled = ctx.session.caps.is_enabled(cap);
            ctx.session.caps.set(cap, CapState::Invalid);
            if was_enabled {
                ctx.emit(Event::CapabilityState {
                    name: cap.to_string(),
                    enabled: false,
                });
            }
        }
        Ok(())
    }

    /// Send `CAP END` if negotiation is over and it has not been sent.
    fn maybe_finish(&self, ctx: &mut Context<'_>) {
        if ctx.session.registered || ctx.session.caps.end_sent {
            return;
        }
        if ctx.session.caps.in_state(CapState::Pending).is_empty() {
            self.finish(ctx);
        }
    }

    fn finish(&self, ctx: &mut Context<'_>) {
        ctx.session.caps.end_sent = true;
        ctx.send(Priority::High, "CAP END");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testutil::Harness;

    fn sent(h: &Harness) -> Vec<&str> {
        h.out.iter().map(|(_, l)| l.as_str()).collect()
    }

    #[test]
    fn ls_requests_each_cap_separately() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS :multi-prefix away-notify sasl");
        let lines = sent(&h);
        assert!(lines.contains(&"CAP REQ :multi-prefix"));
        assert!(lines.contains(&"CAP REQ :away-notify"));
        assert!(!lines.iter().any(|l| l.contains("sasl")));
        assert!(!lines.contains(&"CAP END"));
    }

    #[test]
    fn multiline_ls_waits_for_last_chunk() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS * :multi-prefix");
        assert!(h.out.is_empty());
        h.feed(":srv CAP * LS :away-notify");
        let lines = sent(&h);
        assert!(lines.contains(&"CAP REQ :multi-prefix"));
        assert!(lines.contains(&"CAP REQ :away-notify"));
    }

    #[test]
    fn ack_enables_and_ends_when_settled() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS :multi-prefix away-notify");
        h.out.clear();
        h.feed(":srv CAP me ACK :multi-prefix");
        assert!(h.session.caps.is_enabled("multi-prefix"));
        assert!(!sent(&h).contains(&"CAP END"));
        h.feed(":srv CAP me NAK :away-notify");
        assert!(sent(&h).contains(&"CAP END"));
        assert_eq!(
            h.session.caps.state("away-notify"),
            Some(CapState::Invalid)
        );
    }

    #[test]
    fn sticky_ack_is_confirmed() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS :multi-prefix");
        h.out.clear();
        h.feed(":srv CAP me ACK :~multi-prefix");
        assert!(sent(&h).contains(&"CAP ACK :multi-prefix"));
        assert!(h.session.caps.is_enabled("multi-prefix"));
    }

    #[test]
    fn clear_disables_with_modifier_tokens() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS :multi-prefix away-notify");
        h.feed(":srv CAP me ACK :multi-prefix away-notify");
        assert!(h.session.caps.is_enabled("multi-prefix"));
        let events = h.feed(":srv CAP me CLEAR :-multi-prefix -away-notify");
        assert!(!h.session.caps.is_enabled("multi-prefix"));
        assert!(!h.session.caps.is_enabled("away-notify"));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::CapabilityState { name, enabled: false } if name == "multi-prefix"
        )));
    }

    #[test]
    fn ends_immediately_when_nothing_wanted() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS :sasl echo-message");
        assert_eq!(sent(&h), vec!["CAP END"]);
    }

    #[test]
    fn negotiation_runs_once() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS :multi-prefix");
        h.out.clear();
        h.feed(":srv CAP * LS :multi-prefix");
        assert!(h.out.is_empty());
    }

    #[test]
    fn cap_new_requests_wanted_cap() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS :sasl");
        h.out.clear();
        h.feed(":srv CAP me NEW :away-notify");
        assert!(sent(&h).contains(&"CAP REQ :away-notify"));
    }

    #[test]
    fn cap_del_emits_disable() {
        let mut h = Harness::new();
        h.feed(":srv CAP * LS :multi-prefix");
        h.feed(":srv CAP me ACK :multi-prefix");
        let events = h.feed(":srv CAP me DEL :multi-prefix");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::CapabilityState { enabled: false, .. }
        )));
    }
}
