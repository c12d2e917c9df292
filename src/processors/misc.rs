//! Small processors: PING, 004, 005, ACCOUNT, CHGHOST.

use crate::casemap::CaseMapping;
use crate::dispatch::{Context, Processor};
use crate::error::ProcessorError;
use crate::event::Event;
use crate::isupport::ServerFamily;
use crate::line::Line;
use crate::outqueue::Priority;

/// Answers `PING` immediately, bypassing the queue.
pub struct Ping;

impl Processor for Ping {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let token = line.params.last().cloned().unwrap_or_default();
        ctx.send(Priority::Immediate, format!("PONG :{token}"));
        Ok(())
    }
}

/// Handles `RPL_MYINFO` (004): version, server family, user modes.
pub struct MyInfo;

impl Processor for MyInfo {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        if let Some(version) = line.param(2) {
            ctx.session.server_version = version.to_string();
            ctx.session.server_family = ServerFamily::detect(version);
        }
        if let Some(user_modes) = line.param(3) {
            for c in user_modes.chars() {
                ctx.session.user_modes.add(c);
            }
        }
        Ok(())
    }
}

/// Handles `RPL_ISUPPORT` (005) tokens and their side effects.
///
/// Recording the raw token and applying it are separate steps:
/// `CASEMAPPING`, `CHANTYPES`, `CHANMODES` and `PREFIX` each reconfigure
/// a live part of the session.
pub struct IsupportTokens;

impl Processor for IsupportTokens {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        // First param is our nick; a trailing "are supported by this
        // server" param is recognized by its spaces.
        let mut end = line.params.len();
        if line.params.last().map(|p| p.contains(' ')).unwrap_or(false) {
            end -= 1;
        }
        let tokens = &line.params[1.min(end)..end];
        for token in tokens {
            if token.is_empty() {
                continue;
            }
            ctx.session.isupport.insert_token(token);
        }

        if let Some(value) = ctx.session.isupport.casemapping() {
            match CaseMapping::from_token(value) {
                Some(mapping) => ctx.session.set_case_mapping(mapping),
                None => {
                    tracing::warn!(%value, "unknown CASEMAPPING, keeping current");
                }
            }
        }
        ctx.session.chantypes = ctx.session.isupport.chantypes().to_string();
        if let Some(classes) = ctx.session.isupport.chanmodes() {
            ctx.session.apply_chanmode_classes(&classes);
        }
        if let Some(spec) = ctx.session.isupport.prefix() {
            ctx.session.apply_prefix_spec(&spec);
        }
        Ok(())
    }
}

/// Handles `ACCOUNT` (account-notify).
pub struct Account;

impl Processor for Account {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let source = line
            .source
            .clone()
            .ok_or_else(|| ProcessorError::fatal("ACCOUNT without source"))?;
        let nick = line.source_nick().unwrap_or_default().to_string();
        let account = match ctx.require_param(line, 0)? {
            "*" => None,
            a => Some(a.to_string()),
        };
        let client = ctx.session.get_or_create_client(&source);
        client.account = account.clone();
        ctx.emit(Event::AccountChanged { nick, account });
        Ok(())
    }
}

/// Handles `CHGHOST`.
pub struct ChgHost;

impl Processor for ChgHost {
    fn process(&self, ctx: &mut Context<'_>, line: &Line) -> Result<(), ProcessorError> {
        let nick = line
            .source_nick()
            .ok_or_else(|| ProcessorError::fatal("CHGHOST without source"))?
            .to_string();
        let username = ctx.require_param(line, 0)?.to_string();
        let hostname = ctx.require_param(line, 1)?.to_string();
        let Some(client) = ctx.session.client_mut(&nick) else {
            tracing::trace!(%nick, "CHGHOST for unknown client");
            return Ok(());
        };
        client.username = username;
        client.hostname = hostname;
        ctx.emit(Event::HostChanged { nick });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casemap::CaseMapping;
    use crate::processors::testutil::Harness;

    #[test]
    fn ping_answers_immediately() {
        let mut h = Harness::new();
        h.feed("PING :irc.example.net");
        assert_eq!(
            h.out,
            vec![(Priority::Immediate, "PONG :irc.example.net".to_string())]
        );
    }

    #[test]
    fn myinfo_detects_family_and_user_modes() {
        let mut h = Harness::new();
        h.feed(":srv 004 me irc.example.net u2.10.12.19+snircd(1.3.4a) dioswkgx biklmnopstv");
        assert_eq!(h.session.server_family, ServerFamily::Snircd);
        assert!(h.session.user_modes.is_mode('x'));
        assert_eq!(h.session.server_version, "u2.10.12.19+snircd(1.3.4a)");
    }

    #[test]
    fn isupport_reconfigures_session() {
        let mut h = Harness::new();
        h.feed(
            ":srv 005 me CASEMAPPING=ascii CHANTYPES=#! CHANMODES=beI,k,l,imnpst \
             PREFIX=(qaohv)~&@%+ :are supported by this server",
        );
        assert_eq!(h.session.case_mapping(), CaseMapping::Ascii);
        assert_eq!(h.session.chantypes, "#!");
        assert!(h.session.is_channel_name("!weird"));
        assert!(h.session.chan_list_modes.is_mode('I'));
        assert_eq!(h.session.user_prefixes.prefix_for('q'), Some('~'));
        assert!(h.session.user_prefixes.is_prefix('&'));
        assert_eq!(h.session.isupport.casemapping(), Some("ascii"));
    }

    #[test]
    fn account_notify() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":alice!a@h JOIN #test");
        let events = h.feed(":alice!a@h ACCOUNT services-acct");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::AccountChanged { account: Some(a), .. } if a == "services-acct"
        )));
        let events = h.feed(":alice!a@h ACCOUNT *");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::AccountChanged { account: None, .. })));
        assert_eq!(h.session.client("alice").unwrap().account, None);
    }

    #[test]
    fn chghost_updates_identity() {
        let mut h = Harness::new();
        h.join_test_channel();
        h.feed(":alice!a@h JOIN #test");
        let events = h.feed(":alice!a@h CHGHOST newuser cloak.example");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::HostChanged { nick } if nick == "alice")));
        let client = h.session.client("alice").unwrap();
        assert_eq!(client.username, "newuser");
        assert_eq!(client.hostname, "cloak.example");
    }
}
