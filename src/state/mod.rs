//! Mutable session state.
//!
//! All of the entities the protocol maintains live here: the client table,
//! channel table, capability table, ISUPPORT-derived mode managers, and
//! the pending-join correlation queues. State is only ever mutated from
//! the inbound dispatch loop, so none of it needs internal locking.

mod caps;
mod channel;
mod client;

pub use caps::{CapState, CapTable};
pub use channel::{Channel, ChannelMember, ListModeEntry};
pub use client::{AwayState, Client};

use std::collections::{HashMap, VecDeque};

use crate::casemap::CaseMapping;
use crate::error::ProcessorError;
use crate::isupport::{ChanModeClasses, Isupport, PrefixSpec, ServerFamily};
use crate::mode::{ModeManager, PrefixModeManager};

/// The live state of one IRC session.
#[derive(Debug)]
pub struct Session {
    /// Case mapping in effect; changing it re-keys all tables.
    case_mapping: CaseMapping,
    clients: HashMap<String, Client>,
    channels: HashMap<String, Channel>,
    /// Case-mapped key of the local client.
    local_key: String,
    /// Server name learned from the welcome reply's source.
    pub server_name: String,
    /// Server version string from 004.
    pub server_version: String,
    /// Server software family detected from 004.
    pub server_family: ServerFamily,
    /// The welcome reply has been seen.
    pub registered: bool,
    /// Capability negotiation state.
    pub caps: CapTable,
    /// Raw ISUPPORT table.
    pub isupport: Isupport,
    /// Channel prefix characters (`CHANTYPES`).
    pub chantypes: String,
    /// Channel user (prefix) modes.
    pub user_prefixes: PrefixModeManager,
    /// Boolean channel modes (type D).
    pub chan_bool_modes: ModeManager,
    /// List channel modes (type A).
    pub chan_list_modes: ModeManager,
    /// Channel modes with a parameter on set and unset (type B).
    pub chan_always_param_modes: ModeManager,
    /// Channel modes with a parameter on set only (type C).
    pub chan_set_param_modes: ModeManager,
    /// Known user modes.
    pub user_modes: ModeManager,
    pending_join_channels: VecDeque<String>,
    pending_join_keys: VecDeque<String>,
}

impl Session {
    /// Create a session with a placeholder local client.
    pub fn new(nickname: &str, case_mapping: CaseMapping) -> Self {
        let mut user_prefixes = PrefixModeManager::new();
        user_prefixes.add('v', '+');
        user_prefixes.add('h', '%');
        user_prefixes.add('o', '@');

        let local_key = case_mapping.to_lower(nickname);
        let mut clients = HashMap::new();
        clients.insert(local_key.clone(), Client::placeholder(nickname));

        Self {
            case_mapping,
            clients,
            channels: HashMap::new(),
            local_key,
            server_name: String::new(),
            server_version: String::new(),
            server_family: ServerFamily::Unknown,
            registered: false,
            caps: CapTable::new(),
            isupport: Isupport::new(),
            chantypes: "#&".to_string(),
            user_prefixes,
            chan_bool_modes: ModeManager::with_modes("imnpst"),
            chan_list_modes: ModeManager::with_modes("b"),
            chan_always_param_modes: ModeManager::with_modes("k"),
            chan_set_param_modes: ModeManager::with_modes("l"),
            user_modes: ModeManager::with_modes("iwso"),
            pending_join_channels: VecDeque::new(),
            pending_join_keys: VecDeque::new(),
        }
    }

    /// The case mapping currently in effect.
    pub fn case_mapping(&self) -> CaseMapping {
        self.case_mapping
    }

    /// Fold a name under the current case mapping.
    pub fn fold(&self, s: &str) -> String {
        self.case_mapping.to_lower(s)
    }

    /// Whether `name` looks like a channel name under CHANTYPES.
    pub fn is_channel_name(&self, name: &str) -> bool {
        name.chars()
            .next()
            .map(|c| self.chantypes.contains(c))
            .unwrap_or(false)
    }

    /// Switch the case mapping, re-keying the client and channel tables.
    pub fn set_case_mapping(&mut self, mapping: CaseMapping) {
        if mapping == self.case_mapping {
            return;
        }
        self.case_mapping = mapping;
        let local_nick = self.local_nick().to_string();
        let clients = std::mem::take(&mut self.clients);
        for (_, client) in clients {
            let key = mapping.to_lower(&client.nickname);
            self.clients.insert(key, client);
        }
        let channels = std::mem::take(&mut self.channels);
        for (_, mut chan) in channels {
            let nicks = chan.member_nicks();
            for nick in nicks {
                let new = mapping.to_lower(&nick);
                if new != nick {
                    chan.rename_member(&nick, new);
                }
            }
            let key = mapping.to_lower(&chan.name);
            self.channels.insert(key, chan);
        }
        self.local_key = mapping.to_lower(&local_nick);
    }

    // --- clients ---------------------------------------------------------

    /// The local client's nickname.
    pub fn local_nick(&self) -> &str {
        self.clients
            .get(&self.local_key)
            .map(|c| c.nickname.as_str())
            .unwrap_or("")
    }

    /// Whether `nick` refers to the local client.
    pub fn is_local(&self, nick: &str) -> bool {
        self.fold(nick) == self.local_key
    }

    /// The local client record.
    pub fn local_client(&self) -> Option<&Client> {
        self.clients.get(&self.local_key)
    }

    /// Mutable local client record.
    pub fn local_client_mut(&mut self) -> Option<&mut Client> {
        self.clients.get_mut(&self.local_key)
    }

    /// Look up a client by nickname.
    pub fn client(&self, nick: &str) -> Option<&Client> {
        self.clients.get(&self.fold(nick))
    }

    /// Mutable client lookup.
    pub fn client_mut(&mut self, nick: &str) -> Option<&mut Client> {
        let key = self.fold(nick);
        self.clients.get_mut(&key)
    }

    /// Look up or lazily create a client from a `nick!user@host` source,
    /// updating username/hostname from whatever the source carries.
    pub fn get_or_create_client(&mut self, source: &str) -> &mut Client {
        let nick = source.split(['!', '@']).next().unwrap_or(source);
        let key = self.fold(nick);
        let client = self
            .clients
            .entry(key)
            .or_insert_with(|| Client::new(nick));
        client.update_from_source(source);
        client
    }

    /// Remove a client by nickname. Memberships are the caller's concern.
    pub fn remove_client(&mut self, nick: &str) -> Option<Client> {
        let key = self.fold(nick);
        self.clients.remove(&key)
    }

    /// Number of known clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Re-key a client after a nick change, updating channel memberships.
    ///
    /// Fails if the new key is occupied by a different client.
    pub fn rename_client(&mut self, old: &str, new: &str) -> Result<(), ProcessorError> {
        let old_key = self.fold(old);
        let new_key = self.fold(new);

        if old_key == new_key {
            if let Some(client) = self.clients.get_mut(&old_key) {
                client.nickname = new.to_string();
            }
            return Ok(());
        }

        if self.clients.contains_key(&new_key) {
            return Err(ProcessorError::NickCollision {
                nickname: new.to_string(),
            });
        }

        let Some(mut client) = self.clients.remove(&old_key) else {
            return Err(ProcessorError::warning(format!(
                "nick change for unknown client {old:?}"
            )));
        };
        client.nickname = new.to_string();
        self.clients.insert(new_key.clone(), client);

        for chan in self.channels.values_mut() {
            chan.rename_member(&old_key, new_key.clone());
        }

        if self.local_key == old_key {
            self.local_key = new_key;
        }
        Ok(())
    }

    /// Promote the placeholder local client to a confirmed identity, or
    /// swap the local identity to a new nickname (second welcome).
    ///
    /// Fails if the target slot is occupied by a different client.
    pub fn confirm_local_identity(&mut self, nickname: &str) -> Result<(), ProcessorError> {
        let new_key = self.fold(nickname);
        if new_key == self.local_key {
            if let Some(client) = self.clients.get_mut(&self.local_key) {
                client.nickname = nickname.to_string();
                client.fake = false;
            }
            return Ok(());
        }
        if self.clients.contains_key(&new_key) {
            return Err(ProcessorError::IdentitySlotOccupied {
                nickname: nickname.to_string(),
            });
        }
        let Some(mut client) = self.clients.remove(&self.local_key) else {
            return Err(ProcessorError::fatal("local client record missing"));
        };
        client.nickname = nickname.to_string();
        client.fake = false;
        self.clients.insert(new_key.clone(), client);
        self.local_key = new_key;
        Ok(())
    }

    // --- channels --------------------------------------------------------

    /// Look up a channel by name.
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&self.fold(name))
    }

    /// Mutable channel lookup.
    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        let key = self.fold(name);
        self.channels.get_mut(&key)
    }

    /// Look up or create a channel record.
    pub fn get_or_create_channel(&mut self, name: &str) -> &mut Channel {
        let key = self.fold(name);
        self.channels
            .entry(key)
            .or_insert_with(|| Channel::new(name))
    }

    /// Remove a channel record entirely.
    pub fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        let key = self.fold(name);
        self.channels.remove(&key)
    }

    /// Iterate all known channels.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Mutable iteration over all known channels.
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    // --- ISUPPORT side effects -------------------------------------------

    /// Rebuild the prefix-mode manager from a PREFIX spec (advertised most
    /// important first).
    pub fn apply_prefix_spec(&mut self, spec: &PrefixSpec) {
        self.user_prefixes.clear();
        for &(mode, prefix) in spec.pairs.iter().rev() {
            self.user_prefixes.add(mode, prefix);
        }
    }

    /// Rebuild the channel mode managers from CHANMODES classes.
    pub fn apply_chanmode_classes(&mut self, classes: &ChanModeClasses) {
        self.chan_list_modes = ModeManager::with_modes(&classes.list);
        self.chan_always_param_modes = ModeManager::with_modes(&classes.always_param);
        self.chan_set_param_modes = ModeManager::with_modes(&classes.set_param);
        self.chan_bool_modes = ModeManager::with_modes(&classes.boolean);
    }

    // --- pending-join correlation ----------------------------------------

    /// Record an outgoing JOIN's channel/key pair (before-send hook).
    pub fn push_pending_join(&mut self, channel: &str, key: &str) {
        self.pending_join_channels.push_back(channel.to_string());
        self.pending_join_keys.push_back(key.to_string());
    }

    /// Consume the pending-join queues for a JOIN result on `channel`.
    ///
    /// Returns the correlated key when the queue head matches. A mismatch
    /// is a desync: both queues are cleared and `None` is returned.
    pub fn take_pending_join(&mut self, channel: &str) -> Option<String> {
        let head = self.pending_join_channels.front()?;
        if self.fold(head) == self.fold(channel) {
            self.pending_join_channels.pop_front();
            return self.pending_join_keys.pop_front();
        }
        tracing::debug!(
            expected = %head,
            got = %channel,
            "pending-join queue desync, clearing"
        );
        self.pending_join_channels.clear();
        self.pending_join_keys.clear();
        None
    }

    /// Number of outstanding pending-join correlations.
    pub fn pending_join_len(&self) -> usize {
        self.pending_join_channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("Me", CaseMapping::Rfc1459)
    }

    #[test]
    fn local_client_starts_fake() {
        let s = session();
        assert!(s.local_client().unwrap().fake);
        assert_eq!(s.local_nick(), "Me");
        assert!(s.is_local("ME"));
    }

    #[test]
    fn lazy_client_discovery() {
        let mut s = session();
        s.get_or_create_client("Alice!a@host");
        let client = s.client("alice").unwrap();
        assert_eq!(client.nickname, "Alice");
        assert_eq!(client.username, "a");
    }

    #[test]
    fn confirm_identity_promotes_placeholder() {
        let mut s = session();
        s.confirm_local_identity("Me").unwrap();
        assert!(!s.local_client().unwrap().fake);
    }

    #[test]
    fn confirm_identity_swaps_nick() {
        let mut s = session();
        s.confirm_local_identity("Me").unwrap();
        s.confirm_local_identity("Me2").unwrap();
        assert_eq!(s.local_nick(), "Me2");
        assert!(s.client("me").is_none());
    }

    #[test]
    fn confirm_identity_rejects_occupied_slot() {
        let mut s = session();
        s.get_or_create_client("Other!x@y");
        let err = s.confirm_local_identity("Other").unwrap_err();
        assert!(matches!(err, ProcessorError::IdentitySlotOccupied { .. }));
    }

    #[test]
    fn rename_updates_memberships() {
        let mut s = session();
        s.get_or_create_client("Alice!a@h");
        let chan = s.get_or_create_channel("#test");
        chan.add_member("alice");
        s.rename_client("Alice", "Alicia").unwrap();
        assert!(s.channel("#test").unwrap().has_member("alicia"));
        assert!(s.client("alicia").is_some());
        assert!(s.client("alice").is_none());
    }

    #[test]
    fn rename_collision_is_error() {
        let mut s = session();
        s.get_or_create_client("A!a@h");
        s.get_or_create_client("B!b@h");
        let err = s.rename_client("A", "b").unwrap_err();
        assert!(matches!(err, ProcessorError::NickCollision { .. }));
    }

    #[test]
    fn pending_join_fifo() {
        let mut s = session();
        s.push_pending_join("#a", "ka");
        s.push_pending_join("#b", "");
        assert_eq!(s.take_pending_join("#A").as_deref(), Some("ka"));
        assert_eq!(s.take_pending_join("#b").as_deref(), Some(""));
        assert_eq!(s.take_pending_join("#c"), None);
    }

    #[test]
    fn pending_join_mismatch_clears() {
        let mut s = session();
        s.push_pending_join("#a", "ka");
        s.push_pending_join("#b", "kb");
        assert_eq!(s.take_pending_join("#b"), None);
        assert_eq!(s.pending_join_len(), 0);
    }

    #[test]
    fn case_mapping_change_rekeys() {
        let mut s = session();
        s.get_or_create_client("Nick[a]!u@h");
        assert!(s.client("nick{a}").is_some());
        s.set_case_mapping(CaseMapping::Ascii);
        assert!(s.client("nick[a]").is_some());
        assert!(s.client("nick{a}").is_none());
    }

    #[test]
    fn channel_name_detection() {
        let mut s = session();
        assert!(s.is_channel_name("#chan"));
        assert!(s.is_channel_name("&chan"));
        assert!(!s.is_channel_name("nick"));
        s.chantypes = "#".to_string();
        assert!(!s.is_channel_name("&chan"));
    }
}
