//! Channel state: topic, modes, list-mode collections, membership.

use std::collections::{HashMap, HashSet, VecDeque};

/// One entry in a list-mode collection (ban, exception, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListModeEntry {
    /// The listed item (typically a hostmask).
    pub item: String,
    /// Who set the entry, as reported by the server.
    pub owner: String,
    /// Unix time the entry was set, 0 when unreported.
    pub time: i64,
}

/// Membership edge between a channel and a client.
///
/// Owned by the channel; removed when the client parts, quits, or is
/// kicked, or when the channel itself is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMember {
    /// Prefix modes held on this channel, most important first.
    pub modes: String,
}

/// State for one channel the session knows about.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    /// Channel name as first seen (display case).
    pub name: String,
    /// Current topic text.
    pub topic: String,
    /// Who set the topic.
    pub topic_setter: String,
    /// Unix time the topic was set.
    pub topic_time: i64,
    /// Unix time the channel was created (329).
    pub create_time: i64,
    /// Boolean channel modes in canonical importance order. Never contains
    /// parameterized or list modes.
    pub modes: String,
    /// Values of parameterized modes currently set.
    pub mode_params: HashMap<char, String>,
    /// Key used when joining, if one was correlated from the pending-join
    /// queues.
    pub key: Option<String>,
    /// Membership, keyed by case-mapped nickname.
    members: HashMap<String, ChannelMember>,
    /// List-mode collections, keyed by mode character.
    list_modes: HashMap<char, Vec<ListModeEntry>>,
    /// Mode letters guessed from outgoing list queries, consumed as the
    /// corresponding numeric batches arrive.
    pub list_mode_queue: VecDeque<char>,
    /// A NAMES burst is in progress.
    pub adding_names: bool,
    /// List-mode batches currently being received.
    adding_lists: HashSet<char>,
    /// All requested list-mode batches have completed at least once.
    pub got_list_modes: bool,
}

impl Channel {
    /// Create an empty channel record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a member under its case-mapped nickname. Returns false if the
    /// member was already present.
    pub fn add_member(&mut self, folded_nick: impl Into<String>) -> bool {
        let folded = folded_nick.into();
        if self.members.contains_key(&folded) {
            return false;
        }
        self.members.insert(folded, ChannelMember::default());
        true
    }

    /// Remove a member. Returns the removed edge, if any.
    pub fn remove_member(&mut self, folded_nick: &str) -> Option<ChannelMember> {
        self.members.remove(folded_nick)
    }

    /// Look up a membership edge.
    pub fn member(&self, folded_nick: &str) -> Option<&ChannelMember> {
        self.members.get(folded_nick)
    }

    /// Mutable membership edge lookup.
    pub fn member_mut(&mut self, folded_nick: &str) -> Option<&mut ChannelMember> {
        self.members.get_mut(folded_nick)
    }

    /// Whether the given (case-mapped) nick is a member.
    pub fn has_member(&self, folded_nick: &str) -> bool {
        self.members.contains_key(folded_nick)
    }

    /// Iterate members as (case-mapped nick, edge).
    pub fn members(&self) -> impl Iterator<Item = (&str, &ChannelMember)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Case-mapped nicks of all members.
    pub fn member_nicks(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    /// Member count.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Drop all membership edges (NAMES rebuild).
    pub fn clear_members(&mut self) {
        self.members.clear();
    }

    /// Re-key a member after a nick change.
    pub fn rename_member(&mut self, old_folded: &str, new_folded: impl Into<String>) {
        if let Some(edge) = self.members.remove(old_folded) {
            self.members.insert(new_folded.into(), edge);
        }
    }

    /// Entries of a list mode, empty if none recorded.
    pub fn list_mode(&self, mode: char) -> &[ListModeEntry] {
        self.list_modes.get(&mode).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record a list-mode entry from a listing batch.
    ///
    /// The first entry of a new batch clears whatever was previously
    /// recorded for that mode; subsequent entries accumulate until
    /// [`finish_list`](Self::finish_list).
    pub fn add_list_entry(&mut self, mode: char, entry: ListModeEntry) {
        if self.adding_lists.insert(mode) {
            self.list_modes.entry(mode).or_default().clear();
        }
        self.list_modes.entry(mode).or_default().push(entry);
    }

    /// Add or remove a single entry from a live MODE change.
    pub fn apply_list_change(&mut self, mode: char, adding: bool, entry: ListModeEntry) {
        let list = self.list_modes.entry(mode).or_default();
        if adding {
            if !list.iter().any(|e| e.item == entry.item) {
                list.push(entry);
            }
        } else {
            list.retain(|e| !e.item.eq_ignore_ascii_case(&entry.item));
        }
    }

    /// Finish a listing batch. Handles the empty-list case (terminal
    /// numeric without any entries) by clearing stale state.
    pub fn finish_list(&mut self, mode: char) {
        if !self.adding_lists.remove(&mode) {
            // Terminal with no entries: the list is empty now.
            self.list_modes.entry(mode).or_default().clear();
        }
    }

    /// Whether a listing batch for `mode` is in progress.
    pub fn is_adding_list(&self, mode: char) -> bool {
        self.adding_lists.contains(&mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_round_trip() {
        let mut chan = Channel::new("#test");
        assert!(chan.add_member("alice"));
        assert!(!chan.add_member("alice"));
        assert!(chan.has_member("alice"));
        assert_eq!(chan.member_count(), 1);
        assert!(chan.remove_member("alice").is_some());
        assert!(!chan.has_member("alice"));
    }

    #[test]
    fn list_batch_clears_once() {
        let mut chan = Channel::new("#test");
        chan.add_list_entry(
            'b',
            ListModeEntry {
                item: "stale!*@*".into(),
                owner: "x".into(),
                time: 0,
            },
        );
        chan.finish_list('b');

        // New batch: first entry clears the stale one.
        for item in ["a!*@*", "b!*@*"] {
            chan.add_list_entry(
                'b',
                ListModeEntry {
                    item: item.into(),
                    owner: "op".into(),
                    time: 1,
                },
            );
        }
        chan.finish_list('b');
        assert_eq!(chan.list_mode('b').len(), 2);
        assert_eq!(chan.list_mode('b')[0].item, "a!*@*");
    }

    #[test]
    fn empty_terminal_clears() {
        let mut chan = Channel::new("#test");
        chan.add_list_entry(
            'b',
            ListModeEntry {
                item: "old".into(),
                owner: String::new(),
                time: 0,
            },
        );
        chan.finish_list('b');
        // 368 with no preceding 367: list is now empty.
        chan.finish_list('b');
        assert!(chan.list_mode('b').is_empty());
    }

    #[test]
    fn live_list_change() {
        let mut chan = Channel::new("#test");
        let entry = ListModeEntry {
            item: "Bad!*@*".into(),
            owner: "op".into(),
            time: 9,
        };
        chan.apply_list_change('b', true, entry.clone());
        assert_eq!(chan.list_mode('b').len(), 1);
        chan.apply_list_change(
            'b',
            false,
            ListModeEntry {
                item: "bad!*@*".into(),
                owner: String::new(),
                time: 0,
            },
        );
        assert!(chan.list_mode('b').is_empty());
    }

    #[test]
    fn rename_member_keeps_modes() {
        let mut chan = Channel::new("#test");
        chan.add_member("alice");
        chan.member_mut("alice").unwrap().modes = "o".into();
        chan.rename_member("alice", "alicia");
        assert_eq!(chan.member("alicia").unwrap().modes, "o");
        assert!(!chan.has_member("alice"));
    }
}
