//! IRCv3 capability negotiation state.

use std::collections::HashMap;

/// Negotiation state of a single capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapState {
    /// Acknowledged and active.
    Enabled,
    /// Offered by the server but not active.
    Disabled,
    /// Server requires a client-side ACK before enabling.
    NeedAck,
    /// Requested, awaiting server ACK/NAK.
    Pending,
    /// Rejected by the server.
    Invalid,
}

/// The capability table for a session.
///
/// Negotiation runs exactly once before the welcome reply; the
/// `has_capped` latch prevents the automatic pass from re-running if the
/// application takes over CAP handling.
#[derive(Debug, Clone, Default)]
pub struct CapTable {
    caps: HashMap<String, CapState>,
    /// One automatic negotiation pass already ran (or is being skipped).
    pub has_capped: bool,
    /// `CAP END` was sent.
    pub end_sent: bool,
}

impl CapTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a capability, if known.
    pub fn state(&self, name: &str) -> Option<CapState> {
        self.caps.get(&name.to_ascii_lowercase()).copied()
    }

    /// Record or update a capability's state.
    pub fn set(&mut self, name: &str, state: CapState) {
        self.caps.insert(name.to_ascii_lowercase(), state);
    }

    /// Whether a capability is known at all.
    pub fn is_known(&self, name: &str) -> bool {
        self.caps.contains_key(&name.to_ascii_lowercase())
    }

    /// Whether a capability is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.state(name) == Some(CapState::Enabled)
    }

    /// Names of capabilities currently in the given state.
    pub fn in_state(&self, state: CapState) -> Vec<&str> {
        self.caps
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(n, _)| n.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_query() {
        let mut table = CapTable::new();
        table.set("Multi-Prefix", CapState::Pending);
        assert_eq!(table.state("multi-prefix"), Some(CapState::Pending));
        assert!(table.is_known("MULTI-PREFIX"));
        assert!(!table.is_enabled("multi-prefix"));

        table.set("multi-prefix", CapState::Enabled);
        assert!(table.is_enabled("multi-prefix"));
    }
}
