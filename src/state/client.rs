//! Per-user identity records.

/// Three-valued away state.
///
/// `Unknown` is the initial state for every client until a WHO reply, an
/// AWAY notification, or a 301/305/306 numeric settles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AwayState {
    /// Known to be present.
    Here,
    /// Known to be away.
    Away,
    /// Not yet known.
    #[default]
    Unknown,
}

/// Identity record for a user seen on the session.
///
/// Clients are created lazily on first sighting (JOIN, NAMES, WHO, a
/// message source) and destroyed on QUIT. The local client may start as a
/// placeholder (`fake`) until the welcome reply confirms the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Current nickname (identity key, case-mapped by the session).
    pub nickname: String,
    /// Username/ident, empty until discovered.
    pub username: String,
    /// Hostname, empty until discovered.
    pub hostname: String,
    /// Realname/gecos, empty until discovered.
    pub realname: String,
    /// Services account, if logged in.
    pub account: Option<String>,
    /// User modes, most important first.
    pub modes: String,
    /// Away state.
    pub away: AwayState,
    /// Away reason, empty unless known.
    pub away_reason: String,
    /// Placeholder created before the server confirmed the identity.
    pub fake: bool,
}

impl Client {
    /// Create a client knowing only the nickname.
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            username: String::new(),
            hostname: String::new(),
            realname: String::new(),
            account: None,
            modes: String::new(),
            away: AwayState::Unknown,
            away_reason: String::new(),
            fake: false,
        }
    }

    /// Create the pre-registration local placeholder.
    pub fn placeholder(nickname: impl Into<String>) -> Self {
        Self {
            fake: true,
            ..Self::new(nickname)
        }
    }

    /// Update username/hostname from a `nick!user@host` source, keeping
    /// existing values when the source lacks them.
    pub fn update_from_source(&mut self, source: &str) {
        let (nick_user, host) = match source.split_once('@') {
            Some((nu, h)) => (nu, Some(h)),
            None => (source, None),
        };
        if let Some((_, user)) = nick_user.split_once('!') {
            if !user.is_empty() {
                self.username = user.to_string();
            }
        }
        if let Some(host) = host {
            if !host.is_empty() {
                self.hostname = host.to_string();
            }
        }
    }

    /// The `nick!user@host` mask as currently known.
    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nickname, self.username, self.hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_from_source_fills_fields() {
        let mut client = Client::new("nick");
        client.update_from_source("nick!user@example.host");
        assert_eq!(client.username, "user");
        assert_eq!(client.hostname, "example.host");
        assert_eq!(client.hostmask(), "nick!user@example.host");
    }

    #[test]
    fn update_from_bare_nick_keeps_existing() {
        let mut client = Client::new("nick");
        client.update_from_source("nick!user@host");
        client.update_from_source("nick");
        assert_eq!(client.username, "user");
        assert_eq!(client.hostname, "host");
    }

    #[test]
    fn placeholder_is_fake() {
        let client = Client::placeholder("me");
        assert!(client.fake);
        assert_eq!(client.away, AwayState::Unknown);
    }
}
