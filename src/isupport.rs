//! ISUPPORT (005) token table and server-family detection.
//!
//! The server advertises feature limits and mode classes through
//! `RPL_ISUPPORT` tokens; several of them (`CASEMAPPING`, `CHANMODES`,
//! `PREFIX`, `CHANTYPES`) change how the rest of the engine parses lines.
//! The server *family*, detected from the 004 version string, feeds the
//! list-mode numeric disambiguation heuristic.

use std::collections::HashMap;

/// Parsed ISUPPORT key/value table.
///
/// Keys are stored uppercased; a key present without a value maps to
/// `None`.
#[derive(Debug, Clone, Default)]
pub struct Isupport {
    entries: HashMap<String, Option<String>>,
}

impl Isupport {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one `KEY` or `KEY=VALUE` token. A leading `-` removes a
    /// previously advertised key.
    pub fn insert_token(&mut self, token: &str) {
        if let Some(removed) = token.strip_prefix('-') {
            self.entries.remove(&removed.to_ascii_uppercase());
            return;
        }
        match token.split_once('=') {
            Some((k, v)) => self
                .entries
                .insert(k.to_ascii_uppercase(), Some(v.to_string())),
            None => self.entries.insert(token.to_ascii_uppercase(), None),
        };
    }

    /// Look up a key. `Some(None)` means present without a value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .get(&key.to_ascii_uppercase())
            .map(|v| v.as_deref())
    }

    /// Value of a key, if present with a value.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).flatten()
    }

    /// The `NETWORK` name.
    pub fn network(&self) -> Option<&str> {
        self.value("NETWORK")
    }

    /// The `CHANTYPES` prefix characters (default `#&`).
    pub fn chantypes(&self) -> &str {
        self.value("CHANTYPES").unwrap_or("#&")
    }

    /// The advertised `CASEMAPPING`, if any.
    pub fn casemapping(&self) -> Option<&str> {
        self.value("CASEMAPPING")
    }

    /// Parse the `CHANMODES` token, if present.
    pub fn chanmodes(&self) -> Option<ChanModeClasses> {
        self.value("CHANMODES").and_then(ChanModeClasses::parse)
    }

    /// Parse the `PREFIX` token, if present.
    pub fn prefix(&self) -> Option<PrefixSpec> {
        self.value("PREFIX").and_then(PrefixSpec::parse)
    }
}

/// The four CHANMODES classes.
///
/// Type A modes are list modes, type B always take a parameter, type C
/// take a parameter only when set, type D are boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChanModeClasses {
    /// Type A: list modes (`b`, `e`, `I`, ...).
    pub list: String,
    /// Type B: parameter on set and unset (`k`, ...).
    pub always_param: String,
    /// Type C: parameter on set only (`l`, ...).
    pub set_param: String,
    /// Type D: boolean modes (`imnpst`, ...).
    pub boolean: String,
}

impl ChanModeClasses {
    /// Parse a `A,B,C,D` CHANMODES value. Extra classes beyond the fourth
    /// are ignored; fewer than four yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(',');
        Some(Self {
            list: parts.next()?.to_string(),
            always_param: parts.next()?.to_string(),
            set_param: parts.next()?.to_string(),
            boolean: parts.next()?.to_string(),
        })
    }
}

/// Parsed `PREFIX` token: mode/prefix pairs, most important first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSpec {
    /// `(mode, prefix)` pairs in advertised (descending importance) order.
    pub pairs: Vec<(char, char)>,
}

impl PrefixSpec {
    /// Parse a `(modes)prefixes` value such as `(qaohv)~&@%+`.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix('(')?;
        let close = rest.find(')')?;
        let modes: Vec<char> = rest[..close].chars().collect();
        let prefixes: Vec<char> = rest[close + 1..].chars().collect();
        if modes.len() != prefixes.len() || modes.is_empty() {
            return None;
        }
        Some(Self {
            pairs: modes.into_iter().zip(prefixes).collect(),
        })
    }
}

/// Server software family, detected from the 004 version string.
///
/// List-mode numerics are reused with different meanings across families;
/// the family drives the disambiguation heuristic in the list-mode
/// processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ServerFamily {
    /// Unknown or undetected software.
    #[default]
    Unknown,
    /// ircu and derivatives.
    Ircu,
    /// QuakeNet's snircd (ircu derivative).
    Snircd,
    /// ircd-hybrid.
    Hybrid,
    /// ircd-ratbox.
    Ratbox,
    /// charybdis / solanum / ircd-seven.
    Charybdis,
    /// InspIRCd.
    Inspircd,
    /// UnrealIRCd.
    Unreal,
    /// IRCnet's ircd (2.11+).
    Ircnet,
}

impl ServerFamily {
    /// Best-effort detection from a 004 version string.
    pub fn detect(version: &str) -> Self {
        let v = version.to_ascii_lowercase();
        if v.contains("snircd") {
            Self::Snircd
        } else if v.contains("u2.") || v.contains("ircu") {
            Self::Ircu
        } else if v.contains("hybrid") {
            Self::Hybrid
        } else if v.contains("ratbox") {
            Self::Ratbox
        } else if v.contains("charybdis") || v.contains("solanum") || v.contains("ircd-seven") {
            Self::Charybdis
        } else if v.contains("inspircd") {
            Self::Inspircd
        } else if v.contains("unreal") {
            Self::Unreal
        } else if v.starts_with("2.1") || v.contains("irc2.") {
            Self::Ircnet
        } else {
            Self::Unknown
        }
    }

    /// Families known to reuse the 344/345 numeric pair for something
    /// other than the reop list.
    pub fn reuses_reop_numerics(self) -> bool {
        matches!(self, Self::Ircu | Self::Snircd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut isupport = Isupport::new();
        isupport.insert_token("NETWORK=TestNet");
        isupport.insert_token("EXCEPTS");
        isupport.insert_token("chantypes=#");

        assert_eq!(isupport.network(), Some("TestNet"));
        assert_eq!(isupport.get("EXCEPTS"), Some(None));
        assert_eq!(isupport.chantypes(), "#");
        assert_eq!(isupport.get("INVEX"), None);
    }

    #[test]
    fn negated_token_removes() {
        let mut isupport = Isupport::new();
        isupport.insert_token("EXCEPTS");
        isupport.insert_token("-EXCEPTS");
        assert_eq!(isupport.get("EXCEPTS"), None);
    }

    #[test]
    fn chanmodes_classes() {
        let classes = ChanModeClasses::parse("beI,k,l,imnpst").unwrap();
        assert_eq!(classes.list, "beI");
        assert_eq!(classes.always_param, "k");
        assert_eq!(classes.set_param, "l");
        assert_eq!(classes.boolean, "imnpst");

        assert_eq!(ChanModeClasses::parse("b,k,l"), None);
    }

    #[test]
    fn prefix_spec() {
        let spec = PrefixSpec::parse("(qaohv)~&@%+").unwrap();
        assert_eq!(spec.pairs[0], ('q', '~'));
        assert_eq!(spec.pairs[4], ('v', '+'));

        assert_eq!(PrefixSpec::parse("(ov)@"), None);
        assert_eq!(PrefixSpec::parse("ov@+"), None);
    }

    #[test]
    fn family_detection() {
        assert_eq!(
            ServerFamily::detect("u2.10.12.19+snircd(1.3.4a)"),
            ServerFamily::Snircd
        );
        assert_eq!(ServerFamily::detect("u2.10.12.10"), ServerFamily::Ircu);
        assert_eq!(
            ServerFamily::detect("charybdis-4-rc3"),
            ServerFamily::Charybdis
        );
        assert_eq!(
            ServerFamily::detect("InspIRCd-3"),
            ServerFamily::Inspircd
        );
        assert_eq!(ServerFamily::detect("2.11.2p3"), ServerFamily::Ircnet);
        assert_eq!(ServerFamily::detect("weird-1.0"), ServerFamily::Unknown);
    }
}
