//! Ordered mode sets.
//!
//! Mode importance on IRC is not fixed; it is learned at runtime from the
//! server's ISUPPORT `PREFIX` and `CHANMODES` tokens. A [`ModeManager`] is
//! an ordered character set where the position of a mode encodes its
//! importance (index 0 = least important). [`PrefixModeManager`] adds the
//! parallel prefix-character string used for channel user modes
//! (`(ov)@+` style).
//!
//! Mode *strings* held on channels and memberships are ordered the other
//! way around: most important mode first, so that the first character of a
//! membership's mode string is its display prefix.

/// An ordered set of mode characters, least important first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeManager {
    order: String,
}

impl ModeManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager pre-seeded with modes in increasing importance.
    pub fn with_modes(modes: &str) -> Self {
        Self {
            order: modes.to_string(),
        }
    }

    /// Forget all known modes.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Learn a mode. New modes are appended, becoming the most important
    /// known so far. No-op if already known.
    pub fn add(&mut self, mode: char) {
        if !self.is_mode(mode) {
            self.order.push(mode);
        }
    }

    /// Whether `mode` is a known mode character.
    pub fn is_mode(&self, mode: char) -> bool {
        self.order.contains(mode)
    }

    /// All known modes, least important first.
    pub fn modes(&self) -> &str {
        &self.order
    }

    /// Number of known modes.
    pub fn len(&self) -> usize {
        self.order.chars().count()
    }

    /// Whether no modes are known.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Importance rank of a mode; `None` if unknown.
    fn rank(&self, mode: char) -> Option<usize> {
        self.order.chars().position(|c| c == mode)
    }

    /// Compare the importance of two mode strings by their first character.
    ///
    /// Returns a positive value if `a` outranks `b`, negative if `b`
    /// outranks `a`, zero if equal. An empty string or unknown mode ranks
    /// lowest.
    pub fn compare_importance(&self, a: &str, b: &str) -> i32 {
        let rank_of = |s: &str| -> i32 {
            s.chars()
                .next()
                .and_then(|c| self.rank(c))
                .map(|r| r as i32)
                .unwrap_or(-1)
        };
        rank_of(a) - rank_of(b)
    }

    /// Insert `mode` into the importance-ordered (descending) string
    /// `existing`, returning the updated string.
    ///
    /// Idempotent: if `mode` is already present the string is returned
    /// unchanged. Otherwise it is placed immediately before the first mode
    /// of strictly lower importance, or appended if none ranks lower.
    pub fn insert_mode(&self, existing: &str, mode: char) -> String {
        if existing.contains(mode) {
            return existing.to_string();
        }
        let new_rank = self.rank(mode).map(|r| r as i32).unwrap_or(-1);
        let mut result = String::with_capacity(existing.len() + 1);
        let mut inserted = false;
        for c in existing.chars() {
            let rank = self.rank(c).map(|r| r as i32).unwrap_or(-1);
            if !inserted && rank < new_rank {
                result.push(mode);
                inserted = true;
            }
            result.push(c);
        }
        if !inserted {
            result.push(mode);
        }
        result
    }

    /// Remove `mode` from `existing`, returning the updated string.
    pub fn remove_mode(&self, existing: &str, mode: char) -> String {
        existing.chars().filter(|&c| c != mode).collect()
    }
}

/// A [`ModeManager`] with a parallel prefix-character string.
///
/// The two strings are index-aligned: the mode and prefix at the same
/// index share a rank. Both must be extended together via [`add`].
///
/// [`add`]: PrefixModeManager::add
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixModeManager {
    modes: ModeManager,
    prefixes: String,
}

impl PrefixModeManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all known modes and prefixes.
    pub fn clear(&mut self) {
        self.modes.clear();
        self.prefixes.clear();
    }

    /// Learn a mode/prefix pair, becoming the most important known so far.
    pub fn add(&mut self, mode: char, prefix: char) {
        if !self.modes.is_mode(mode) {
            self.modes.add(mode);
            self.prefixes.push(prefix);
        }
    }

    /// Access the underlying ordered mode set.
    pub fn modes(&self) -> &ModeManager {
        &self.modes
    }

    /// Whether `mode` is a known prefix mode.
    pub fn is_mode(&self, mode: char) -> bool {
        self.modes.is_mode(mode)
    }

    /// Whether `prefix` is a known prefix character.
    pub fn is_prefix(&self, prefix: char) -> bool {
        self.prefixes.contains(prefix)
    }

    /// The display prefix for a mode, if known.
    pub fn prefix_for(&self, mode: char) -> Option<char> {
        let idx = self.modes.modes().chars().position(|c| c == mode)?;
        self.prefixes.chars().nth(idx)
    }

    /// The mode for a display prefix, if known.
    pub fn mode_for(&self, prefix: char) -> Option<char> {
        let idx = self.prefixes.chars().position(|c| c == prefix)?;
        self.modes.modes().chars().nth(idx)
    }

    /// Insert `mode` into a membership mode string, importance-ordered.
    pub fn insert_mode(&self, existing: &str, mode: char) -> String {
        self.modes.insert_mode(existing, mode)
    }

    /// Remove `mode` from a membership mode string.
    pub fn remove_mode(&self, existing: &str, mode: char) -> String {
        self.modes.remove_mode(existing, mode)
    }

    /// Whether a membership mode string confers op-like status.
    ///
    /// True iff the string is non-empty and its first (most important)
    /// mode outranks voice. If voice is not a known mode, any mode
    /// qualifies.
    pub fn is_opped(&self, mode_string: &str) -> bool {
        let Some(first) = mode_string.chars().next() else {
            return false;
        };
        match self.modes.rank('v') {
            Some(voice_rank) => self
                .modes
                .rank(first)
                .map(|r| r > voice_rank)
                .unwrap_or(false),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_prefix_manager() -> PrefixModeManager {
        let mut pm = PrefixModeManager::new();
        pm.add('v', '+');
        pm.add('h', '%');
        pm.add('o', '@');
        pm
    }

    #[test]
    fn insert_mode_is_idempotent() {
        let mm = ModeManager::with_modes("vho");
        let s = mm.insert_mode("o", 'o');
        assert_eq!(s, "o");
    }

    #[test]
    fn insert_mode_orders_by_importance() {
        let mm = ModeManager::with_modes("vho");
        // Insert in reverse-importance order and in importance order;
        // the result must be identical.
        let a = mm.insert_mode(&mm.insert_mode("", 'v'), 'o');
        let b = mm.insert_mode(&mm.insert_mode("", 'o'), 'v');
        assert_eq!(a, "ov");
        assert_eq!(b, "ov");
    }

    #[test]
    fn insert_unknown_mode_appends() {
        let mm = ModeManager::with_modes("vho");
        assert_eq!(mm.insert_mode("ov", 'z'), "ovz");
    }

    #[test]
    fn remove_mode() {
        let mm = ModeManager::with_modes("vho");
        assert_eq!(mm.remove_mode("ohv", 'h'), "ov");
        assert_eq!(mm.remove_mode("ov", 'z'), "ov");
    }

    #[test]
    fn compare_importance() {
        let mm = ModeManager::with_modes("vho");
        assert!(mm.compare_importance("o", "v") > 0);
        assert!(mm.compare_importance("v", "h") < 0);
        assert_eq!(mm.compare_importance("o", "o"), 0);
        // Absent ranks lowest.
        assert!(mm.compare_importance("v", "") > 0);
    }

    #[test]
    fn prefix_lookup_is_index_aligned() {
        let pm = default_prefix_manager();
        assert_eq!(pm.prefix_for('o'), Some('@'));
        assert_eq!(pm.prefix_for('v'), Some('+'));
        assert_eq!(pm.mode_for('%'), Some('h'));
        assert_eq!(pm.mode_for('~'), None);
    }

    #[test]
    fn is_opped() {
        let pm = default_prefix_manager();
        assert!(!pm.is_opped(""));
        assert!(pm.is_opped("o"));
        assert!(pm.is_opped("hv"));
        assert!(!pm.is_opped("v"));
    }

    #[test]
    fn is_opped_without_voice() {
        let mut pm = PrefixModeManager::new();
        pm.add('h', '%');
        pm.add('o', '@');
        // Voice unknown: any mode qualifies.
        assert!(pm.is_opped("h"));
        assert!(!pm.is_opped(""));
    }
}
