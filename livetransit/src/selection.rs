//! The user's vehicle filter.
//!
//! A selection is a set of tokens. Two special shapes exist:
//!
//! - the empty set means "show everything", unknown vehicles included
//! - the set `{__NONE__}` means "show nothing"; the sentinel never coexists
//!   with other tokens
//!
//! Any other token is a normalized line code or a [`CategoryToken`] storage
//! string. For buses and boats, category tokens take precedence over line
//! codes: once any category of a mode is selected, vehicles of that mode are
//! matched by category alone.
//!
//! # State machine
//!
//! ```text
//!        toggle                 toggle off last
//!   ALL ───────► PARTIAL ◄──────────────────► NONE
//!    ▲              │    toggle (singleton)     │
//!    └──show_all────┴───────────────────────────┘
//! ```
//!
//! Every transition is persisted through a [`SelectionPersistence`] backend.
//! Persistence failures are logged and otherwise ignored.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::category::{classify, CategoryToken, TransportMode};
use crate::normalize::normalize_line;
use crate::persistence::SelectionPersistence;

/// Sentinel token meaning "show nothing".
pub const NONE_TOKEN: &str = "__NONE__";

/// Coarse shape of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Empty set: everything visible.
    All,
    /// Some explicit tokens.
    Partial,
    /// Sentinel: nothing visible.
    None,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::All => "all",
            SelectionMode::Partial => "partial",
            SelectionMode::None => "none",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The facts about a vehicle that filtering depends on.
#[derive(Debug, Clone, Copy)]
pub struct FilterSubject<'a> {
    pub mode: TransportMode,
    pub line: &'a str,
    pub description: &'a str,
    /// Trip could not be resolved.
    pub unknown: bool,
}

/// A selection token set with its invariants enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    tokens: BTreeSet<String>,
}

impl SelectionState {
    /// The "show everything" selection.
    pub fn all() -> Self {
        Self::default()
    }

    /// The "show nothing" selection.
    pub fn none() -> Self {
        Self {
            tokens: BTreeSet::from([NONE_TOKEN.to_string()]),
        }
    }

    /// Rebuild a selection from stored tokens.
    ///
    /// Line codes are normalized; category tokens and the sentinel are kept
    /// verbatim. Empty tokens are dropped, and a stored sentinel wins over
    /// everything else.
    pub fn from_stored<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for raw in tokens {
            let raw = raw.as_ref();
            if raw == NONE_TOKEN {
                return Self::none();
            }
            let token = if raw.parse::<CategoryToken>().is_ok() {
                raw.to_string()
            } else {
                normalize_line(raw)
            };
            if !token.is_empty() {
                set.insert(token);
            }
        }
        Self { tokens: set }
    }

    pub fn mode(&self) -> SelectionMode {
        if self.tokens.contains(NONE_TOKEN) {
            SelectionMode::None
        } else if self.tokens.is_empty() {
            SelectionMode::All
        } else {
            SelectionMode::Partial
        }
    }

    pub fn is_show_all(&self) -> bool {
        self.mode() == SelectionMode::All
    }

    pub fn is_show_none(&self) -> bool {
        self.mode() == SelectionMode::None
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn has_category(&self, token: CategoryToken) -> bool {
        self.tokens.contains(token.as_str())
    }

    /// Whether any category token of `mode` is selected.
    pub fn has_any_category_for(&self, mode: TransportMode) -> bool {
        CategoryToken::for_mode(mode)
            .iter()
            .any(|t| self.has_category(*t))
    }

    /// Tokens in storage order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.tokens.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether a line chip should render as selected.
    ///
    /// Under "show all" every line counts as selected.
    pub fn is_line_selected(&self, line: &str) -> bool {
        match self.mode() {
            SelectionMode::None => false,
            SelectionMode::All => true,
            SelectionMode::Partial => self.tokens.contains(&normalize_line(line)),
        }
    }

    /// Whether a vehicle should be visible under this selection.
    pub fn passes(&self, subject: &FilterSubject<'_>) -> bool {
        match self.mode() {
            SelectionMode::None => return false,
            SelectionMode::All => return true,
            SelectionMode::Partial => {}
        }
        if subject.unknown {
            return false;
        }

        if self.has_any_category_for(subject.mode) {
            if let Some(category) = classify(subject.mode, subject.description) {
                return self.has_category(category);
            }
        }
        self.tokens.contains(&normalize_line(subject.line))
    }

    fn toggle(&mut self, token: String) {
        if self.mode() != SelectionMode::Partial {
            self.tokens = BTreeSet::from([token]);
            return;
        }
        if !self.tokens.remove(&token) {
            self.tokens.insert(token);
        }
        if self.tokens.is_empty() {
            *self = Self::none();
        }
    }
}

impl fmt::Display for SelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode() {
            SelectionMode::All => f.write_str("all"),
            SelectionMode::None => f.write_str("none"),
            SelectionMode::Partial => {
                let joined: Vec<&str> = self.tokens().collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// Selection state bound to its persistence backend.
pub struct SelectionStore {
    state: SelectionState,
    persistence: Arc<dyn SelectionPersistence>,
}

impl SelectionStore {
    /// Load the stored selection, falling back to "show all" on any failure.
    pub fn load(persistence: Arc<dyn SelectionPersistence>) -> Self {
        let state = match persistence.load() {
            Ok(tokens) => SelectionState::from_stored(tokens),
            Err(e) => {
                warn!(
                    location = %persistence.describe(),
                    error = %e,
                    "Failed to load selection, showing all vehicles"
                );
                SelectionState::all()
            }
        };
        info!(
            mode = %state.mode(),
            count = state.len(),
            "Loaded selection"
        );
        Self { state, persistence }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn mode(&self) -> SelectionMode {
        self.state.mode()
    }

    pub fn passes(&self, subject: &FilterSubject<'_>) -> bool {
        self.state.passes(subject)
    }

    /// Show every vehicle.
    pub fn show_all(&mut self) {
        self.state = SelectionState::all();
        self.persist();
    }

    /// Show no vehicles.
    pub fn show_none(&mut self) {
        self.state = SelectionState::none();
        self.persist();
    }

    /// Toggle a line code. Codes that normalize to nothing are ignored.
    pub fn toggle_line(&mut self, raw: &str) {
        let code = normalize_line(raw);
        if code.is_empty() || code == NONE_TOKEN {
            return;
        }
        self.state.toggle(code);
        self.persist();
    }

    /// Toggle a bus or boat category.
    pub fn toggle_category(&mut self, token: CategoryToken) {
        self.state.toggle(token.as_str().to_string());
        self.persist();
    }

    /// Replace the selection from comma-separated text.
    ///
    /// Returns `false`, leaving the selection unchanged, when the text holds no
    /// usable tokens.
    pub fn set_from_text(&mut self, raw: &str) -> bool {
        let tokens: BTreeSet<String> = raw
            .split(',')
            .map(normalize_line)
            .filter(|t| !t.is_empty() && t != NONE_TOKEN)
            .collect();
        if tokens.is_empty() {
            return false;
        }
        self.state = SelectionState { tokens };
        self.persist();
        true
    }

    fn persist(&self) {
        info!(selection = %self.state, "Selection changed");
        if let Err(e) = self.persistence.save(&self.state.to_vec()) {
            warn!(
                location = %self.persistence.describe(),
                error = %e,
                "Failed to save selection"
            );
        }
    }
}

impl fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionStore")
            .field("state", &self.state)
            .field("persistence", &self.persistence.describe())
            .finish()
    }
}

// =============================================================================
// Mode groups
// =============================================================================

/// A chip group in the filter bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeGroup {
    pub key: &'static str,
    pub label: &'static str,
    pub mode: TransportMode,
    /// Rail lines in the group; empty for bus and boat, which use categories.
    pub lines: &'static [&'static str],
}

/// Filter chip groups in display order.
pub const MODE_GROUPS: &[ModeGroup] = &[
    ModeGroup {
        key: "metro",
        label: "Tunnelbana",
        mode: TransportMode::Rail,
        lines: &["10", "11", "13", "14", "17", "18", "19"],
    },
    ModeGroup {
        key: "commuter",
        label: "Pendeltåg",
        mode: TransportMode::Rail,
        lines: &["40", "41", "43", "43X", "48"],
    },
    ModeGroup {
        key: "tram",
        label: "Tvärbanan",
        mode: TransportMode::Rail,
        lines: &["30", "31"],
    },
    ModeGroup {
        key: "roslags",
        label: "Roslagsbanan",
        mode: TransportMode::Rail,
        lines: &["27", "27S", "28", "28S", "29"],
    },
    ModeGroup {
        key: "saltsjo",
        label: "Saltsjöbanan",
        mode: TransportMode::Rail,
        lines: &["25", "26"],
    },
    ModeGroup {
        key: "lidingo",
        label: "Lidingöbanan",
        mode: TransportMode::Rail,
        lines: &["21"],
    },
    ModeGroup {
        key: "nockeby",
        label: "Nockebybanan",
        mode: TransportMode::Rail,
        lines: &["12"],
    },
    ModeGroup {
        key: "city",
        label: "Spårväg City",
        mode: TransportMode::Rail,
        lines: &["7"],
    },
    ModeGroup {
        key: "bus",
        label: "Buss",
        mode: TransportMode::Bus,
        lines: &[],
    },
    ModeGroup {
        key: "boat",
        label: "Färja",
        mode: TransportMode::Boat,
        lines: &[],
    },
];

/// Look up a chip group by key.
pub fn mode_group(key: &str) -> Option<&'static ModeGroup> {
    MODE_GROUPS.iter().find(|g| g.key == key)
}

impl ModeGroup {
    /// Category tokens offered as sub-chips.
    pub fn categories(&self) -> &'static [CategoryToken] {
        CategoryToken::for_mode(self.mode)
    }

    /// Whether the group chip renders as active.
    ///
    /// Rail groups are active when any of their lines is selected. Bus and
    /// boat are active unless nothing is shown, provided one of their
    /// categories is selected or a vehicle of that mode is currently visible.
    pub fn is_active(&self, selection: &SelectionState, mode_visible: bool) -> bool {
        match self.mode {
            TransportMode::Bus | TransportMode::Boat => {
                !selection.is_show_none()
                    && (selection.has_any_category_for(self.mode) || mode_visible)
            }
            TransportMode::Rail | TransportMode::Unknown => {
                self.lines.iter().any(|l| selection.is_line_selected(l))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::persistence::MemorySelectionPersistence;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> (SelectionStore, Arc<MemorySelectionPersistence>) {
        let backend = Arc::new(MemorySelectionPersistence::new());
        (SelectionStore::load(backend.clone()), backend)
    }

    fn rail(line: &str) -> FilterSubject<'_> {
        FilterSubject {
            mode: TransportMode::Rail,
            line,
            description: "",
            unknown: false,
        }
    }

    fn bus<'a>(line: &'a str, description: &'a str) -> FilterSubject<'a> {
        FilterSubject {
            mode: TransportMode::Bus,
            line,
            description,
            unknown: false,
        }
    }

    fn unknown() -> FilterSubject<'static> {
        FilterSubject {
            mode: TransportMode::Unknown,
            line: "?",
            description: "",
            unknown: true,
        }
    }

    #[test]
    fn test_empty_selection_accepts_everything() {
        let state = SelectionState::all();
        assert_eq!(state.mode(), SelectionMode::All);
        assert!(state.passes(&rail("14")));
        assert!(state.passes(&unknown()));
    }

    #[test]
    fn test_none_rejects_everything() {
        let state = SelectionState::none();
        assert!(!state.passes(&rail("14")));
        assert!(!state.passes(&unknown()));
    }

    #[test]
    fn test_partial_rejects_unknown() {
        let state = SelectionState::from_stored(["14"]);
        assert!(state.passes(&rail("14")));
        assert!(!state.passes(&rail("13")));
        assert!(!state.passes(&unknown()));
    }

    #[test]
    fn test_category_tokens_take_precedence_for_mode() {
        let state = SelectionState::from_stored(["__BUS_BLUE__", "176"]);
        // Line 176 is selected, but bus categories are active
        assert!(!state.passes(&bus("176", "")));
        assert!(state.passes(&bus("1", "Blåbuss")));
        // Rail still matches by line
        assert!(!state.passes(&rail("14")));
    }

    #[test]
    fn test_bus_by_line_without_categories() {
        let state = SelectionState::from_stored(["176"]);
        assert!(state.passes(&bus("176", "Blåbuss")));
        assert!(!state.passes(&bus("177", "")));
    }

    #[test]
    fn test_toggle_from_all_gives_singleton() {
        let (mut store, backend) = store();
        store.toggle_line("14");
        assert_eq!(store.state().to_vec(), vec!["14"]);
        assert_eq!(backend.stored(), Some(vec!["14".to_string()]));
    }

    #[test]
    fn test_toggle_from_none_gives_singleton() {
        let (mut store, _) = store();
        store.show_none();
        store.toggle_category(CategoryToken::BoatWaxholm);
        assert_eq!(store.state().to_vec(), vec!["__BOAT_WAX__"]);
    }

    #[test]
    fn test_toggling_off_last_token_gives_none() {
        let (mut store, backend) = store();
        store.toggle_line("14");
        store.toggle_line("14");
        assert_eq!(store.mode(), SelectionMode::None);
        assert_eq!(backend.stored(), Some(vec![NONE_TOKEN.to_string()]));
    }

    #[test]
    fn test_toggle_adds_and_removes() {
        let (mut store, _) = store();
        store.toggle_line("14");
        store.toggle_line("13");
        assert_eq!(store.state().len(), 2);
        store.toggle_line("14");
        assert_eq!(store.state().to_vec(), vec!["13"]);
    }

    #[test]
    fn test_toggle_empty_line_is_ignored() {
        let (mut store, backend) = store();
        store.toggle_line("   ");
        assert!(store.state().is_show_all());
        assert_eq!(backend.stored(), None);
    }

    #[test]
    fn test_set_from_text() {
        let (mut store, _) = store();
        assert!(store.set_from_text(" 14, 43x ,,__NONE__"));
        assert_eq!(store.state().to_vec(), vec!["14", "43X"]);

        assert!(!store.set_from_text(" , ,__NONE__"));
        assert_eq!(store.state().to_vec(), vec!["14", "43X"]);
    }

    #[test]
    fn test_show_all_and_none() {
        let (mut store, _) = store();
        store.toggle_line("10");
        store.show_none();
        assert!(store.state().is_show_none());
        store.show_all();
        assert!(store.state().is_show_all());
    }

    #[test]
    fn test_load_normalizes_lines_and_keeps_tokens() {
        let backend = Arc::new(MemorySelectionPersistence::with_tokens([
            " 43 x",
            "__BUS_NEAR__",
            "",
        ]));
        let store = SelectionStore::load(backend);
        assert_eq!(store.state().to_vec(), vec!["43X", "__BUS_NEAR__"]);
    }

    #[test]
    fn test_load_sentinel_wins() {
        let state = SelectionState::from_stored(["14", NONE_TOKEN]);
        assert_eq!(state, SelectionState::none());
    }

    #[test]
    fn test_is_line_selected() {
        assert!(SelectionState::all().is_line_selected("14"));
        assert!(!SelectionState::none().is_line_selected("14"));
        let state = SelectionState::from_stored(["14"]);
        assert!(state.is_line_selected(" 14 "));
        assert!(!state.is_line_selected("13"));
    }

    #[test]
    fn test_group_activity() {
        let metro = mode_group("metro").unwrap();
        let bus_group = mode_group("bus").unwrap();

        let state = SelectionState::from_stored(["14"]);
        assert!(metro.is_active(&state, false));
        assert!(!mode_group("tram").unwrap().is_active(&state, false));

        assert!(!bus_group.is_active(&state, false));
        assert!(bus_group.is_active(&state, true));
        assert!(bus_group.is_active(&SelectionState::from_stored(["__BUS_RED__"]), false));
        assert!(!bus_group.is_active(&SelectionState::none(), true));
    }

    #[test]
    fn test_mode_groups_cover_bus_and_boat() {
        assert_eq!(mode_group("bus").unwrap().categories().len(), 4);
        assert_eq!(mode_group("boat").unwrap().categories().len(), 2);
        assert!(mode_group("metro").unwrap().categories().is_empty());
        assert!(mode_group("monorail").is_none());
    }

    /// Backend that can load but never save.
    struct ReadOnlyPersistence {
        save_attempts: AtomicUsize,
    }

    impl SelectionPersistence for ReadOnlyPersistence {
        fn load(&self) -> Result<Vec<String>, PersistenceError> {
            Ok(Vec::new())
        }

        fn save(&self, _tokens: &[String]) -> Result<(), PersistenceError> {
            self.save_attempts.fetch_add(1, Ordering::SeqCst);
            Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn describe(&self) -> String {
            "read-only".to_string()
        }
    }

    #[test]
    fn test_save_failure_keeps_in_memory_changes() {
        let backend = Arc::new(ReadOnlyPersistence {
            save_attempts: AtomicUsize::new(0),
        });
        let mut store = SelectionStore::load(backend.clone());

        store.toggle_line("14");
        assert_eq!(store.mode(), SelectionMode::Partial);
        assert!(store.passes(&rail("14")));
        assert!(!store.passes(&rail("13")));

        store.show_none();
        assert_eq!(store.mode(), SelectionMode::None);

        assert!(store.set_from_text("17, 43x"));
        assert!(store.state().contains("43X"));
        assert!(store.passes(&rail("17")));

        assert_eq!(backend.save_attempts.load(Ordering::SeqCst), 3);
    }
}
