//! Credential and capability checks over an immutable configuration
//! snapshot. Nothing here performs I/O or blocks.

use bitflags::bitflags;

use crate::{
    config::{Config, GroupConfig},
    world::EventKind,
};

bitflags! {
    /// Command categories a group may invoke.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capability: u32 {
        const MOVEMENT = 1 << 0;
        const ECONOMY = 1 << 1;
        const LAND = 1 << 2;
        const INVENTORY = 1 << 3;
        const DATABASE = 1 << 4;
        const NOTIFICATIONS = 1 << 5;
        const TALK = 1 << 6;
        const GROUP = 1 << 7;
        const FRIENDSHIP = 1 << 8;
        const GRID = 1 << 9;
    }
}

impl Capability {
    const NAMES: [(Self, &'static str); 10] = [
        (Self::MOVEMENT, "movement"),
        (Self::ECONOMY, "economy"),
        (Self::LAND, "land"),
        (Self::INVENTORY, "inventory"),
        (Self::DATABASE, "database"),
        (Self::NOTIFICATIONS, "notifications"),
        (Self::TALK, "talk"),
        (Self::GROUP, "group"),
        (Self::FRIENDSHIP, "friendship"),
        (Self::GRID, "grid"),
    ];

    pub fn flag_from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(_, label)| *label == name)
            .map(|(flag, _)| *flag)
    }

    /// Folds a list of capability names into a mask. Returns the first
    /// unrecognized name on failure.
    pub fn from_names<I, S>(names: I) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mask = Self::empty();
        for name in names {
            let name = name.as_ref();
            mask |= Self::flag_from_name(name).ok_or_else(|| name.to_string())?;
        }
        Ok(mask)
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect()
    }

    /// Label for a single-bit mask, used in authorization errors.
    pub fn label(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, label)| *label)
            .unwrap_or("unknown")
    }
}

/// True iff a configured group with exactly this name carries exactly this
/// credential. Case-sensitive on both; empty credentials never match.
pub fn authenticate(snapshot: &Config, group: &str, password: &str) -> bool {
    if password.is_empty() {
        return false;
    }
    snapshot
        .group(group)
        .map(|g| g.password == password)
        .unwrap_or(false)
}

pub fn has_capability(group: &GroupConfig, capability: Capability) -> bool {
    !capability.is_empty() && group.capabilities.contains(capability)
}

pub fn has_notification(group: &GroupConfig, kind: EventKind) -> bool {
    !kind.is_empty() && group.notifications.contains(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::group_named;

    fn config_with(groups: Vec<GroupConfig>) -> Config {
        Config {
            groups,
            ..Config::default()
        }
    }

    #[test]
    fn authenticate_is_exact_and_case_sensitive() {
        let config = config_with(vec![group_named("Tester", "secret")]);
        assert!(authenticate(&config, "Tester", "secret"));
        assert!(!authenticate(&config, "tester", "secret"));
        assert!(!authenticate(&config, "Tester", "Secret"));
        assert!(!authenticate(&config, "Tester", ""));
        assert!(!authenticate(&config, "Other", "secret"));
        assert!(!authenticate(&config, "", ""));
    }

    #[test]
    fn empty_capability_never_passes() {
        let mut group = group_named("Tester", "secret");
        group.capabilities = Capability::all();
        assert!(!has_capability(&group, Capability::empty()));
        assert!(has_capability(&group, Capability::ECONOMY));
    }

    #[test]
    fn capability_names_round_trip() {
        let mask = Capability::from_names(["economy", "talk"]).unwrap();
        assert_eq!(mask, Capability::ECONOMY | Capability::TALK);
        assert_eq!(mask.names(), vec!["economy", "talk"]);
        assert_eq!(
            Capability::from_names(["economy", "bogus"]),
            Err("bogus".to_string())
        );
    }
}
