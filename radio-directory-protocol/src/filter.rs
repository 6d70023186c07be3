//! Program filter evaluation.
//!
//! A [`ProgramFilter`] is a conjunction of independent clauses. Each clause
//! passes trivially when empty:
//!
//! 1. `identifier_types`: some identifier of the entry has one of the kinds.
//! 2. `identifiers`: some identifier of the entry equals one of the values.
//! 3. `include_categories`: when false, grouping nodes are excluded.
//!
//! `exclude_modifications` is not part of [`matches`]; it is applied by the
//! directory as a pre-filter on modified entries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identifier::{Identifier, IdentifierType};
use crate::types::ProgramInfo;

/// Filter over program directory entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramFilter {
    /// Accepted identifier kinds (empty = any).
    #[serde(default)]
    pub identifier_types: BTreeSet<IdentifierType>,
    /// Accepted identifier values (empty = any).
    #[serde(default)]
    pub identifiers: BTreeSet<Identifier>,
    /// Include non-tunable grouping nodes.
    #[serde(default)]
    pub include_categories: bool,
    /// Once a key has been delivered, drop later modifications to it.
    #[serde(default)]
    pub exclude_modifications: bool,
}

impl ProgramFilter {
    /// Filter that accepts every entry, categories included.
    pub fn all() -> Self {
        Self {
            include_categories: true,
            ..Default::default()
        }
    }

    /// Restrict to entries carrying one of the given kinds.
    pub fn with_types(mut self, types: impl IntoIterator<Item = IdentifierType>) -> Self {
        self.identifier_types.extend(types);
        self
    }

    /// Restrict to entries carrying one of the given identifiers.
    pub fn with_identifiers(mut self, ids: impl IntoIterator<Item = Identifier>) -> Self {
        self.identifiers.extend(ids);
        self
    }

    /// Include grouping nodes.
    pub fn including_categories(mut self) -> Self {
        self.include_categories = true;
        self
    }

    /// Drop modifications to keys already delivered.
    pub fn excluding_modifications(mut self) -> Self {
        self.exclude_modifications = true;
        self
    }

    /// Evaluate the filter against an entry.
    pub fn matches(&self, entry: &ProgramInfo) -> bool {
        matches(entry, self)
    }
}

/// Evaluate `filter` against `entry`.
///
/// Deterministic and free of side effects.
///
/// # Example
/// ```
/// use radio_directory_protocol::{Identifier, IdentifierType, ProgramFilter, ProgramInfo, ProgramSelector};
/// use radio_directory_protocol::filter::matches;
///
/// let station = ProgramInfo::new(ProgramSelector::with_secondary(
///     Identifier::amfm_frequency(97_300),
///     vec![Identifier::rds_pi(0x1234)],
/// ));
///
/// let rds_only = ProgramFilter::default().with_types([IdentifierType::RdsPi]);
/// assert!(matches(&station, &rds_only));
///
/// let dab_only = ProgramFilter::default().with_types([IdentifierType::DabSidExt]);
/// assert!(!matches(&station, &dab_only));
/// ```
pub fn matches(entry: &ProgramInfo, filter: &ProgramFilter) -> bool {
    if !filter.include_categories && entry.is_category() {
        return false;
    }

    let selector = &entry.selector;

    let types_ok = filter.identifier_types.is_empty()
        || selector
            .identifiers()
            .any(|id| filter.identifier_types.contains(&id.kind));

    let identifiers_ok = filter.identifiers.is_empty()
        || selector.identifiers().any(|id| filter.identifiers.contains(id));

    types_ok && identifiers_ok
}

/// Evaluate an optional filter; `None` accepts everything.
pub fn matches_optional(entry: &ProgramInfo, filter: Option<&ProgramFilter>) -> bool {
    filter.map_or(true, |f| matches(entry, f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::ProgramSelector;

    fn fm_station(khz: u32, pi: u16) -> ProgramInfo {
        ProgramInfo::new(ProgramSelector::with_secondary(
            Identifier::amfm_frequency(khz),
            vec![Identifier::rds_pi(pi)],
        ))
    }

    fn ensemble(id: u16) -> ProgramInfo {
        ProgramInfo::new(ProgramSelector::new(Identifier::dab_ensemble(id)))
    }

    #[test]
    fn test_empty_filter_passes_stations_not_categories() {
        let filter = ProgramFilter::default();
        assert!(filter.matches(&fm_station(88_100, 1)));
        assert!(!filter.matches(&ensemble(0xCE15)));

        assert!(ProgramFilter::all().matches(&ensemble(0xCE15)));
    }

    #[test]
    fn test_type_clause_checks_secondary() {
        let station = fm_station(88_100, 1);
        let filter = ProgramFilter::default().with_types([IdentifierType::RdsPi]);
        assert!(filter.matches(&station));

        let filter = ProgramFilter::default().with_types([IdentifierType::HdStationName]);
        assert!(!filter.matches(&station));
    }

    #[test]
    fn test_identifier_clause() {
        let station = fm_station(88_100, 0x4242);

        let by_primary =
            ProgramFilter::default().with_identifiers([Identifier::amfm_frequency(88_100)]);
        assert!(by_primary.matches(&station));

        let by_secondary = ProgramFilter::default().with_identifiers([Identifier::rds_pi(0x4242)]);
        assert!(by_secondary.matches(&station));

        let other = ProgramFilter::default().with_identifiers([Identifier::amfm_frequency(88_300)]);
        assert!(!other.matches(&station));
    }

    #[test]
    fn test_clauses_are_conjunctive() {
        let station = fm_station(88_100, 0x4242);
        let filter = ProgramFilter::default()
            .with_types([IdentifierType::RdsPi])
            .with_identifiers([Identifier::amfm_frequency(99_900)]);
        assert!(!filter.matches(&station));

        let filter = ProgramFilter::default()
            .with_types([IdentifierType::RdsPi])
            .with_identifiers([Identifier::amfm_frequency(88_100)]);
        assert!(filter.matches(&station));
    }

    #[test]
    fn test_category_excluded_regardless_of_other_clauses() {
        let node = ensemble(0xCE15);
        let filter = ProgramFilter::default()
            .with_types([IdentifierType::DabEnsemble])
            .with_identifiers([Identifier::dab_ensemble(0xCE15)]);
        assert!(!filter.matches(&node));
        assert!(filter.including_categories().matches(&node));
    }

    #[test]
    fn test_exclude_modifications_does_not_affect_matching() {
        let station = fm_station(88_100, 1);
        let filter = ProgramFilter::default().excluding_modifications();
        assert!(filter.matches(&station));
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let station = fm_station(104_500, 7);
        let filter = ProgramFilter::default().with_types([IdentifierType::AmFmFrequency]);
        let first = matches(&station, &filter);
        let second = matches(&station, &filter);
        assert_eq!(first, second);
        assert!(matches_optional(&station, None));
    }
}
