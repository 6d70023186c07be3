//! Program selector: the identity of one logical station.

use serde::{Deserialize, Serialize};

use crate::identifier::{technology_of, Identifier, IdentifierType, RadioTechnology};

/// A station reference made of one primary identifier and any number of
/// secondary identifiers.
///
/// Two selectors denote the same station iff their primary identifiers are
/// equal. Secondary identifiers only speed up tuning (an alternative
/// frequency, an RDS PI code) and may be replaced wholesale between updates.
/// Their order is kept for display but does not matter for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramSelector {
    /// Identifier that defines the station's identity.
    pub primary: Identifier,
    /// Supplementary identifiers.
    #[serde(default)]
    pub secondary: Vec<Identifier>,
}

impl ProgramSelector {
    /// Create a selector without secondary identifiers.
    pub fn new(primary: Identifier) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
        }
    }

    /// Create a selector with secondary identifiers.
    pub fn with_secondary(primary: Identifier, secondary: Vec<Identifier>) -> Self {
        Self { primary, secondary }
    }

    /// Create an AM/FM selector for a frequency in kHz.
    pub fn amfm(frequency_khz: u32) -> Self {
        Self::new(Identifier::amfm_frequency(frequency_khz))
    }

    /// Primary identifier accessor.
    pub fn primary_of(&self) -> &Identifier {
        &self.primary
    }

    /// Returns true if both selectors denote the same station.
    ///
    /// This is the only equivalence used for directory keys, filter
    /// identifier matching and de-duplication.
    pub fn same_station(&self, other: &ProgramSelector) -> bool {
        self.primary == other.primary
    }

    /// Replace the secondary identifiers with the incoming ones.
    ///
    /// The incoming set supersedes the existing one entirely; nothing is
    /// accumulated. Returns `None` if the selectors denote different stations.
    pub fn merge_secondary(&self, incoming: &ProgramSelector) -> Option<ProgramSelector> {
        if !self.same_station(incoming) {
            return None;
        }
        Some(ProgramSelector {
            primary: self.primary,
            secondary: incoming.secondary.clone(),
        })
    }

    /// Technology family of the primary identifier.
    pub fn technology(&self) -> Option<RadioTechnology> {
        technology_of(&self.primary)
    }

    /// Returns true if this selector names a grouping node.
    pub fn is_category(&self) -> bool {
        self.primary.kind.is_category()
    }

    /// All identifiers, primary first, then secondary in insertion order.
    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }

    /// First identifier of the given kind, primary included.
    pub fn first_of(&self, kind: IdentifierType) -> Option<&Identifier> {
        self.identifiers().find(|id| id.kind == kind)
    }

    /// Returns true if any identifier (primary or secondary) equals `id`.
    pub fn contains(&self, id: &Identifier) -> bool {
        self.identifiers().any(|candidate| candidate == id)
    }
}

impl From<Identifier> for ProgramSelector {
    fn from(primary: Identifier) -> Self {
        Self::new(primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_station_ignores_secondary() {
        let a = ProgramSelector::with_secondary(
            Identifier::amfm_frequency(98_100),
            vec![Identifier::rds_pi(0xC101)],
        );
        let b = ProgramSelector::with_secondary(
            Identifier::amfm_frequency(98_100),
            vec![Identifier::rds_pi(0xD202), Identifier::hd_station_name("KUOW")],
        );
        let c = ProgramSelector::amfm(98_300);

        assert!(a.same_station(&b));
        assert!(b.same_station(&a));
        assert!(!a.same_station(&c));
        // Structural equality still sees the difference
        assert_ne!(a, b);
    }

    #[test]
    fn test_merge_secondary_replaces_wholesale() {
        let existing = ProgramSelector::with_secondary(
            Identifier::dab_sid_ext(0xC221, 0xE1, 0),
            vec![Identifier::dab_ensemble(0xCE15), Identifier::dab_frequency(225_648)],
        );
        let incoming = ProgramSelector::with_secondary(
            Identifier::dab_sid_ext(0xC221, 0xE1, 0),
            vec![Identifier::dab_frequency(227_360)],
        );

        let merged = existing.merge_secondary(&incoming).unwrap();
        assert_eq!(merged.primary, existing.primary);
        assert_eq!(merged.secondary, vec![Identifier::dab_frequency(227_360)]);
    }

    #[test]
    fn test_merge_secondary_rejects_other_station() {
        let a = ProgramSelector::amfm(88_500);
        let b = ProgramSelector::amfm(88_700);
        assert!(a.merge_secondary(&b).is_none());
    }

    #[test]
    fn test_identifier_lookup() {
        let sel = ProgramSelector::with_secondary(
            Identifier::amfm_frequency(94_900),
            vec![Identifier::rds_pi(0x1234)],
        );

        assert_eq!(sel.identifiers().count(), 2);
        assert_eq!(sel.first_of(IdentifierType::RdsPi), Some(&Identifier::rds_pi(0x1234)));
        assert!(sel.contains(&Identifier::amfm_frequency(94_900)));
        assert!(!sel.contains(&Identifier::rds_pi(0x4321)));
        assert_eq!(sel.technology(), Some(RadioTechnology::AmFm));
        assert!(!sel.is_category());
    }
}
