//! Program list and announcement message definitions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolViolation;
use crate::identifier::{Identifier, IdentifierType};
use crate::selector::ProgramSelector;

// ============================================================================
// Program Information
// ============================================================================

/// Program state flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramFlags(pub u32);

impl ProgramFlags {
    /// Live broadcast (as opposed to a recorded or time-shifted one).
    pub const LIVE: ProgramFlags = ProgramFlags(1 << 0);
    /// Audio is muted, e.g. a subscription service without entitlement.
    pub const MUTED: ProgramFlags = ProgramFlags(1 << 1);
    /// Station carries traffic information.
    pub const TRAFFIC_PROGRAM: ProgramFlags = ProgramFlags(1 << 2);
    /// Traffic announcement currently on air.
    pub const TRAFFIC_ANNOUNCEMENT: ProgramFlags = ProgramFlags(1 << 3);
    /// Station can be tuned to right now.
    pub const TUNABLE: ProgramFlags = ProgramFlags(1 << 4);
    /// Stereo audio.
    pub const STEREO: ProgramFlags = ProgramFlags(1 << 5);

    /// No flags set.
    pub fn empty() -> Self {
        ProgramFlags(0)
    }

    /// Returns true if every bit of `other` is set.
    pub fn contains(self, other: ProgramFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: ProgramFlags) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: ProgramFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for ProgramFlags {
    type Output = ProgramFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ProgramFlags(self.0 | rhs.0)
    }
}

/// Opaque metadata value, carried for the UI layer and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metadata {
    /// Integer-valued metadata.
    Int { key: u32, value: i64 },
    /// Text-valued metadata.
    Text { key: u32, value: String },
}

/// Vendor key-value pair, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorKeyValue {
    pub key: String,
    pub value: String,
}

/// One entry of the program directory.
///
/// Entries are replaced as a whole on update; fields are never merged one
/// by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInfo {
    /// Station identity and tuning hints.
    pub selector: ProgramSelector,
    /// Program state flags.
    #[serde(default)]
    pub flags: ProgramFlags,
    /// Advisory signal quality (0-100).
    #[serde(default)]
    pub signal_quality: u32,
    /// Opaque metadata.
    #[serde(default)]
    pub metadata: Vec<Metadata>,
    /// Related identifiers (e.g. the ensemble a DAB service belongs to).
    #[serde(default)]
    pub related: Vec<Identifier>,
    /// Vendor passthrough.
    #[serde(default)]
    pub vendor_info: Vec<VendorKeyValue>,
}

impl ProgramInfo {
    /// Create an entry with default flags and no metadata.
    pub fn new(selector: ProgramSelector) -> Self {
        Self {
            selector,
            flags: ProgramFlags::empty(),
            signal_quality: 0,
            metadata: Vec::new(),
            related: Vec::new(),
            vendor_info: Vec::new(),
        }
    }

    /// Directory key of this entry.
    pub fn key(&self) -> &Identifier {
        &self.selector.primary
    }

    /// Primary and secondary identifiers as a set, for filter lookups.
    pub fn identifier_set(&self) -> BTreeSet<Identifier> {
        self.selector.identifiers().copied().collect()
    }

    /// Returns true if this entry is a non-tunable grouping node.
    pub fn is_category(&self) -> bool {
        self.selector.is_category()
    }

    /// Builder-style flag setter.
    pub fn with_flags(mut self, flags: ProgramFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builder-style signal quality setter.
    pub fn with_signal_quality(mut self, quality: u32) -> Self {
        self.signal_quality = quality;
        self
    }

    /// Builder-style metadata setter.
    pub fn with_metadata(mut self, metadata: Vec<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

// ============================================================================
// Program List Synchronization
// ============================================================================

/// One incremental update of the program list.
///
/// Processing order: purge, then removals, then modifications, then the
/// completion flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramListChunk {
    /// Discard the whole directory before applying the rest of the chunk.
    #[serde(default)]
    pub purge: bool,
    /// The current scan generation has enumerated every station.
    #[serde(default)]
    pub complete: bool,
    /// Added or replaced entries.
    #[serde(default)]
    pub modified: Vec<ProgramInfo>,
    /// Primary identifiers of removed entries.
    #[serde(default)]
    pub removed: Vec<Identifier>,
}

impl ProgramListChunk {
    /// Chunk that only adds or replaces entries.
    pub fn modified(modified: Vec<ProgramInfo>) -> Self {
        Self {
            modified,
            ..Default::default()
        }
    }

    /// Chunk that only removes entries.
    pub fn removed(removed: Vec<Identifier>) -> Self {
        Self {
            removed,
            ..Default::default()
        }
    }

    /// Chunk that clears the directory.
    pub fn purge() -> Self {
        Self {
            purge: true,
            ..Default::default()
        }
    }

    /// Builder-style completion flag setter.
    pub fn completing(mut self) -> Self {
        self.complete = true;
        self
    }

    /// Returns true if the chunk carries neither entries nor flags.
    pub fn is_empty(&self) -> bool {
        !self.purge && !self.complete && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Check the chunk against the update contract.
    ///
    /// Entries whose primary kind is unknown pass validation: they are to be
    /// ignored by the consumer, not rejected.
    pub fn validate(&self) -> Result<(), ProtocolViolation> {
        if self.purge && !self.removed.is_empty() {
            return Err(ProtocolViolation::PurgeWithRemovals {
                count: self.removed.len(),
            });
        }

        for info in &self.modified {
            validate_primary(&info.selector.primary)?;
        }

        Ok(())
    }
}

/// Check that an identifier may key a directory entry.
pub fn validate_primary(primary: &Identifier) -> Result<(), ProtocolViolation> {
    match primary.kind {
        IdentifierType::Invalid => Err(ProtocolViolation::InvalidPrimary(*primary)),
        IdentifierType::Unknown(_) => Ok(()),
        kind if kind.primary_technology().is_some() || kind.is_category() => Ok(()),
        kind => Err(ProtocolViolation::NonPrimaryKind(kind)),
    }
}

// ============================================================================
// Announcements
// ============================================================================

/// Announcement category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnnouncementType {
    Emergency,
    Warning,
    Traffic,
    Weather,
    News,
    Event,
    Sport,
    Misc,
}

impl AnnouncementType {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            AnnouncementType::Emergency => "Emergency",
            AnnouncementType::Warning => "Warning",
            AnnouncementType::Traffic => "Traffic",
            AnnouncementType::Weather => "Weather",
            AnnouncementType::News => "News",
            AnnouncementType::Event => "Event",
            AnnouncementType::Sport => "Sport",
            AnnouncementType::Misc => "Misc",
        }
    }
}

/// An announcement currently on air on some station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Station carrying the announcement.
    pub selector: ProgramSelector,
    /// Announcement category.
    #[serde(rename = "type")]
    pub kind: AnnouncementType,
    /// Vendor passthrough.
    #[serde(default)]
    pub vendor_info: Vec<VendorKeyValue>,
}

impl Announcement {
    /// Create an announcement.
    pub fn new(selector: ProgramSelector, kind: AnnouncementType) -> Self {
        Self {
            selector,
            kind,
            vendor_info: Vec::new(),
        }
    }

    /// Key under which the announcement is tracked.
    pub fn key(&self) -> &Identifier {
        &self.selector.primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = ProgramFlags::LIVE | ProgramFlags::STEREO;
        assert!(flags.contains(ProgramFlags::LIVE));
        assert!(!flags.contains(ProgramFlags::MUTED));

        flags.insert(ProgramFlags::TUNABLE);
        flags.remove(ProgramFlags::LIVE);
        assert!(flags.contains(ProgramFlags::TUNABLE | ProgramFlags::STEREO));
        assert!(!flags.contains(ProgramFlags::LIVE));
    }

    #[test]
    fn test_identifier_set_is_primary_union_secondary() {
        let info = ProgramInfo::new(ProgramSelector::with_secondary(
            Identifier::amfm_frequency(101_500),
            vec![Identifier::rds_pi(0xA1B2), Identifier::rds_pi(0xA1B2)],
        ));
        let set = info.identifier_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Identifier::amfm_frequency(101_500)));
        assert!(set.contains(&Identifier::rds_pi(0xA1B2)));
    }

    #[test]
    fn test_validate_purge_with_removals() {
        let mut chunk = ProgramListChunk::purge();
        assert!(chunk.validate().is_ok());

        chunk.removed.push(Identifier::amfm_frequency(100));
        assert_eq!(
            chunk.validate(),
            Err(ProtocolViolation::PurgeWithRemovals { count: 1 })
        );
    }

    #[test]
    fn test_validate_primary_kinds() {
        let ok = [
            Identifier::amfm_frequency(100),
            Identifier::dab_ensemble(0xCE15),
            Identifier::new(IdentifierType::Vendor(1010), 5),
            Identifier::new(IdentifierType::Unknown(4000), 5),
        ];
        for id in ok {
            assert!(validate_primary(&id).is_ok(), "{} should be accepted", id);
        }

        let invalid = Identifier::new(IdentifierType::Invalid, 0);
        assert_eq!(
            validate_primary(&invalid),
            Err(ProtocolViolation::InvalidPrimary(invalid))
        );
        assert_eq!(
            validate_primary(&Identifier::rds_pi(0x1234)),
            Err(ProtocolViolation::NonPrimaryKind(IdentifierType::RdsPi))
        );
    }

    #[test]
    fn test_chunk_json_shape() {
        let json = r#"{
            "complete": true,
            "modified": [
                { "selector": { "primary": { "type": 1, "value": 100 } } }
            ]
        }"#;
        let chunk: ProgramListChunk = serde_json::from_str(json).unwrap();
        assert!(!chunk.purge);
        assert!(chunk.complete);
        assert_eq!(chunk.modified.len(), 1);
        assert_eq!(chunk.modified[0].key(), &Identifier::amfm_frequency(100));
        assert!(chunk.removed.is_empty());
    }
}
