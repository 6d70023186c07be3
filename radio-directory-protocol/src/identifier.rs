//! Identifier model for broadcast radio stations.
//!
//! An [`Identifier`] is one fact about a station: a frequency, a packed
//! station code, an ASCII-packed name or an opaque vendor value. The
//! [`IdentifierType`] decides how the 64-bit value is interpreted.
//!
//! # Value layouts
//!
//! ```text
//! HD_STATION_ID_EXT (from LSB):
//! +----------------+-----------+--------------------+
//! | station id     | subchannel| frequency (kHz)    |
//! | 32 bits        | 4 bits    | 18 bits            |
//! +----------------+-----------+--------------------+
//!
//! DAB_SID_EXT (from LSB):
//! +----------------+-----------+--------+
//! | SId            | ECC       | SCIdS  |
//! | 16 bits        | 8 bits    | 4 bits |
//! +----------------+-----------+--------+
//! ```
//!
//! Kinds in the vendor band ([`VENDOR_START`]..=[`VENDOR_END`]) are opaque:
//! they are compared for equality and never decoded. Tags outside the known
//! range survive as [`IdentifierType::Unknown`] so consumers can ignore them
//! instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// First tag of the reserved vendor band.
pub const VENDOR_START: u32 = 1000;

/// Last tag of the reserved vendor band.
pub const VENDOR_END: u32 = 1999;

/// Mask of the 18-bit frequency field in packed identifiers.
const FREQUENCY_MASK: u64 = 0x3_FFFF;

/// Kind of an identifier.
///
/// Numbering follows the broadcast radio HAL so that streams recorded from a
/// real provider can be replayed without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum IdentifierType {
    /// Never legal as a station identifier.
    Invalid,
    /// AM/FM frequency in kHz.
    AmFmFrequency,
    /// 16-bit RDS program identification.
    RdsPi,
    /// Packed HD Radio station id, subchannel and frequency.
    HdStationIdExt,
    /// HD Radio station name, up to 8 ASCII characters packed LSB first.
    HdStationName,
    /// Packed DAB service id, ECC and SCIdS.
    DabSidExt,
    /// 16-bit DAB ensemble id. Groups services; not tunable by itself.
    DabEnsemble,
    /// 12-bit DAB service component id.
    DabScid,
    /// DAB frequency in kHz.
    DabFrequency,
    /// 24-bit DRM service id.
    DrmServiceId,
    /// DRM frequency in kHz.
    DrmFrequency,
    /// DRM modulation mode.
    DrmModulation,
    /// 32-bit SiriusXM service id.
    SxmServiceId,
    /// SiriusXM channel number (0-999).
    SxmChannel,
    /// Opaque vendor kind inside the reserved band.
    Vendor(u32),
    /// Tag not known to this build. Ignored, never rejected.
    Unknown(u32),
}

impl From<u32> for IdentifierType {
    fn from(value: u32) -> Self {
        match value {
            0 => IdentifierType::Invalid,
            1 => IdentifierType::AmFmFrequency,
            2 => IdentifierType::RdsPi,
            3 => IdentifierType::HdStationIdExt,
            4 => IdentifierType::HdStationName,
            5 => IdentifierType::DabSidExt,
            6 => IdentifierType::DabEnsemble,
            7 => IdentifierType::DabScid,
            8 => IdentifierType::DabFrequency,
            9 => IdentifierType::DrmServiceId,
            10 => IdentifierType::DrmFrequency,
            11 => IdentifierType::DrmModulation,
            12 => IdentifierType::SxmServiceId,
            13 => IdentifierType::SxmChannel,
            VENDOR_START..=VENDOR_END => IdentifierType::Vendor(value),
            _ => IdentifierType::Unknown(value),
        }
    }
}

impl From<IdentifierType> for u32 {
    fn from(value: IdentifierType) -> Self {
        match value {
            IdentifierType::Invalid => 0,
            IdentifierType::AmFmFrequency => 1,
            IdentifierType::RdsPi => 2,
            IdentifierType::HdStationIdExt => 3,
            IdentifierType::HdStationName => 4,
            IdentifierType::DabSidExt => 5,
            IdentifierType::DabEnsemble => 6,
            IdentifierType::DabScid => 7,
            IdentifierType::DabFrequency => 8,
            IdentifierType::DrmServiceId => 9,
            IdentifierType::DrmFrequency => 10,
            IdentifierType::DrmModulation => 11,
            IdentifierType::SxmServiceId => 12,
            IdentifierType::SxmChannel => 13,
            IdentifierType::Vendor(tag) | IdentifierType::Unknown(tag) => tag,
        }
    }
}

impl IdentifierType {
    /// Returns true if this kind lies in the reserved vendor band.
    pub fn is_vendor_scoped(self) -> bool {
        is_vendor_scoped(self)
    }

    /// Returns true if this build knows how to interpret the kind.
    ///
    /// Vendor kinds count as known: they are understood to be opaque.
    pub fn is_known(self) -> bool {
        !matches!(self, IdentifierType::Unknown(_))
    }

    /// Technology family for which this kind is the legal primary kind.
    pub fn primary_technology(self) -> Option<RadioTechnology> {
        match self {
            IdentifierType::AmFmFrequency => Some(RadioTechnology::AmFm),
            IdentifierType::HdStationIdExt => Some(RadioTechnology::HdRadio),
            IdentifierType::DabSidExt => Some(RadioTechnology::Dab),
            IdentifierType::DrmServiceId => Some(RadioTechnology::Drm),
            IdentifierType::SxmServiceId => Some(RadioTechnology::Sxm),
            IdentifierType::Vendor(_) => Some(RadioTechnology::Vendor),
            _ => None,
        }
    }

    /// Returns true for kinds that name a grouping node rather than a
    /// playable station (a DAB ensemble).
    pub fn is_category(self) -> bool {
        matches!(self, IdentifierType::DabEnsemble)
    }

    /// Raw numeric tag.
    pub fn tag(self) -> u32 {
        self.into()
    }
}

/// Radio technology family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadioTechnology {
    /// Analog AM/FM (with or without RDS).
    AmFm,
    /// HD Radio.
    HdRadio,
    /// Digital Audio Broadcasting.
    Dab,
    /// Digital Radio Mondiale.
    Drm,
    /// SiriusXM satellite radio.
    Sxm,
    /// Vendor-defined technology keyed by a vendor-band identifier.
    Vendor,
}

impl RadioTechnology {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            RadioTechnology::AmFm => "AM/FM",
            RadioTechnology::HdRadio => "HD Radio",
            RadioTechnology::Dab => "DAB",
            RadioTechnology::Drm => "DRM",
            RadioTechnology::Sxm => "SiriusXM",
            RadioTechnology::Vendor => "Vendor",
        }
    }
}

/// Returns true iff `kind` falls in the reserved vendor band.
///
/// # Example
/// ```
/// use radio_directory_protocol::identifier::{is_vendor_scoped, IdentifierType};
///
/// assert!(is_vendor_scoped(IdentifierType::from(1000)));
/// assert!(is_vendor_scoped(IdentifierType::from(1999)));
/// assert!(!is_vendor_scoped(IdentifierType::from(2000)));
/// assert!(!is_vendor_scoped(IdentifierType::AmFmFrequency));
/// ```
pub fn is_vendor_scoped(kind: IdentifierType) -> bool {
    matches!(kind, IdentifierType::Vendor(_))
}

/// Returns true iff `kind` is an allowed primary kind for `technology`.
///
/// Unknown kinds are never legal primaries, whatever the technology.
///
/// # Example
/// ```
/// use radio_directory_protocol::identifier::{is_primary_candidate, IdentifierType, RadioTechnology};
///
/// assert!(is_primary_candidate(IdentifierType::AmFmFrequency, RadioTechnology::AmFm));
/// assert!(!is_primary_candidate(IdentifierType::RdsPi, RadioTechnology::AmFm));
/// assert!(!is_primary_candidate(IdentifierType::from(4242), RadioTechnology::Vendor));
/// ```
pub fn is_primary_candidate(kind: IdentifierType, technology: RadioTechnology) -> bool {
    kind.primary_technology() == Some(technology)
}

/// Technology a primary identifier belongs to, if its kind is a legal primary.
pub fn technology_of(primary: &Identifier) -> Option<RadioTechnology> {
    primary.kind.primary_technology()
}

/// One typed fact about a station.
///
/// Equality is exact on both kind and value; there is no tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    /// How `value` is interpreted.
    #[serde(rename = "type")]
    pub kind: IdentifierType,
    /// Raw value.
    pub value: u64,
}

impl Identifier {
    /// Create an identifier from a kind and raw value.
    pub fn new(kind: IdentifierType, value: u64) -> Self {
        Self { kind, value }
    }

    /// AM/FM frequency in kHz.
    pub fn amfm_frequency(khz: u32) -> Self {
        Self::new(IdentifierType::AmFmFrequency, khz as u64)
    }

    /// RDS program identification code.
    pub fn rds_pi(pi: u16) -> Self {
        Self::new(IdentifierType::RdsPi, pi as u64)
    }

    /// Packed HD Radio station identifier.
    pub fn hd_station_id_ext(station_id: u32, subchannel: u8, frequency_khz: u32) -> Self {
        let value = (station_id as u64)
            | (((subchannel & 0x0F) as u64) << 32)
            | (((frequency_khz as u64) & FREQUENCY_MASK) << 36);
        Self::new(IdentifierType::HdStationIdExt, value)
    }

    /// HD Radio station name, packed LSB first.
    ///
    /// Only the first 8 characters are kept; non-ASCII characters become `?`.
    /// Names are stored upper-cased, the way receivers display them.
    pub fn hd_station_name(name: &str) -> Self {
        let value = name
            .chars()
            .take(8)
            .enumerate()
            .fold(0u64, |acc, (i, c)| {
                let byte = if c.is_ascii() { c.to_ascii_uppercase() as u8 } else { b'?' };
                acc | ((byte as u64) << (8 * i))
            });
        Self::new(IdentifierType::HdStationName, value)
    }

    /// Packed DAB service identifier.
    pub fn dab_sid_ext(sid: u16, ecc: u8, scids: u8) -> Self {
        let value = (sid as u64) | ((ecc as u64) << 16) | (((scids & 0x0F) as u64) << 24);
        Self::new(IdentifierType::DabSidExt, value)
    }

    /// DAB ensemble identifier.
    pub fn dab_ensemble(ensemble: u16) -> Self {
        Self::new(IdentifierType::DabEnsemble, ensemble as u64)
    }

    /// DAB frequency in kHz.
    pub fn dab_frequency(khz: u32) -> Self {
        Self::new(IdentifierType::DabFrequency, khz as u64)
    }

    /// DRM service identifier.
    pub fn drm_service_id(id: u32) -> Self {
        Self::new(IdentifierType::DrmServiceId, (id & 0x00FF_FFFF) as u64)
    }

    /// SiriusXM service identifier.
    pub fn sxm_service_id(id: u32) -> Self {
        Self::new(IdentifierType::SxmServiceId, id as u64)
    }

    /// Opaque vendor identifier. `tag` must lie in the vendor band.
    pub fn vendor(tag: u32, value: u64) -> Option<Self> {
        match IdentifierType::from(tag) {
            kind @ IdentifierType::Vendor(_) => Some(Self::new(kind, value)),
            _ => None,
        }
    }

    /// Returns true if the kind lies in the vendor band.
    pub fn is_vendor_scoped(&self) -> bool {
        self.kind.is_vendor_scoped()
    }

    /// Frequency carried by this identifier, if any (kHz).
    pub fn frequency_khz(&self) -> Option<u32> {
        match self.kind {
            IdentifierType::AmFmFrequency
            | IdentifierType::DabFrequency
            | IdentifierType::DrmFrequency => u32::try_from(self.value).ok(),
            IdentifierType::HdStationIdExt => Some(self.hd_station().frequency_khz),
            _ => None,
        }
    }

    /// Decoded HD Radio station fields.
    ///
    /// The value is decoded whatever the kind; callers check the kind first.
    pub fn hd_station(&self) -> HdStationIdExt {
        HdStationIdExt {
            station_id: (self.value & 0xFFFF_FFFF) as u32,
            subchannel: ((self.value >> 32) & 0x0F) as u8,
            frequency_khz: ((self.value >> 36) & FREQUENCY_MASK) as u32,
        }
    }

    /// Decoded DAB service fields.
    pub fn dab_service(&self) -> DabSidExt {
        DabSidExt {
            sid: (self.value & 0xFFFF) as u16,
            ecc: ((self.value >> 16) & 0xFF) as u8,
            scids: ((self.value >> 24) & 0x0F) as u8,
        }
    }

    /// Unpacked HD Radio station name.
    pub fn station_name(&self) -> Option<String> {
        if self.kind != IdentifierType::HdStationName {
            return None;
        }
        let name: String = self
            .value
            .to_le_bytes()
            .iter()
            .take_while(|b| **b != 0)
            .map(|b| *b as char)
            .collect();
        Some(name)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IdentifierType::AmFmFrequency => write!(f, "AMFM_FREQUENCY:{}kHz", self.value),
            IdentifierType::Vendor(tag) => write!(f, "VENDOR[{}]:0x{:X}", tag, self.value),
            IdentifierType::Unknown(tag) => write!(f, "UNKNOWN[{}]:0x{:X}", tag, self.value),
            kind => write!(f, "{:?}:0x{:X}", kind, self.value),
        }
    }
}

/// Fields of an HD Radio extended station identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdStationIdExt {
    pub station_id: u32,
    pub subchannel: u8,
    pub frequency_khz: u32,
}

/// Fields of a DAB extended service identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DabSidExt {
    pub sid: u16,
    pub ecc: u8,
    pub scids: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_type_tags() {
        let kinds = [
            IdentifierType::Invalid,
            IdentifierType::AmFmFrequency,
            IdentifierType::HdStationIdExt,
            IdentifierType::DabEnsemble,
            IdentifierType::SxmChannel,
        ];

        for kind in kinds {
            let tag: u32 = kind.into();
            assert_eq!(IdentifierType::from(tag), kind);
        }

        assert_eq!(IdentifierType::from(1500), IdentifierType::Vendor(1500));
        assert_eq!(IdentifierType::from(14), IdentifierType::Unknown(14));
        assert_eq!(IdentifierType::Unknown(14).tag(), 14);
    }

    #[test]
    fn test_vendor_band_edges() {
        assert!(!IdentifierType::from(VENDOR_START - 1).is_vendor_scoped());
        assert!(IdentifierType::from(VENDOR_START).is_vendor_scoped());
        assert!(IdentifierType::from(VENDOR_END).is_vendor_scoped());
        assert!(!IdentifierType::from(VENDOR_END + 1).is_vendor_scoped());
        assert!(Identifier::vendor(1234, 7).is_some());
        assert!(Identifier::vendor(42, 7).is_none());
    }

    #[test]
    fn test_primary_candidates() {
        assert!(is_primary_candidate(IdentifierType::AmFmFrequency, RadioTechnology::AmFm));
        assert!(is_primary_candidate(IdentifierType::HdStationIdExt, RadioTechnology::HdRadio));
        assert!(is_primary_candidate(IdentifierType::DabSidExt, RadioTechnology::Dab));
        assert!(is_primary_candidate(IdentifierType::Vendor(1001), RadioTechnology::Vendor));

        assert!(!is_primary_candidate(IdentifierType::AmFmFrequency, RadioTechnology::Dab));
        assert!(!is_primary_candidate(IdentifierType::DabEnsemble, RadioTechnology::Dab));
        assert!(!is_primary_candidate(IdentifierType::Unknown(77), RadioTechnology::AmFm));
        assert!(!is_primary_candidate(IdentifierType::Invalid, RadioTechnology::AmFm));

        assert_eq!(
            technology_of(&Identifier::drm_service_id(0x1234)),
            Some(RadioTechnology::Drm)
        );
        assert_eq!(technology_of(&Identifier::rds_pi(0x1234)), None);
    }

    #[test]
    fn test_equality_is_exact() {
        assert_eq!(Identifier::amfm_frequency(97_900), Identifier::amfm_frequency(97_900));
        assert_ne!(Identifier::amfm_frequency(97_900), Identifier::amfm_frequency(97_901));
        // Same value, different kind
        assert_ne!(
            Identifier::new(IdentifierType::AmFmFrequency, 8_000),
            Identifier::new(IdentifierType::DabFrequency, 8_000)
        );
    }

    #[test]
    fn test_hd_station_packing() {
        let id = Identifier::hd_station_id_ext(0xA5A5_1234, 3, 101_100);
        let hd = id.hd_station();
        assert_eq!(hd.station_id, 0xA5A5_1234);
        assert_eq!(hd.subchannel, 3);
        assert_eq!(hd.frequency_khz, 101_100);
        assert_eq!(id.frequency_khz(), Some(101_100));
    }

    #[test]
    fn test_dab_sid_packing() {
        let id = Identifier::dab_sid_ext(0xC221, 0xE1, 2);
        let dab = id.dab_service();
        assert_eq!(dab.sid, 0xC221);
        assert_eq!(dab.ecc, 0xE1);
        assert_eq!(dab.scids, 2);
        assert_eq!(id.frequency_khz(), None);
    }

    #[test]
    fn test_station_name_packing() {
        let id = Identifier::hd_station_name("kexp");
        assert_eq!(id.station_name().as_deref(), Some("KEXP"));

        let long = Identifier::hd_station_name("ABCDEFGHIJ");
        assert_eq!(long.station_name().as_deref(), Some("ABCDEFGH"));

        assert_eq!(Identifier::amfm_frequency(1).station_name(), None);
    }

    #[test]
    fn test_unknown_kind_serde() {
        let id: Identifier = serde_json::from_str(r#"{"type":4242,"value":9}"#).unwrap();
        assert_eq!(id.kind, IdentifierType::Unknown(4242));
        assert!(!id.kind.is_known());

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"type":4242,"value":9}"#);
    }
}
