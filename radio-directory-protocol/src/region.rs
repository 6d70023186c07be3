//! AM/FM region capability tables and tuning request validation.
//!
//! The tables are read-only input. They describe which frequency ranges a
//! receiver accepts in its region and on which channel grid.
//!
//! # Stock tables
//!
//! ```text
//! ITU region 1 (Europe, Africa)   FM 87500-108000 kHz / 100 kHz
//!                                 MW   522-1620   kHz /   9 kHz
//!                                 LW   153-279    kHz /   9 kHz
//! ITU region 2 (Americas)         FM 87700-107900 kHz / 200 kHz
//!                                 MW   530-1700   kHz /  10 kHz
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TuneRequestError;
use crate::identifier::RadioTechnology;
use crate::selector::ProgramSelector;

/// One contiguous AM or FM band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmFmBandRange {
    /// Lowest channel frequency (kHz, inclusive).
    pub lower_khz: u32,
    /// Highest channel frequency (kHz, inclusive).
    pub upper_khz: u32,
    /// Channel grid spacing (kHz).
    pub spacing_khz: u32,
}

impl AmFmBandRange {
    /// Create a band range.
    pub const fn new(lower_khz: u32, upper_khz: u32, spacing_khz: u32) -> Self {
        Self {
            lower_khz,
            upper_khz,
            spacing_khz,
        }
    }

    /// Returns true if the frequency lies inside the band.
    pub fn contains(&self, frequency_khz: u32) -> bool {
        (self.lower_khz..=self.upper_khz).contains(&frequency_khz)
    }

    /// Returns true if the frequency lies on the band's channel grid.
    pub fn is_on_grid(&self, frequency_khz: u32) -> bool {
        match frequency_khz.checked_sub(self.lower_khz) {
            Some(offset) => self.spacing_khz == 0 || offset % self.spacing_khz == 0,
            None => false,
        }
    }

    /// Returns true for FM ranges (above the MW band).
    pub fn is_fm(&self) -> bool {
        self.lower_khz >= 30_000
    }
}

/// Region presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionPreset {
    /// ITU region 1.
    #[default]
    Itu1,
    /// ITU region 2.
    Itu2,
}

/// AM/FM capability table for a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmFmRegionConfig {
    pub ranges: Vec<AmFmBandRange>,
}

impl AmFmRegionConfig {
    /// Stock table for a preset.
    pub fn preset(preset: RegionPreset) -> Self {
        match preset {
            RegionPreset::Itu1 => Self {
                ranges: vec![
                    AmFmBandRange::new(87_500, 108_000, 100),
                    AmFmBandRange::new(522, 1_620, 9),
                    AmFmBandRange::new(153, 279, 9),
                ],
            },
            RegionPreset::Itu2 => Self {
                ranges: vec![
                    AmFmBandRange::new(87_700, 107_900, 200),
                    AmFmBandRange::new(530, 1_700, 10),
                ],
            },
        }
    }

    /// Band containing the frequency, if any.
    pub fn band_of(&self, frequency_khz: u32) -> Option<&AmFmBandRange> {
        self.ranges.iter().find(|range| range.contains(frequency_khz))
    }

    fn check_frequency(&self, frequency_khz: u32) -> Result<(), TuneRequestError> {
        let band = self
            .band_of(frequency_khz)
            .ok_or(TuneRequestError::OutOfBand(frequency_khz))?;
        if !band.is_on_grid(frequency_khz) {
            return Err(TuneRequestError::OffGrid {
                frequency_khz,
                spacing_khz: band.spacing_khz,
            });
        }
        Ok(())
    }
}

impl Default for AmFmRegionConfig {
    fn default() -> Self {
        Self::preset(RegionPreset::default())
    }
}

/// Validate a tuning request against the region tables.
///
/// - AM/FM primaries must be inside a band and on its grid.
/// - HD Radio primaries carry a frequency that is checked the same way.
/// - Other technologies pass when the primary kind is legal.
/// - Vendor primaries always pass; they are opaque.
///
/// # Example
/// ```
/// use radio_directory_protocol::ProgramSelector;
/// use radio_directory_protocol::region::{validate_tune_request, AmFmRegionConfig, RegionPreset};
///
/// let europe = AmFmRegionConfig::preset(RegionPreset::Itu1);
/// assert!(validate_tune_request(&ProgramSelector::amfm(98_100), &europe).is_ok());
///
/// let americas = AmFmRegionConfig::preset(RegionPreset::Itu2);
/// assert!(validate_tune_request(&ProgramSelector::amfm(98_000), &americas).is_err());
/// ```
pub fn validate_tune_request(
    selector: &ProgramSelector,
    config: &AmFmRegionConfig,
) -> Result<(), TuneRequestError> {
    let primary = &selector.primary;
    match primary.kind.primary_technology() {
        Some(RadioTechnology::Vendor) => Ok(()),
        Some(RadioTechnology::AmFm) | Some(RadioTechnology::HdRadio) => {
            let frequency = primary
                .frequency_khz()
                .ok_or(TuneRequestError::UnsupportedPrimary(*primary))?;
            config.check_frequency(frequency)
        }
        Some(_) => Ok(()),
        None => Err(TuneRequestError::UnsupportedPrimary(*primary)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{Identifier, IdentifierType};

    #[test]
    fn test_itu1_fm_grid() {
        let config = AmFmRegionConfig::preset(RegionPreset::Itu1);
        assert!(validate_tune_request(&ProgramSelector::amfm(87_500), &config).is_ok());
        assert!(validate_tune_request(&ProgramSelector::amfm(108_000), &config).is_ok());
        assert_eq!(
            validate_tune_request(&ProgramSelector::amfm(98_150), &config),
            Err(TuneRequestError::OffGrid {
                frequency_khz: 98_150,
                spacing_khz: 100
            })
        );
        assert_eq!(
            validate_tune_request(&ProgramSelector::amfm(108_100), &config),
            Err(TuneRequestError::OutOfBand(108_100))
        );
    }

    #[test]
    fn test_itu2_am_grid() {
        let config = AmFmRegionConfig::preset(RegionPreset::Itu2);
        assert!(validate_tune_request(&ProgramSelector::amfm(1_010), &config).is_ok());
        assert!(validate_tune_request(&ProgramSelector::amfm(1_017), &config).is_err());
        // Long wave does not exist in region 2
        assert_eq!(
            validate_tune_request(&ProgramSelector::amfm(153), &config),
            Err(TuneRequestError::OutOfBand(153))
        );
    }

    #[test]
    fn test_hd_radio_uses_embedded_frequency() {
        let config = AmFmRegionConfig::preset(RegionPreset::Itu2);
        let ok = ProgramSelector::new(Identifier::hd_station_id_ext(0x1234, 1, 97_300));
        let bad = ProgramSelector::new(Identifier::hd_station_id_ext(0x1234, 1, 97_400));
        assert!(validate_tune_request(&ok, &config).is_ok());
        assert!(validate_tune_request(&bad, &config).is_err());
    }

    #[test]
    fn test_other_technologies() {
        let config = AmFmRegionConfig::default();
        let dab = ProgramSelector::new(Identifier::dab_sid_ext(0xC221, 0xE1, 0));
        assert!(validate_tune_request(&dab, &config).is_ok());

        let vendor = ProgramSelector::new(Identifier::new(IdentifierType::Vendor(1500), 99));
        assert!(validate_tune_request(&vendor, &config).is_ok());

        let pi = ProgramSelector::new(Identifier::rds_pi(0x1234));
        assert!(matches!(
            validate_tune_request(&pi, &config),
            Err(TuneRequestError::UnsupportedPrimary(_))
        ));

        let unknown = ProgramSelector::new(Identifier::new(IdentifierType::Unknown(4000), 1));
        assert!(validate_tune_request(&unknown, &config).is_err());
    }
}
