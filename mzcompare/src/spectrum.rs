//! Peak lists and the checks run on them before comparison
use std::fmt::Display;
use std::ops::Index;
use std::slice;

use mzpeaks::{CentroidPeak, IndexType};
use thiserror::Error;

/// The column of the m/z value in a `(mz, intensity)` row
pub const MZ: usize = 0;
/// The column of the intensity value in a `(mz, intensity)` row
pub const INTENSITY: usize = 1;

/// Which of the two compared spectra something refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpectrumSide {
    First,
    Second,
}

impl SpectrumSide {
    pub fn other(&self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl Display for SpectrumSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
        }
    }
}

/// Malformed peak data that cannot be compared
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidSpectrumError {
    #[error("The m/z array has {mz} entries but the intensity array has {intensity}")]
    ShapeMismatch { mz: usize, intensity: usize },
    #[error("Peak {index} has an invalid m/z {value}")]
    InvalidMZ { index: usize, value: f64 },
    #[error("Peak {index} has an invalid intensity {value}")]
    InvalidIntensity { index: usize, value: f32 },
    #[error("Invalid parent mass {0}")]
    InvalidParentMass(f64),
}

/// An ordered list of centroided peaks.
///
/// Peaks are kept in the order they were given and each peak's `index`
/// is its position in the list, so match indices always refer back to the
/// caller's ordering. Nothing here sorts by m/z.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spectrum {
    peaks: Vec<CentroidPeak>,
}

impl Spectrum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a spectrum from parallel m/z and intensity arrays
    pub fn from_arrays(mzs: &[f64], intensities: &[f32]) -> Result<Self, InvalidSpectrumError> {
        if mzs.len() != intensities.len() {
            return Err(InvalidSpectrumError::ShapeMismatch {
                mz: mzs.len(),
                intensity: intensities.len(),
            });
        }
        Ok(mzs.iter().copied().zip(intensities.iter().copied()).collect())
    }

    /// Add a peak to the end of the list
    pub fn push(&mut self, mz: f64, intensity: f32) {
        let index = self.peaks.len() as IndexType;
        self.peaks.push(CentroidPeak::new(mz, intensity, index));
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CentroidPeak> {
        self.peaks.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, CentroidPeak> {
        self.peaks.iter()
    }

    pub fn peaks(&self) -> &[CentroidPeak] {
        &self.peaks
    }

    pub fn mzs(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.mz).collect()
    }

    pub fn intensities(&self) -> Vec<f32> {
        self.peaks.iter().map(|p| p.intensity).collect()
    }

    /// The peak list as `[mz, intensity]` rows, indexed by [`MZ`] and [`INTENSITY`]
    pub fn rows(&self) -> Vec<[f64; 2]> {
        self.peaks
            .iter()
            .map(|p| {
                let mut row = [0.0; 2];
                row[MZ] = p.mz;
                row[INTENSITY] = p.intensity as f64;
                row
            })
            .collect()
    }

    /// The total ion current of the spectrum
    pub fn tic(&self) -> f32 {
        self.peaks.iter().map(|p| p.intensity).sum()
    }

    /// Create a copy of this spectrum with the intensity column replaced.
    ///
    /// Fails with [`InvalidSpectrumError::ShapeMismatch`] if `intensities` is
    /// not the same length as the spectrum.
    pub fn with_intensities(
        &self,
        intensities: Vec<f32>,
    ) -> Result<Self, InvalidSpectrumError> {
        if intensities.len() != self.len() {
            return Err(InvalidSpectrumError::ShapeMismatch {
                mz: self.len(),
                intensity: intensities.len(),
            });
        }
        let peaks = self
            .peaks
            .iter()
            .zip(intensities)
            .map(|(p, i)| CentroidPeak::new(p.mz, i, p.index))
            .collect();
        Ok(Self { peaks })
    }

    /// Check that every m/z and intensity is finite and non-negative
    pub fn validate(&self) -> Result<(), InvalidSpectrumError> {
        for (index, p) in self.peaks.iter().enumerate() {
            if !p.mz.is_finite() || p.mz < 0.0 {
                return Err(InvalidSpectrumError::InvalidMZ {
                    index,
                    value: p.mz,
                });
            }
            if !p.intensity.is_finite() || p.intensity < 0.0 {
                return Err(InvalidSpectrumError::InvalidIntensity {
                    index,
                    value: p.intensity,
                });
            }
        }
        Ok(())
    }
}

/// Check that a parent mass is usable for neutral loss calculations
pub fn validate_parent_mass(parent_mass: f64) -> Result<(), InvalidSpectrumError> {
    if parent_mass.is_finite() && parent_mass >= 0.0 {
        Ok(())
    } else {
        Err(InvalidSpectrumError::InvalidParentMass(parent_mass))
    }
}

impl FromIterator<(f64, f32)> for Spectrum {
    fn from_iter<T: IntoIterator<Item = (f64, f32)>>(iter: T) -> Self {
        let mut this = Self::new();
        for (mz, intensity) in iter {
            this.push(mz, intensity);
        }
        this
    }
}

impl From<Vec<(f64, f32)>> for Spectrum {
    fn from(value: Vec<(f64, f32)>) -> Self {
        value.into_iter().collect()
    }
}

impl Index<usize> for Spectrum {
    type Output = CentroidPeak;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl<'a> IntoIterator for &'a Spectrum {
    type Item = &'a CentroidPeak;

    type IntoIter = slice::Iter<'a, CentroidPeak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_arrays() -> Result<(), InvalidSpectrumError> {
        let spec = Spectrum::from_arrays(&[200.0, 100.0], &[5.0, 10.0])?;
        assert_eq!(spec.len(), 2);
        // order is preserved, not sorted by m/z
        assert_eq!(spec[0].mz, 200.0);
        assert_eq!(spec[1].index, 1);
        assert_eq!(spec.rows()[1][INTENSITY], 10.0);
        assert_eq!(spec.tic(), 15.0);

        let err = Spectrum::from_arrays(&[200.0, 100.0], &[5.0]).unwrap_err();
        assert_eq!(
            err,
            InvalidSpectrumError::ShapeMismatch {
                mz: 2,
                intensity: 1
            }
        );
        Ok(())
    }

    #[test]
    fn test_validate() {
        let spec: Spectrum = vec![(100.0, 1.0), (f64::NAN, 2.0)].into();
        assert!(matches!(
            spec.validate(),
            Err(InvalidSpectrumError::InvalidMZ { index: 1, .. })
        ));

        let spec: Spectrum = vec![(100.0, -1.0)].into();
        assert!(matches!(
            spec.validate(),
            Err(InvalidSpectrumError::InvalidIntensity { index: 0, .. })
        ));

        let spec: Spectrum = vec![(100.0, 0.0), (0.0, 3.0)].into();
        assert!(spec.validate().is_ok());
        assert!(Spectrum::new().validate().is_ok());

        assert!(validate_parent_mass(300.0).is_ok());
        assert!(validate_parent_mass(-1.0).is_err());
        assert!(validate_parent_mass(f64::INFINITY).is_err());
    }

    #[test]
    fn test_with_intensities() {
        let spec: Spectrum = vec![(100.0, 4.0), (150.0, 9.0)].into();
        let scaled = spec.with_intensities(vec![2.0, 3.0]).unwrap();
        assert_eq!(scaled.intensities(), vec![2.0, 3.0]);
        assert_eq!(scaled.mzs(), spec.mzs());
        assert_eq!(
            spec.with_intensities(vec![1.0]).unwrap_err(),
            InvalidSpectrumError::ShapeMismatch {
                mz: 2,
                intensity: 1
            }
        );
        assert_eq!(SpectrumSide::First.other(), SpectrumSide::Second);
    }
}
