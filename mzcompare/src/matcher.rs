//! Peak pairing strategies for spectral similarity
use std::fmt::Display;

use mzpeaks::prelude::*;
use thiserror::Error;
use tracing::trace;

use crate::spectrum::{InvalidSpectrumError, SpectrumSide};

pub type ScoreType = f32;

/// How two peaks were aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum MatchKind {
    /// The two m/z values agree directly
    Fragment,
    /// The two m/z values agree after subtracting each from its spectrum's parent mass
    NeutralLoss,
}

impl Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Fragment => write!(f, "fragment"),
            MatchKind::NeutralLoss => write!(f, "neutral_loss"),
        }
    }
}

/// A pair of peaks, one from each spectrum, and their contribution
/// to the cosine similarity of the two spectra
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakMatch {
    /// The position of the peak in the first spectrum
    pub index1: usize,
    /// The position of the peak in the second spectrum
    pub index2: usize,
    /// The partial cosine score, in `[0, 1]` for normalized spectra
    pub score: ScoreType,
    pub kind: MatchKind,
}

impl PeakMatch {
    pub fn new(index1: usize, index2: usize, score: ScoreType, kind: MatchKind) -> Self {
        Self {
            index1,
            index2,
            score,
            kind,
        }
    }

    /// The peak index on one side of the match
    pub fn index_for(&self, side: SpectrumSide) -> usize {
        match side {
            SpectrumSide::First => self.index1,
            SpectrumSide::Second => self.index2,
        }
    }
}

/// An error that might occur while comparing two spectra
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComparisonError {
    #[error("Invalid spectrum: {0}")]
    InvalidSpectrum(
        #[source]
        #[from]
        InvalidSpectrumError,
    ),
    #[error("Invalid m/z tolerance {0}")]
    InvalidTolerance(f64),
    #[error("The {side} spectrum has {count} peaks, more than the limit of {limit}")]
    TooManyPeaks {
        side: SpectrumSide,
        count: usize,
        limit: usize,
    },
    #[error("Peak matching failed: {0}")]
    MatcherFailure(String),
}

/// A strategy that pairs the peaks of two normalized spectra.
///
/// How competing pairs inside the tolerance window are resolved is up to the
/// implementation.
pub trait PeakMatcher {
    /// Pair the peaks of `peaks1` and `peaks2`.
    ///
    /// # Arguments
    /// - `parent_mass1`: The precursor mass of the first spectrum
    /// - `peaks1`: The normalized peaks of the first spectrum
    /// - `parent_mass2`: The precursor mass of the second spectrum
    /// - `peaks2`: The normalized peaks of the second spectrum
    /// - `tolerance`: The m/z window within which two peaks may be paired
    fn compare<C: CentroidLike>(
        &self,
        parent_mass1: f64,
        peaks1: &[C],
        parent_mass2: f64,
        peaks2: &[C],
        tolerance: f64,
    ) -> Result<Vec<PeakMatch>, ComparisonError>;
}

/// The modified cosine peak pairing used for molecular networking.
///
/// Every pair of peaks whose m/z values are within the tolerance is a
/// [`MatchKind::Fragment`] candidate. When the two parent masses differ by
/// $`\Delta = P_1 - P_2`$, pairs where $`|mz_2 - mz_1 + \Delta|`$ is within the
/// tolerance are also [`MatchKind::NeutralLoss`] candidates. Each candidate is
/// scored by the product of the two intensities, then candidates are accepted
/// from highest to lowest score so long as neither peak has been used yet.
///
/// The output is in acceptance order. Equal scores keep candidate
/// generation order, with fragment candidates before neutral loss
/// candidates for the same pair.
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GreedyCosineMatcher {}

impl GreedyCosineMatcher {
    pub fn candidates<C: CentroidLike>(
        &self,
        parent_mass1: f64,
        peaks1: &[C],
        parent_mass2: f64,
        peaks2: &[C],
        tolerance: f64,
    ) -> Vec<PeakMatch> {
        let dm = parent_mass1 - parent_mass2;
        let shifted = dm != 0.0;
        let mut candidates = Vec::new();
        for (i, p1) in peaks1.iter().enumerate() {
            for (j, p2) in peaks2.iter().enumerate() {
                let diff = p2.mz() - p1.mz();
                let score = p1.intensity() * p2.intensity();
                if diff.abs() <= tolerance {
                    candidates.push(PeakMatch::new(i, j, score, MatchKind::Fragment));
                }
                if shifted && (diff + dm).abs() <= tolerance {
                    candidates.push(PeakMatch::new(i, j, score, MatchKind::NeutralLoss));
                }
            }
        }
        candidates
    }
}

impl PeakMatcher for GreedyCosineMatcher {
    fn compare<C: CentroidLike>(
        &self,
        parent_mass1: f64,
        peaks1: &[C],
        parent_mass2: f64,
        peaks2: &[C],
        tolerance: f64,
    ) -> Result<Vec<PeakMatch>, ComparisonError> {
        let mut candidates =
            self.candidates(parent_mass1, peaks1, parent_mass2, peaks2, tolerance);
        trace!("{} candidate peak pairs", candidates.len());
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut used1 = vec![false; peaks1.len()];
        let mut used2 = vec![false; peaks2.len()];
        let mut accepted = Vec::new();
        for m in candidates {
            if used1[m.index1] || used2[m.index2] {
                continue;
            }
            used1[m.index1] = true;
            used2[m.index2] = true;
            accepted.push(m);
        }
        Ok(accepted)
    }
}

/// The cosine similarity implied by a set of matches, the sum of their
/// partial scores.
///
/// Returns `0.0` when fewer than `min_matched_peaks` peaks were paired.
pub fn cosine_score(matches: &[PeakMatch], min_matched_peaks: usize) -> ScoreType {
    if matches.len() < min_matched_peaks {
        return 0.0;
    }
    matches.iter().map(|m| m.score).sum()
}

#[cfg(test)]
mod test {
    use mzpeaks::CentroidPeak;

    use super::*;

    fn peaks(data: &[(f64, f32)]) -> Vec<CentroidPeak> {
        data.iter()
            .enumerate()
            .map(|(i, (mz, inten))| CentroidPeak::new(*mz, *inten, i as u32))
            .collect()
    }

    #[test]
    fn test_fragment_only_when_same_parent() -> Result<(), ComparisonError> {
        let a = peaks(&[(100.0, 0.6), (200.0, 0.8)]);
        let b = peaks(&[(100.01, 1.0)]);
        let matches = GreedyCosineMatcher::default().compare(300.0, &a, 300.0, &b, 0.02)?;
        assert_eq!(matches, vec![PeakMatch::new(0, 0, 0.6, MatchKind::Fragment)]);
        Ok(())
    }

    #[test]
    fn test_neutral_loss() -> Result<(), ComparisonError> {
        // 300 - 120 = 180 and 320 - 140 = 180
        let a = peaks(&[(120.0, 1.0)]);
        let b = peaks(&[(140.0, 1.0)]);
        let matches = GreedyCosineMatcher::default().compare(300.0, &a, 320.0, &b, 0.02)?;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, MatchKind::NeutralLoss);
        assert_eq!(matches[0].index_for(SpectrumSide::Second), 0);
        Ok(())
    }

    #[test]
    fn test_one_to_one() -> Result<(), ComparisonError> {
        let a = peaks(&[(100.0, 0.5), (100.01, 0.9)]);
        let b = peaks(&[(100.005, 1.0)]);
        let matches = GreedyCosineMatcher::default().compare(300.0, &a, 300.0, &b, 0.02)?;
        // the more intense peak wins the only partner
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].index1, 1);
        Ok(())
    }

    #[test]
    fn test_acceptance_order() -> Result<(), ComparisonError> {
        let a = peaks(&[(100.0, 0.2), (150.0, 0.9)]);
        let b = peaks(&[(100.0, 0.5), (150.0, 0.5)]);
        let matches = GreedyCosineMatcher::default().compare(300.0, &a, 300.0, &b, 0.02)?;
        let order: Vec<_> = matches.iter().map(|m| m.index1).collect();
        assert_eq!(order, vec![1, 0]);
        Ok(())
    }

    #[test]
    fn test_tolerance_is_inclusive() -> Result<(), ComparisonError> {
        let matcher = GreedyCosineMatcher::default();
        let a = peaks(&[(100.0, 1.0)]);

        let b = peaks(&[(100.5, 1.0)]);
        let matches = matcher.compare(300.0, &a, 300.0, &b, 0.5)?;
        assert_eq!(matches, vec![PeakMatch::new(0, 0, 1.0, MatchKind::Fragment)]);
        assert!(matcher.compare(300.0, &a, 300.0, &b, 0.25)?.is_empty());

        let b = peaks(&[(99.5, 1.0)]);
        assert_eq!(matcher.compare(300.0, &a, 300.0, &b, 0.5)?.len(), 1);

        // zero tolerance still pairs identical m/z values
        let matches = matcher.compare(300.0, &a, 300.0, &a, 0.0)?;
        assert_eq!(matches, vec![PeakMatch::new(0, 0, 1.0, MatchKind::Fragment)]);
        let b = peaks(&[(100.25, 1.0)]);
        assert!(matcher.compare(300.0, &a, 300.0, &b, 0.0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_neutral_loss_tolerance_is_inclusive() -> Result<(), ComparisonError> {
        let matcher = GreedyCosineMatcher::default();
        let a = peaks(&[(120.0, 1.0)]);

        // 300 - 120 = 180 and 320 - 140.5 = 179.5
        let b = peaks(&[(140.5, 1.0)]);
        let matches = matcher.compare(300.0, &a, 320.0, &b, 0.5)?;
        assert_eq!(matches, vec![PeakMatch::new(0, 0, 1.0, MatchKind::NeutralLoss)]);

        let b = peaks(&[(140.75, 1.0)]);
        assert!(matcher.compare(300.0, &a, 320.0, &b, 0.5)?.is_empty());

        let b = peaks(&[(140.0, 1.0)]);
        let matches = matcher.compare(300.0, &a, 320.0, &b, 0.0)?;
        assert_eq!(matches[0].kind, MatchKind::NeutralLoss);
        Ok(())
    }

    #[test]
    fn test_cosine_score() {
        let matches = vec![
            PeakMatch::new(0, 0, 0.25, MatchKind::Fragment),
            PeakMatch::new(1, 1, 0.5, MatchKind::NeutralLoss),
        ];
        assert!((cosine_score(&matches, 0) - 0.75).abs() < 1e-6);
        assert_eq!(cosine_score(&matches, 3), 0.0);
        assert_eq!(cosine_score(&[], 0), 0.0);
    }
}
