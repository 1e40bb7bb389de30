//! High level APIs for comparing two spectra and annotating their shared peaks
use std::slice;

use itertools::{Either, Itertools};
use tracing::debug;

use crate::matcher::{
    cosine_score, ComparisonError, GreedyCosineMatcher, MatchKind, PeakMatch, PeakMatcher,
    ScoreType,
};
use crate::normalize::{Normalizer, SquareRootNormalizer};
use crate::spectrum::{validate_parent_mass, Spectrum, SpectrumSide};

/// The default m/z tolerance, in Daltons
pub const DEFAULT_TOLERANCE: f64 = 0.02;

/// A tolerance must be finite and non-negative
pub fn validate_tolerance(tolerance: f64) -> Result<(), ComparisonError> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        Err(ComparisonError::InvalidTolerance(tolerance))
    } else {
        Ok(())
    }
}

/// The matches found between two spectra, in the order the matcher
/// produced them.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchSet {
    matches: Vec<PeakMatch>,
}

impl MatchSet {
    pub fn new(matches: Vec<PeakMatch>) -> Self {
        Self { matches }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, PeakMatch> {
        self.matches.iter()
    }

    pub fn matches(&self) -> &[PeakMatch] {
        &self.matches
    }

    /// Iterate over the matches of a single kind, preserving their order
    pub fn of_kind(&self, kind: MatchKind) -> impl Iterator<Item = &PeakMatch> + '_ {
        self.matches.iter().filter(move |m| m.kind == kind)
    }

    pub fn fragments(&self) -> Vec<PeakMatch> {
        self.of_kind(MatchKind::Fragment).copied().collect()
    }

    pub fn neutral_losses(&self) -> Vec<PeakMatch> {
        self.of_kind(MatchKind::NeutralLoss).copied().collect()
    }

    /// Split the matches into fragment matches and neutral loss matches
    pub fn partition(&self) -> (Vec<PeakMatch>, Vec<PeakMatch>) {
        self.matches.iter().partition_map(|m| match m.kind {
            MatchKind::Fragment => Either::Left(*m),
            MatchKind::NeutralLoss => Either::Right(*m),
        })
    }

    /// The cosine similarity of the two spectra, see [`cosine_score`]
    pub fn score(&self, min_matched_peaks: usize) -> ScoreType {
        cosine_score(&self.matches, min_matched_peaks)
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a PeakMatch;

    type IntoIter = slice::Iter<'a, PeakMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

impl From<Vec<PeakMatch>> for MatchSet {
    fn from(value: Vec<PeakMatch>) -> Self {
        Self::new(value)
    }
}

/// Compare two spectra with the default normalization and matching strategies.
///
/// # Arguments
/// - `spectrum1`: The first peak list
/// - `parent_mass1`: The precursor mass of `spectrum1`
/// - `spectrum2`: The second peak list
/// - `parent_mass2`: The precursor mass of `spectrum2`
/// - `tolerance`: The m/z window within which two peaks may be paired
///
/// # See also
/// [`SpectrumComparator::annotate`]
pub fn annotate(
    spectrum1: &Spectrum,
    parent_mass1: f64,
    spectrum2: &Spectrum,
    parent_mass2: f64,
    tolerance: f64,
) -> Result<MatchSet, ComparisonError> {
    let mut comparator = DefaultComparator::default();
    comparator.set_tolerance(tolerance);
    comparator.annotate(spectrum1, parent_mass1, spectrum2, parent_mass2)
}

/// A [`SpectrumComparator`] with the default strategies
pub type DefaultComparator = SpectrumComparator<SquareRootNormalizer, GreedyCosineMatcher>;

/// A comparison engine with a fixed normalization strategy, matching strategy
/// and set of parameters.
///
/// It holds no state between calls, so one instance can serve any number of
/// comparisons, and clones can be shared across threads.
#[derive(Debug, Clone)]
pub struct SpectrumComparator<N: Normalizer, M: PeakMatcher> {
    normalizer: N,
    matcher: M,
    /// The m/z window within which two peaks may be paired
    tolerance: f64,
    /// Refuse to compare spectra with more peaks than this
    max_peaks: Option<usize>,
}

impl Default for DefaultComparator {
    fn default() -> Self {
        Self::new(
            SquareRootNormalizer::default(),
            GreedyCosineMatcher::default(),
            DEFAULT_TOLERANCE,
        )
    }
}

impl<N: Normalizer, M: PeakMatcher> SpectrumComparator<N, M> {
    pub fn new(normalizer: N, matcher: M, tolerance: f64) -> Self {
        Self {
            normalizer,
            matcher,
            tolerance,
            max_peaks: None,
        }
    }

    pub fn with_max_peaks(mut self, max_peaks: Option<usize>) -> Self {
        self.max_peaks = max_peaks;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    pub fn max_peaks(&self) -> Option<usize> {
        self.max_peaks
    }

    pub fn set_max_peaks(&mut self, max_peaks: Option<usize>) {
        self.max_peaks = max_peaks;
    }

    pub fn normalizer(&self) -> &N {
        &self.normalizer
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    fn check_inputs(
        &self,
        spectrum1: &Spectrum,
        parent_mass1: f64,
        spectrum2: &Spectrum,
        parent_mass2: f64,
    ) -> Result<(), ComparisonError> {
        validate_tolerance(self.tolerance)?;
        for (side, spectrum, parent_mass) in [
            (SpectrumSide::First, spectrum1, parent_mass1),
            (SpectrumSide::Second, spectrum2, parent_mass2),
        ] {
            validate_parent_mass(parent_mass)?;
            spectrum.validate()?;
            if let Some(limit) = self.max_peaks {
                if spectrum.len() > limit {
                    return Err(ComparisonError::TooManyPeaks {
                        side,
                        count: spectrum.len(),
                        limit,
                    });
                }
            }
        }
        Ok(())
    }

    /// Normalize both spectra, pair their peaks once and return the pairs.
    ///
    /// Either spectrum being empty, or no pair falling within the tolerance,
    /// produces an empty [`MatchSet`]. Malformed input is rejected before any
    /// computation and errors from the matcher are returned as-is.
    pub fn annotate(
        &self,
        spectrum1: &Spectrum,
        parent_mass1: f64,
        spectrum2: &Spectrum,
        parent_mass2: f64,
    ) -> Result<MatchSet, ComparisonError> {
        self.check_inputs(spectrum1, parent_mass1, spectrum2, parent_mass2)?;
        if spectrum1.is_empty() || spectrum2.is_empty() {
            return Ok(MatchSet::default());
        }

        let normed1 = self.normalizer.normalize_spectrum(spectrum1)?;
        let normed2 = self.normalizer.normalize_spectrum(spectrum2)?;

        let matches = self.matcher.compare(
            parent_mass1,
            normed1.peaks(),
            parent_mass2,
            normed2.peaks(),
            self.tolerance,
        )?;
        debug!(
            "Matched {} peaks between spectra of {} and {} peaks",
            matches.len(),
            spectrum1.len(),
            spectrum2.len()
        );
        Ok(MatchSet::new(matches))
    }

    /// As [`SpectrumComparator::annotate`], but reduce the result to a single
    /// cosine similarity, see [`cosine_score`].
    pub fn score(
        &self,
        spectrum1: &Spectrum,
        parent_mass1: f64,
        spectrum2: &Spectrum,
        parent_mass2: f64,
        min_matched_peaks: usize,
    ) -> Result<ScoreType, ComparisonError> {
        let matches = self.annotate(spectrum1, parent_mass1, spectrum2, parent_mass2)?;
        Ok(matches.score(min_matched_peaks))
    }
}

/// The data loaded for a comparison, any of which may still be missing
#[derive(Debug, Clone, Default)]
pub struct ComparisonInput {
    pub spectrum1: Option<Spectrum>,
    pub parent_mass1: Option<f64>,
    pub spectrum2: Option<Spectrum>,
    pub parent_mass2: Option<f64>,
}

impl ComparisonInput {
    pub fn new(
        spectrum1: Option<Spectrum>,
        parent_mass1: Option<f64>,
        spectrum2: Option<Spectrum>,
        parent_mass2: Option<f64>,
    ) -> Self {
        Self {
            spectrum1,
            parent_mass1,
            spectrum2,
            parent_mass2,
        }
    }

    /// Both spectra and both parent masses, or `None` if any is missing
    pub fn ready(&self) -> Option<(&Spectrum, f64, &Spectrum, f64)> {
        match (
            self.spectrum1.as_ref(),
            self.parent_mass1,
            self.spectrum2.as_ref(),
            self.parent_mass2,
        ) {
            (Some(s1), Some(p1), Some(s2), Some(p2)) => Some((s1, p1, s2, p2)),
            _ => None,
        }
    }

    pub fn spectrum(&self, side: SpectrumSide) -> Option<&Spectrum> {
        match side {
            SpectrumSide::First => self.spectrum1.as_ref(),
            SpectrumSide::Second => self.spectrum2.as_ref(),
        }
    }

    pub fn parent_mass(&self, side: SpectrumSide) -> Option<f64> {
        match side {
            SpectrumSide::First => self.parent_mass1,
            SpectrumSide::Second => self.parent_mass2,
        }
    }
}
