//! Intensity normalization and peak filtering applied before comparison
use tracing::trace;

use crate::spectrum::{InvalidSpectrumError, Spectrum};

/// Take the square root of each intensity and then scale the vector to unit
/// length under the L2 norm.
///
/// ```math
/// \hat{i}_k = \frac{\sqrt{i_k}}{\sqrt{\sum_j i_j}}
/// ```
///
/// The square root dampens the contribution of the few dominant peaks
/// typical of tandem spectra. A vector with no signal is returned as-is
/// rather than divided by zero.
pub fn square_root_and_normalize(intensities: &[f32]) -> Vec<f32> {
    let mut out: Vec<f32> = intensities.iter().map(|i| i.sqrt()).collect();
    let norm = out.iter().map(|i| i * i).sum::<f32>().sqrt();
    if norm > 0.0 {
        out.iter_mut().for_each(|i| *i /= norm);
    }
    out
}

/// A strategy for preparing an intensity vector for similarity scoring
pub trait Normalizer {
    /// Produce a new intensity vector of the same length as `intensities`.
    fn normalize(&self, intensities: &[f32]) -> Vec<f32>;

    /// Apply [`Normalizer::normalize`] to the intensity column of `spectrum`.
    ///
    /// A result whose length differs from the input is an error.
    fn normalize_spectrum(&self, spectrum: &Spectrum) -> Result<Spectrum, InvalidSpectrumError> {
        let normalized = self.normalize(&spectrum.intensities());
        spectrum.with_intensities(normalized)
    }
}

/// The default [`Normalizer`], see [`square_root_and_normalize`]
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SquareRootNormalizer {}

impl Normalizer for SquareRootNormalizer {
    #[inline]
    fn normalize(&self, intensities: &[f32]) -> Vec<f32> {
        square_root_and_normalize(intensities)
    }
}

/// Peak list cleanup performed before a spectrum enters a comparison.
///
/// Every step removes peaks; surviving peaks keep their relative order but
/// are re-indexed, so match indices refer to the filtered spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakFilter {
    /// Peaks below this m/z are dropped
    pub min_mz: f64,
    /// Peaks within this distance of the parent mass are dropped
    pub parent_filter_tolerance: f64,
    /// Peaks below this percentage of the base peak intensity are dropped
    pub min_intensity: f32,
    /// The half-width of the window used for rank filtering
    pub matched_peaks_window: f64,
    /// A peak must be among this many most intense peaks within
    /// [`PeakFilter::matched_peaks_window`] of itself to be kept. `0` disables the
    /// rank filter.
    pub min_matched_peaks_search: usize,
    /// Keep at most this many of the most intense peaks
    pub max_peaks: Option<usize>,
}

impl Default for PeakFilter {
    fn default() -> Self {
        Self {
            min_mz: 50.0,
            parent_filter_tolerance: 17.0,
            min_intensity: 0.0,
            matched_peaks_window: 50.0,
            min_matched_peaks_search: 6,
            max_peaks: None,
        }
    }
}

impl PeakFilter {
    pub fn new(
        min_mz: f64,
        parent_filter_tolerance: f64,
        min_intensity: f32,
        matched_peaks_window: f64,
        min_matched_peaks_search: usize,
        max_peaks: Option<usize>,
    ) -> Self {
        Self {
            min_mz,
            parent_filter_tolerance,
            min_intensity,
            matched_peaks_window,
            min_matched_peaks_search,
            max_peaks,
        }
    }

    /// Apply all filtering steps to `spectrum` whose precursor has mass `parent_mass`
    pub fn filter(&self, spectrum: &Spectrum, parent_mass: f64) -> Spectrum {
        let base_peak = spectrum
            .iter()
            .map(|p| p.intensity)
            .fold(0.0f32, f32::max);
        let intensity_threshold = base_peak * self.min_intensity / 100.0;

        let mut kept: Vec<(f64, f32)> = spectrum
            .iter()
            .filter(|p| p.mz >= self.min_mz)
            .filter(|p| (p.mz - parent_mass).abs() > self.parent_filter_tolerance)
            .filter(|p| p.intensity >= intensity_threshold)
            .map(|p| (p.mz, p.intensity))
            .collect();

        if self.min_matched_peaks_search > 0 {
            kept = self.rank_filter(&kept);
        }

        if let Some(max_peaks) = self.max_peaks {
            kept = top_n_in_order(&kept, max_peaks);
        }

        trace!(
            "Filtered spectrum from {} to {} peaks",
            spectrum.len(),
            kept.len()
        );
        kept.into_iter().collect()
    }

    fn rank_filter(&self, peaks: &[(f64, f32)]) -> Vec<(f64, f32)> {
        peaks
            .iter()
            .filter(|(mz, intensity)| {
                let more_intense = peaks
                    .iter()
                    .filter(|(other_mz, other_intensity)| {
                        (other_mz - mz).abs() <= self.matched_peaks_window
                            && other_intensity > intensity
                    })
                    .count();
                more_intense < self.min_matched_peaks_search
            })
            .copied()
            .collect()
    }
}

/// Keep the `n` most intense peaks without disturbing their order
/// Keep only the `max_peaks` most intense peaks of `spectrum`, in their
/// original order. The result is re-indexed.
pub fn keep_most_intense(spectrum: &Spectrum, max_peaks: usize) -> Spectrum {
    let peaks: Vec<(f64, f32)> = spectrum.iter().map(|p| (p.mz, p.intensity)).collect();
    top_n_in_order(&peaks, max_peaks).into_iter().collect()
}

fn top_n_in_order(peaks: &[(f64, f32)], n: usize) -> Vec<(f64, f32)> {
    if peaks.len() <= n {
        return peaks.to_vec();
    }
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|a, b| peaks[*b].1.total_cmp(&peaks[*a].1));
    let mut selected = order[..n].to_vec();
    selected.sort_unstable();
    selected.into_iter().map(|i| peaks[i]).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_square_root_and_normalize() {
        let normed = square_root_and_normalize(&[9.0, 16.0]);
        // sqrt -> [3, 4], norm 5
        assert!((normed[0] - 0.6).abs() < 1e-6);
        assert!((normed[1] - 0.8).abs() < 1e-6);
        let total: f32 = normed.iter().map(|i| i * i).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_no_signal() {
        assert_eq!(square_root_and_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert!(square_root_and_normalize(&[]).is_empty());
    }

    #[test]
    fn test_normalize_spectrum() {
        let spec: Spectrum = vec![(100.0, 50.0), (200.0, 100.0)].into();
        let normed = SquareRootNormalizer::default().normalize_spectrum(&spec).unwrap();
        assert_eq!(normed.mzs(), spec.mzs());
        assert!((normed.tic() - (50f32.sqrt() + 100f32.sqrt()) / 150f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_filter_low_mz_and_parent() {
        let spec: Spectrum =
            vec![(40.0, 10.0), (120.0, 10.0), (290.0, 10.0), (305.0, 10.0)].into();
        let filter = PeakFilter {
            min_matched_peaks_search: 0,
            ..Default::default()
        };
        let filtered = filter.filter(&spec, 300.0);
        assert_eq!(filtered.mzs(), vec![120.0]);
        assert_eq!(filtered[0].index, 0);
    }

    #[test]
    fn test_filter_min_intensity() {
        let spec: Spectrum = vec![(100.0, 100.0), (150.0, 4.0), (200.0, 50.0)].into();
        let filter = PeakFilter::new(0.0, 0.0, 5.0, 50.0, 0, None);
        let filtered = filter.filter(&spec, 1000.0);
        assert_eq!(filtered.mzs(), vec![100.0, 200.0]);
    }

    #[test]
    fn test_rank_filter() {
        let spec: Spectrum = vec![
            (100.0, 10.0),
            (101.0, 30.0),
            (102.0, 20.0),
            (300.0, 1.0),
        ]
        .into();
        let filter = PeakFilter::new(0.0, 0.0, 0.0, 50.0, 2, None);
        let filtered = filter.filter(&spec, 1000.0);
        // 100.0 has two more intense neighbors inside the window, 300.0 is alone
        assert_eq!(filtered.mzs(), vec![101.0, 102.0, 300.0]);
    }

    #[test]
    fn test_max_peaks() {
        let spec: Spectrum = vec![(100.0, 10.0), (200.0, 30.0), (300.0, 20.0)].into();
        let filter = PeakFilter::new(0.0, 0.0, 0.0, 50.0, 0, Some(2));
        let filtered = filter.filter(&spec, 1000.0);
        assert_eq!(filtered.mzs(), vec![200.0, 300.0]);
        assert_eq!(filtered[1].index, 1);

        assert_eq!(keep_most_intense(&spec, 1).mzs(), vec![200.0]);
        assert_eq!(keep_most_intense(&spec, 5).len(), 3);
    }
}
