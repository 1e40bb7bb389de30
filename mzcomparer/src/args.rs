use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzcompare::{keep_most_intense, PeakFilter, Spectrum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    /// Tab-separated tables preceded by a short summary
    Text,
    /// A single JSON document
    Json,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Peak list cleanup applied to each spectrum before it is compared
#[derive(Debug, Clone, Copy, PartialEq, clap::Args, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterArgs {
    /// Remove low m/z peaks, peaks near the precursor and peaks that are locally weak
    #[arg(long = "filter")]
    pub enabled: bool,

    /// Peaks below this m/z are removed when filtering
    #[arg(long = "min-mz", default_value_t = 50.0, value_parser = non_negative_float_f64)]
    pub min_mz: f64,

    /// Peaks within this many Daltons of the precursor are removed when filtering
    #[arg(
        long = "parent-filter-tolerance",
        default_value_t = 17.0,
        value_parser = non_negative_float_f64
    )]
    pub parent_filter_tolerance: f64,

    /// Peaks below this percentage of the base peak are removed when filtering
    #[arg(long = "min-intensity", default_value_t = 0.0, value_parser = non_negative_float_f32)]
    pub min_intensity: f32,

    /// The half-width of the m/z window used to rank peaks against their neighbors
    #[arg(
        long = "matched-peaks-window",
        default_value_t = 50.0,
        value_parser = non_negative_float_f64
    )]
    pub matched_peaks_window: f64,

    /// Keep a peak only if it is among this many most intense peaks in its window, 0 to disable
    #[arg(long = "min-matched-peaks-search", default_value_t = 6)]
    pub min_matched_peaks_search: usize,

    /// Keep at most this many of the most intense peaks of each spectrum, with or without
    /// `--filter`
    #[arg(long = "max-peaks")]
    pub max_peaks: Option<usize>,
}

impl Default for FilterArgs {
    fn default() -> Self {
        let filter = PeakFilter::default();
        Self {
            enabled: false,
            min_mz: filter.min_mz,
            parent_filter_tolerance: filter.parent_filter_tolerance,
            min_intensity: filter.min_intensity,
            matched_peaks_window: filter.matched_peaks_window,
            min_matched_peaks_search: filter.min_matched_peaks_search,
            max_peaks: filter.max_peaks,
        }
    }
}

impl FilterArgs {
    /// The configured filter, or `None` when filtering is disabled
    pub fn peak_filter(&self) -> Option<PeakFilter> {
        if !self.enabled {
            return None;
        }
        Some(PeakFilter::new(
            self.min_mz,
            self.parent_filter_tolerance,
            self.min_intensity,
            self.matched_peaks_window,
            self.min_matched_peaks_search,
            self.max_peaks,
        ))
    }

    /// Run the configured filter over `spectrum`. When filtering is disabled
    /// only the `max_peaks` truncation applies.
    pub fn apply(&self, spectrum: Spectrum, parent_mass: f64) -> Spectrum {
        match (self.peak_filter(), self.max_peaks) {
            (Some(filter), _) => filter.filter(&spectrum, parent_mass),
            (None, Some(max_peaks)) => keep_most_intense(&spectrum, max_peaks),
            (None, None) => spectrum,
        }
    }
}

pub(crate) fn non_negative_float_f32(s: &str) -> Result<f32, String> {
    let value = s.parse::<f32>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

pub(crate) fn non_negative_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else if !value.is_finite() {
        Err(format!("`{s}` is not finite"))
    } else {
        Ok(value)
    }
}
