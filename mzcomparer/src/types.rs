use mzdata::spectrum::MultiLayerSpectrum;
use mzpeaks::{CentroidPeak, DeconvolutedPeak};
use serde::Serialize;

use mzcompare::Spectrum;

pub(crate) type CPeak = CentroidPeak;
pub(crate) type DPeak = DeconvolutedPeak;
pub(crate) type SpectrumType = MultiLayerSpectrum<CPeak, DPeak>;

/// A spectrum read from the input file, reduced to what a comparison needs
#[derive(Debug, Clone, Serialize)]
pub struct ComparedSpectrum {
    /// The position of the spectrum in the input file
    pub index: usize,
    /// The native identifier of the spectrum
    pub id: String,
    /// The precursor m/z, used as the parent mass
    pub parent_mass: f64,
    #[serde(skip)]
    pub spectrum: Spectrum,
}

impl ComparedSpectrum {
    pub fn new(index: usize, id: String, parent_mass: f64, spectrum: Spectrum) -> Self {
        Self {
            index,
            id,
            parent_mass,
            spectrum,
        }
    }

    pub fn len(&self) -> usize {
        self.spectrum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum.is_empty()
    }
}
