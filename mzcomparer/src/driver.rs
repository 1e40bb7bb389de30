use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use clap::Parser;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracing::{debug, info, warn};

use mzdata::io::{infer_format, mgf::MGFReaderType, mzml::MzMLReaderType, MassSpectrometryFormat};
use mzdata::prelude::*;
use mzdata::spectrum::SignalContinuity;

use mzcompare::{
    AnnotationTables, ComparisonError, DefaultComparator, DisplayConfig, ScoreType, Spectrum,
};

use crate::args::{non_negative_float_f64, FilterArgs, OutputFormat};
use crate::types::{CPeak, ComparedSpectrum, DPeak, SpectrumType};
use crate::write::{write_pair, write_ranking, PairReport, RankedHit, RankingReport};

/// The largest peak list compared by default
pub const DEFAULT_PEAK_LIMIT: usize = 10_000;

#[derive(Debug, Error)]
pub enum MZComparerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The input file format for {0} was either unknown or not supported ({1:?})")]
    FormatUnknownOrNotSupportedError(String, MassSpectrometryFormat),
    #[error("The input file {0} is gzip compressed, which is not currently supported")]
    CompressedInputError(String),
    #[error("Spectrum index {index} is out of range, the input has {count} spectra")]
    SpectrumNotFound { index: usize, count: usize },
    #[error("Spectrum {0} has no precursor and cannot be compared")]
    MissingPrecursor(String),
    #[error("Cannot infer the peak mode of spectrum {0}")]
    UnknownSignalContinuity(String),
    #[error("Failed to build centroids for spectrum {0}: {1}")]
    PeakPickingError(String, String),
    #[error("Failed to compare spectra: {0}")]
    ComparisonError(
        #[source]
        #[from]
        ComparisonError,
    ),
    #[error("Failed to write JSON: {0}")]
    JSONError(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("Failed to write the configuration: {0}")]
    ConfigWriteError(
        #[source]
        #[from]
        toml::ser::Error,
    ),
    #[error("Failed to read the configuration: {0}")]
    ConfigReadError(
        #[source]
        #[from]
        figment::Error,
    ),
}

/// Compare tandem mass spectra and annotate their shared peaks.
///
/// Read a peak list file and either compare two of its spectra, printing the
/// matched fragments and neutral losses, or rank every other spectrum in the
/// file by its cosine similarity to one query spectrum.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZComparer {
    /// The path to read the input spectra from
    #[arg()]
    pub input_file: String,

    /// The index of the first spectrum, or the query spectrum when no second index is given
    #[arg()]
    pub first: usize,

    /// The index of the second spectrum. If omitted, every other spectrum is
    /// ranked against the first
    #[arg()]
    pub second: Option<usize>,

    /// The path to write the output to, or if '-' is passed, write to STDOUT
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzcomparer.toml` in the working directory.
    /// Environment variables prefixed with `MZCOMPARER_` will be read too. Values from
    /// these sources take precedence over the command line.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Write the effective configuration to this path as TOML before running
    #[arg(long = "write-config")]
    pub write_config: Option<PathBuf>,

    /// The m/z window within which two peaks may be paired, in Daltons
    #[arg(
        short = 't',
        long = "tolerance",
        default_value_t = mzcompare::DEFAULT_TOLERANCE,
        value_parser = non_negative_float_f64
    )]
    pub tolerance: f64,

    /// The number of decimal digits to show for masses and scores
    #[arg(short = 'p', long = "precision", default_value_t = 4)]
    pub precision: usize,

    /// Report a score of zero when fewer than this many peaks were matched
    #[arg(short = 'm', long = "min-matched-peaks", default_value_t = 0)]
    pub min_matched_peaks: usize,

    /// The number of hits to report when ranking
    #[arg(short = 'n', long = "top", default_value_t = 10)]
    pub top: usize,

    /// The output format
    #[arg(short = 'f', long = "format", default_value = "text")]
    pub format: OutputFormat,

    /// Refuse to compare a spectrum with more than this many peaks, 0 for no limit
    #[arg(long = "peak-limit", default_value_t = DEFAULT_PEAK_LIMIT)]
    pub peak_limit: usize,

    /// The number of threads to use when ranking, passing a value < 1 to use all available threads
    #[arg(long = "threads", default_value_t = -1)]
    pub threads: i32,

    #[command(flatten)]
    #[serde(default)]
    pub filter: FilterArgs,
}

impl MZComparer {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZComparerError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e).into())
    }

    pub fn display_config(&self) -> DisplayConfig {
        DisplayConfig::new(self.precision)
    }

    pub fn make_comparator(&self) -> DefaultComparator {
        let peak_limit = (self.peak_limit > 0).then_some(self.peak_limit);
        let mut comparator = DefaultComparator::default().with_max_peaks(peak_limit);
        comparator.set_tolerance(self.tolerance);
        comparator
    }

    /// Serialize the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, MZComparerError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn main(&self) -> Result<(), MZComparerError> {
        info!(
            "mzcomparer v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        if let Some(path) = self.write_config.as_ref() {
            info!("Writing configuration to {}", path.display());
            fs::write(path, self.to_toml()?)?;
        }
        self.reader_then()
    }

    fn reader_then(&self) -> Result<(), MZComparerError> {
        let (ms_format, compressed) = infer_format(&self.input_file)?;
        debug!("Detected {ms_format:?} from path (compressed? {compressed})");
        if compressed {
            return Err(MZComparerError::CompressedInputError(self.input_file.clone()));
        }
        match ms_format {
            MassSpectrometryFormat::MGF => {
                let reader = MGFReaderType::open_path(self.input_file.clone())?;
                self.run_workflow(reader)
            }
            MassSpectrometryFormat::MzML => {
                let reader = MzMLReaderType::open_path(self.input_file.clone())?;
                self.run_workflow(reader)
            }
            _ => Err(MZComparerError::FormatUnknownOrNotSupportedError(
                self.input_file.clone(),
                ms_format,
            )),
        }
    }

    fn run_workflow<R: RandomAccessSpectrumIterator<CPeak, DPeak, SpectrumType>>(
        &self,
        mut reader: R,
    ) -> Result<(), MZComparerError> {
        let start = Instant::now();
        match self.second {
            Some(second) => self.compare_pair(&mut reader, self.first, second)?,
            None => self.rank_against(&mut reader, self.first)?,
        }
        info!("Elapsed Time: {:0.3?}", Instant::now() - start);
        Ok(())
    }

    /// Turn a scan into a centroided peak list with its precursor m/z
    fn prepare_spectrum(
        &self,
        index: usize,
        mut scan: SpectrumType,
    ) -> Result<ComparedSpectrum, MZComparerError> {
        let id = scan.id().to_string();
        let parent_mass = scan
            .precursor()
            .and_then(|prec| prec.ion().map(|ion| ion.mz))
            .ok_or_else(|| MZComparerError::MissingPrecursor(id.clone()))?;

        let peaks = match scan.signal_continuity() {
            SignalContinuity::Unknown => {
                return Err(MZComparerError::UnknownSignalContinuity(id));
            }
            SignalContinuity::Centroid => scan
                .try_build_centroids()
                .map_err(|e| MZComparerError::PeakPickingError(id.clone(), format!("{e:?}")))?,
            SignalContinuity::Profile => {
                scan.pick_peaks(1.0)
                    .map_err(|e| MZComparerError::PeakPickingError(id.clone(), format!("{e:?}")))?;
                scan.description_mut().signal_continuity = SignalContinuity::Centroid;
                scan.peaks.as_ref().ok_or_else(|| {
                    MZComparerError::PeakPickingError(id.clone(), "no peaks picked".into())
                })?
            }
        };

        let spectrum: Spectrum = peaks.iter().map(|p| (p.mz, p.intensity)).collect();
        let before = spectrum.len();
        let spectrum = self.filter.apply(spectrum, parent_mass);
        if spectrum.len() != before {
            debug!("Filtered {id} from {before} to {} peaks", spectrum.len());
        }
        Ok(ComparedSpectrum::new(index, id, parent_mass, spectrum))
    }

    fn load_spectrum<R: RandomAccessSpectrumIterator<CPeak, DPeak, SpectrumType>>(
        &self,
        reader: &mut R,
        index: usize,
    ) -> Result<ComparedSpectrum, MZComparerError> {
        let count = reader.len();
        let scan = reader
            .get_spectrum_by_index(index)
            .ok_or(MZComparerError::SpectrumNotFound { index, count })?;
        self.prepare_spectrum(index, scan)
    }

    fn compare_pair<R: RandomAccessSpectrumIterator<CPeak, DPeak, SpectrumType>>(
        &self,
        reader: &mut R,
        first: usize,
        second: usize,
    ) -> Result<(), MZComparerError> {
        let first = self.load_spectrum(reader, first)?;
        let second = self.load_spectrum(reader, second)?;
        info!(
            "Comparing {} ({} peaks) with {} ({} peaks)",
            first.id,
            first.len(),
            second.id,
            second.len()
        );

        let comparator = self.make_comparator();
        let matches = comparator.annotate(
            &first.spectrum,
            first.parent_mass,
            &second.spectrum,
            second.parent_mass,
        )?;
        let tables = AnnotationTables::from_match_set(
            &matches,
            &first.spectrum,
            first.parent_mass,
            &second.spectrum,
            second.parent_mass,
        )?;
        let score = matches.score(self.min_matched_peaks);
        info!(
            "Fragments: {} | Neutral Losses: {} | Score: {score:0.4}",
            tables.fragments.len(),
            tables.neutral_losses.len()
        );

        let report = PairReport {
            first: &first,
            second: &second,
            tolerance: self.tolerance,
            score,
            matches: &matches,
            fragments: &tables.fragments,
            neutral_losses: &tables.neutral_losses,
        };
        let mut outfile = self.open_output()?;
        write_pair(&mut outfile, &report, self.format, &self.display_config())?;
        outfile.flush()?;
        Ok(())
    }

    fn rank_against<R: RandomAccessSpectrumIterator<CPeak, DPeak, SpectrumType>>(
        &self,
        reader: &mut R,
        query_index: usize,
    ) -> Result<(), MZComparerError> {
        let query = self.load_spectrum(reader, query_index)?;
        query.spectrum.validate().map_err(ComparisonError::from)?;
        let count = reader.len();
        let mut library = Vec::with_capacity(count);
        for index in (0..count).filter(|i| *i != query_index) {
            let Some(scan) = reader.get_spectrum_by_index(index) else {
                warn!("Failed to read spectrum {index}, skipping");
                continue;
            };
            match self.prepare_spectrum(index, scan) {
                Ok(spectrum) => library.push(spectrum),
                Err(e) => warn!("Skipping spectrum {index}: {e}"),
            }
        }
        info!(
            "Ranking {} spectra against {} ({} peaks)",
            library.len(),
            query.id,
            query.len()
        );

        let comparator = self.make_comparator();
        let hits = self.create_threadpool()?.install(|| {
            library
                .par_iter()
                .filter_map(|target| {
                    match comparator.score(
                        &query.spectrum,
                        query.parent_mass,
                        &target.spectrum,
                        target.parent_mass,
                        self.min_matched_peaks,
                    ) {
                        Ok(score) => Some((target, score)),
                        Err(e) => {
                            warn!("Skipping spectrum {}: {e}", target.index);
                            None
                        }
                    }
                })
                .collect::<Vec<(&ComparedSpectrum, ScoreType)>>()
        });

        let hits: Vec<RankedHit> = hits
            .into_iter()
            .sorted_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then(a.index.cmp(&b.index)))
            .take(self.top)
            .map(|(target, score)| RankedHit { target, score })
            .collect();

        let report = RankingReport {
            query: &query,
            tolerance: self.tolerance,
            hits,
        };
        let mut outfile = self.open_output()?;
        write_ranking(&mut outfile, &report, self.format, &self.display_config())?;
        outfile.flush()?;
        Ok(())
    }

    fn open_output(&self) -> io::Result<Box<dyn Write>> {
        if self.output_file == PathBuf::from("-") {
            Ok(Box::new(io::BufWriter::new(io::stdout())))
        } else {
            Ok(Box::new(io::BufWriter::new(fs::File::create(
                &self.output_file,
            )?)))
        }
    }
}
