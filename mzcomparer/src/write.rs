use std::io::{self, Write};

use serde::Serialize;

use mzcompare::{AnnotationTable, DisplayConfig, MatchSet, ScoreType};

use crate::args::OutputFormat;
use crate::driver::MZComparerError;
use crate::types::ComparedSpectrum;

/// The result of comparing two spectra
#[derive(Debug, Serialize)]
pub struct PairReport<'a> {
    pub first: &'a ComparedSpectrum,
    pub second: &'a ComparedSpectrum,
    pub tolerance: f64,
    pub score: ScoreType,
    pub matches: &'a MatchSet,
    pub fragments: &'a AnnotationTable,
    pub neutral_losses: &'a AnnotationTable,
}

#[derive(Debug, Serialize)]
pub struct RankedHit<'a> {
    pub target: &'a ComparedSpectrum,
    pub score: ScoreType,
}

/// The best matches for one query spectrum, most similar first
#[derive(Debug, Serialize)]
pub struct RankingReport<'a> {
    pub query: &'a ComparedSpectrum,
    pub tolerance: f64,
    pub hits: Vec<RankedHit<'a>>,
}

fn write_spectrum_line<W: Write>(
    writer: &mut W,
    label: &str,
    spectrum: &ComparedSpectrum,
    config: &DisplayConfig,
) -> io::Result<()> {
    writeln!(
        writer,
        "# {label}: {} (index {}, parent mass {}, {} peaks)",
        spectrum.id,
        spectrum.index,
        config.format_float(spectrum.parent_mass),
        spectrum.len()
    )
}

fn write_table<W: Write>(
    writer: &mut W,
    title: &str,
    table: &AnnotationTable,
    config: &DisplayConfig,
) -> io::Result<()> {
    writeln!(writer, "{title}")?;
    if !table.header_visible() {
        writeln!(writer, "(no matches)")?;
        return Ok(());
    }
    writeln!(writer, "{}", table.headers().join("\t"))?;
    for row in table.formatted_rows(config) {
        writeln!(writer, "{}", row.join("\t"))?;
    }
    Ok(())
}

pub fn write_pair<W: Write>(
    writer: &mut W,
    report: &PairReport<'_>,
    format: OutputFormat,
    config: &DisplayConfig,
) -> Result<(), MZComparerError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, report)?;
            writeln!(writer)?;
        }
        OutputFormat::Text => {
            write_spectrum_line(writer, "First", report.first, config)?;
            write_spectrum_line(writer, "Second", report.second, config)?;
            writeln!(
                writer,
                "# Cosine score: {} ({} matched peaks, tolerance {})",
                config.format_float(report.score as f64),
                report.matches.len(),
                report.tolerance
            )?;
            writeln!(writer)?;
            write_table(writer, "Fragments", report.fragments, config)?;
            writeln!(writer)?;
            write_table(writer, "Neutral losses", report.neutral_losses, config)?;
        }
    }
    Ok(())
}

pub fn write_ranking<W: Write>(
    writer: &mut W,
    report: &RankingReport<'_>,
    format: OutputFormat,
    config: &DisplayConfig,
) -> Result<(), MZComparerError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, report)?;
            writeln!(writer)?;
        }
        OutputFormat::Text => {
            write_spectrum_line(writer, "Query", report.query, config)?;
            writeln!(writer, "rank\tindex\tid\tparent mass\tscore")?;
            for (rank, hit) in report.hits.iter().enumerate() {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}",
                    rank + 1,
                    hit.target.index,
                    hit.target.id,
                    config.format_float(hit.target.parent_mass),
                    config.format_float(hit.score as f64)
                )?;
            }
        }
    }
    Ok(())
}
