//! Display rows for match tables
use crate::annotate::MatchSet;
use crate::matcher::{ComparisonError, MatchKind, PeakMatch, ScoreType};
use crate::spectrum::{Spectrum, SpectrumSide};

/// Presentation settings passed to the formatting layer.
///
/// None of these values influence matching, they are only consulted when
/// numbers are turned into text or peaks are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayConfig {
    /// The number of decimal digits shown for masses and scores
    pub float_precision: usize,
    /// The line width of a peak that is not selected
    pub normal_line_width: f32,
    /// The line width of a selected peak
    pub emphasized_line_width: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            float_precision: 4,
            normal_line_width: 1.0,
            emphasized_line_width: 2.5,
        }
    }
}

impl DisplayConfig {
    pub fn new(float_precision: usize) -> Self {
        Self {
            float_precision,
            ..Default::default()
        }
    }

    pub fn format_float(&self, value: f64) -> String {
        format!("{value:.prec$}", prec = self.float_precision)
    }
}

/// The columns of an [`AnnotationTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableColumn {
    FirstMZ = 0,
    SecondMZ = 1,
    Score = 2,
}

impl TableColumn {
    pub const ALL: [TableColumn; 3] = [Self::FirstMZ, Self::SecondMZ, Self::Score];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The spectrum a column's values come from, `None` for the score
    pub fn side(&self) -> Option<SpectrumSide> {
        match self {
            Self::FirstMZ => Some(SpectrumSide::First),
            Self::SecondMZ => Some(SpectrumSide::Second),
            Self::Score => None,
        }
    }
}

/// One displayed match
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotationRow {
    /// The displayed mass for the first spectrum's peak
    pub mz1: f64,
    /// The displayed mass for the second spectrum's peak
    pub mz2: f64,
    pub score: ScoreType,
    pub index1: usize,
    pub index2: usize,
}

impl AnnotationRow {
    pub fn index_for(&self, side: SpectrumSide) -> usize {
        match side {
            SpectrumSide::First => self.index1,
            SpectrumSide::Second => self.index2,
        }
    }

    pub fn value(&self, column: TableColumn) -> f64 {
        match column {
            TableColumn::FirstMZ => self.mz1,
            TableColumn::SecondMZ => self.mz2,
            TableColumn::Score => self.score as f64,
        }
    }

    /// The three cells of this row as text
    pub fn formatted(&self, config: &DisplayConfig) -> [String; 3] {
        TableColumn::ALL.map(|c| config.format_float(self.value(c)))
    }
}

/// The mass shown for a peak: its m/z for fragment matches, its distance
/// from the parent mass for neutral loss matches
pub fn display_mass(kind: MatchKind, peak_mz: f64, parent_mass: f64) -> f64 {
    match kind {
        MatchKind::Fragment => peak_mz,
        MatchKind::NeutralLoss => parent_mass - peak_mz,
    }
}

fn peak_mz(spectrum: &Spectrum, index: usize) -> Result<f64, ComparisonError> {
    spectrum.get(index).map(|p| p.mz).ok_or_else(|| {
        ComparisonError::MatcherFailure(format!(
            "match refers to peak {index} of a spectrum with {} peaks",
            spectrum.len()
        ))
    })
}

/// The rows of one kind of match, ready for display
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotationTable {
    pub kind: MatchKind,
    pub rows: Vec<AnnotationRow>,
}

impl AnnotationTable {
    pub fn empty(kind: MatchKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
        }
    }

    /// Build the table for `kind` from `matches`, keeping their order.
    ///
    /// Matches of other kinds are skipped.
    pub fn from_matches<'a, I: IntoIterator<Item = &'a PeakMatch>>(
        kind: MatchKind,
        matches: I,
        spectrum1: &Spectrum,
        parent_mass1: f64,
        spectrum2: &Spectrum,
        parent_mass2: f64,
    ) -> Result<Self, ComparisonError> {
        let mut rows = Vec::new();
        for m in matches.into_iter().filter(|m| m.kind == kind) {
            let mz1 = peak_mz(spectrum1, m.index1)?;
            let mz2 = peak_mz(spectrum2, m.index2)?;
            rows.push(AnnotationRow {
                mz1: display_mass(kind, mz1, parent_mass1),
                mz2: display_mass(kind, mz2, parent_mass2),
                score: m.score,
                index1: m.index1,
                index2: m.index2,
            });
        }
        Ok(Self { kind, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        TableColumn::ALL.len()
    }

    /// Headers are only shown for tables that have something to show
    pub fn header_visible(&self) -> bool {
        !self.rows.is_empty()
    }

    pub fn headers(&self) -> [&'static str; 3] {
        match self.kind {
            MatchKind::Fragment => ["m/z (first)", "m/z (second)", "Score"],
            MatchKind::NeutralLoss => ["Neutral loss (first)", "Neutral loss (second)", "Score"],
        }
    }

    pub fn row(&self, row: usize) -> Option<&AnnotationRow> {
        self.rows.get(row)
    }

    /// The text of a single cell, or `None` if it is out of range
    pub fn cell(&self, row: usize, column: usize, config: &DisplayConfig) -> Option<String> {
        let column = TableColumn::from_index(column)?;
        self.rows
            .get(row)
            .map(|r| config.format_float(r.value(column)))
    }

    pub fn formatted_rows(&self, config: &DisplayConfig) -> Vec<[String; 3]> {
        self.rows.iter().map(|r| r.formatted(config)).collect()
    }
}

/// The two match tables shown for a comparison
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotationTables {
    pub fragments: AnnotationTable,
    pub neutral_losses: AnnotationTable,
}

impl Default for AnnotationTables {
    fn default() -> Self {
        Self {
            fragments: AnnotationTable::empty(MatchKind::Fragment),
            neutral_losses: AnnotationTable::empty(MatchKind::NeutralLoss),
        }
    }
}

impl AnnotationTables {
    pub fn from_match_set(
        matches: &MatchSet,
        spectrum1: &Spectrum,
        parent_mass1: f64,
        spectrum2: &Spectrum,
        parent_mass2: f64,
    ) -> Result<Self, ComparisonError> {
        let fragments = AnnotationTable::from_matches(
            MatchKind::Fragment,
            matches,
            spectrum1,
            parent_mass1,
            spectrum2,
            parent_mass2,
        )?;
        let neutral_losses = AnnotationTable::from_matches(
            MatchKind::NeutralLoss,
            matches,
            spectrum1,
            parent_mass1,
            spectrum2,
            parent_mass2,
        )?;
        Ok(Self {
            fragments,
            neutral_losses,
        })
    }

    pub fn get(&self, kind: MatchKind) -> &AnnotationTable {
        match kind {
            MatchKind::Fragment => &self.fragments,
            MatchKind::NeutralLoss => &self.neutral_losses,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.neutral_losses.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::annotate::annotate;

    #[test]
    fn test_format_precision() {
        let config = DisplayConfig::default();
        assert_eq!(config.format_float(100.05), "100.0500");
        let config = DisplayConfig::new(2);
        assert_eq!(config.format_float(0.123456), "0.12");
    }

    #[test]
    fn test_neutral_loss_rows() -> Result<(), ComparisonError> {
        let s1: Spectrum = vec![(120.0, 10.0)].into();
        let s2: Spectrum = vec![(140.0, 10.0)].into();
        let matches = annotate(&s1, 300.0, &s2, 320.0, 0.02)?;
        let tables = AnnotationTables::from_match_set(&matches, &s1, 300.0, &s2, 320.0)?;
        assert!(tables.fragments.is_empty());
        assert!(!tables.fragments.header_visible());
        let row = tables.neutral_losses.rows[0];
        assert_eq!(row.mz1, 300.0 - 120.0);
        assert_eq!(row.mz2, 320.0 - 140.0);
        assert_eq!((row.index1, row.index2), (0, 0));
        assert!(tables.neutral_losses.header_visible());

        let config = DisplayConfig::default();
        assert_eq!(
            tables.neutral_losses.cell(0, 0, &config).as_deref(),
            Some("180.0000")
        );
        assert!(tables.neutral_losses.cell(0, 3, &config).is_none());
        assert!(tables.neutral_losses.cell(1, 0, &config).is_none());
        Ok(())
    }

    #[test]
    fn test_fragment_rows_keep_raw_mass() -> Result<(), ComparisonError> {
        let s1: Spectrum = vec![(100.0, 50.0), (200.0, 100.0)].into();
        let s2: Spectrum = vec![(100.05, 60.0)].into();
        let matches = annotate(&s1, 300.0, &s2, 300.0, 0.1)?;
        let tables = AnnotationTables::from_match_set(&matches, &s1, 300.0, &s2, 300.0)?;
        assert_eq!(tables.fragments.len(), 1);
        assert!(tables.neutral_losses.is_empty());
        let cells = tables.fragments.formatted_rows(&DisplayConfig::new(2));
        assert_eq!(cells[0][0], "100.00");
        assert_eq!(cells[0][1], "100.05");
        Ok(())
    }

    #[test]
    fn test_empty_tables_hide_headers() -> Result<(), ComparisonError> {
        let s1: Spectrum = vec![(100.0, 1.0)].into();
        let s2: Spectrum = vec![(250.0, 1.0)].into();
        let matches = annotate(&s1, 300.0, &s2, 300.0, 0.02)?;
        let tables = AnnotationTables::from_match_set(&matches, &s1, 300.0, &s2, 300.0)?;
        assert!(tables.is_empty());
        assert!(!tables.get(MatchKind::Fragment).header_visible());
        assert!(!tables.get(MatchKind::NeutralLoss).header_visible());
        Ok(())
    }

    #[test]
    fn test_bad_index_is_reported() {
        let s: Spectrum = vec![(100.0, 1.0)].into();
        let matches = MatchSet::new(vec![PeakMatch::new(0, 4, 0.5, MatchKind::Fragment)]);
        let err = AnnotationTables::from_match_set(&matches, &s, 300.0, &s, 300.0).unwrap_err();
        assert!(matches!(err, ComparisonError::MatcherFailure(_)));
    }
}
