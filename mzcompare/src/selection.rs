//! Mapping table selections onto the peaks to highlight
use std::collections::HashSet;

use identity_hash::BuildIdentityHasher;

use crate::display::{AnnotationTable, DisplayConfig, TableColumn};
use crate::spectrum::SpectrumSide;

/// A set of peak indices
pub type IndexSet = HashSet<usize, BuildIdentityHasher<usize>>;

/// A single selected peak reference, taken from a table cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectedCell {
    pub side: SpectrumSide,
    pub peak_index: usize,
}

impl SelectedCell {
    pub fn new(side: SpectrumSide, peak_index: usize) -> Self {
        Self { side, peak_index }
    }

    /// The peaks referenced by the cell at `row`, `column` of `table`.
    ///
    /// A mass column refers to the peak of its own spectrum, the score column
    /// refers to both peaks of the match. Cells out of range refer to nothing.
    pub fn from_table(table: &AnnotationTable, row: usize, column: usize) -> Vec<SelectedCell> {
        let (Some(row), Some(column)) = (table.row(row), TableColumn::from_index(column)) else {
            return Vec::new();
        };
        match column.side() {
            Some(side) => vec![Self::new(side, row.index_for(side))],
            None => vec![
                Self::new(SpectrumSide::First, row.index1),
                Self::new(SpectrumSide::Second, row.index2),
            ],
        }
    }
}

/// The current set of selected peak references across both tables
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selection {
    cells: Vec<SelectedCell>,
}

impl Selection {
    pub fn new(cells: Vec<SelectedCell>) -> Self {
        Self { cells }
    }

    /// Build a selection from `(row, column)` pairs of `table`
    pub fn from_table_cells(table: &AnnotationTable, cells: &[(usize, usize)]) -> Self {
        let cells = cells
            .iter()
            .flat_map(|(row, column)| SelectedCell::from_table(table, *row, *column))
            .collect();
        Self { cells }
    }

    pub fn push(&mut self, cell: SelectedCell) {
        self.cells.push(cell);
    }

    pub fn extend<I: IntoIterator<Item = SelectedCell>>(&mut self, cells: I) {
        self.cells.extend(cells);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[SelectedCell] {
        &self.cells
    }

    /// The selected peak indices of one spectrum
    pub fn indices(&self, side: SpectrumSide) -> IndexSet {
        self.cells
            .iter()
            .filter(|c| c.side == side)
            .map(|c| c.peak_index)
            .collect()
    }
}

/// Which peaks of one spectrum are drawn emphasized
#[derive(Debug, Clone, PartialEq)]
pub struct Emphasis {
    pub side: SpectrumSide,
    n_peaks: usize,
    emphasized: IndexSet,
}

impl Emphasis {
    /// Nothing emphasized
    pub fn none(side: SpectrumSide, n_peaks: usize) -> Self {
        Self {
            side,
            n_peaks,
            emphasized: IndexSet::default(),
        }
    }

    /// Compute the emphasis for the `side` spectrum of `n_peaks` peaks from scratch.
    ///
    /// Selected indices beyond the end of the spectrum are ignored.
    pub fn from_selection(selection: &Selection, side: SpectrumSide, n_peaks: usize) -> Self {
        let mut emphasized = selection.indices(side);
        emphasized.retain(|i| *i < n_peaks);
        Self {
            side,
            n_peaks,
            emphasized,
        }
    }

    pub fn is_emphasized(&self, index: usize) -> bool {
        self.emphasized.contains(&index)
    }

    pub fn n_peaks(&self) -> usize {
        self.n_peaks
    }

    /// The emphasized peak indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<_> = self.emphasized.iter().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// One line width per peak
    pub fn line_widths(&self, config: &DisplayConfig) -> Vec<f32> {
        (0..self.n_peaks)
            .map(|i| {
                if self.is_emphasized(i) {
                    config.emphasized_line_width
                } else {
                    config.normal_line_width
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::display::AnnotationRow;
    use crate::matcher::MatchKind;

    fn table() -> AnnotationTable {
        AnnotationTable {
            kind: MatchKind::Fragment,
            rows: vec![
                AnnotationRow {
                    mz1: 100.0,
                    mz2: 100.01,
                    score: 0.4,
                    index1: 1,
                    index2: 0,
                },
                AnnotationRow {
                    mz1: 150.0,
                    mz2: 150.0,
                    score: 0.2,
                    index1: 3,
                    index2: 2,
                },
            ],
        }
    }

    #[test]
    fn test_first_column_selection() {
        let selection = Selection::from_table_cells(&table(), &[(0, 0)]);
        let first = Emphasis::from_selection(&selection, SpectrumSide::First, 4);
        let second = Emphasis::from_selection(&selection, SpectrumSide::Second, 3);
        assert_eq!(first.indices(), vec![1]);
        assert!(second.indices().is_empty());

        let widths = first.line_widths(&DisplayConfig::default());
        assert_eq!(widths, vec![1.0, 2.5, 1.0, 1.0]);
    }

    #[test]
    fn test_score_column_selects_both() {
        let selection = Selection::from_table_cells(&table(), &[(1, 2), (9, 0), (0, 7)]);
        assert_eq!(
            selection.cells(),
            &[
                SelectedCell::new(SpectrumSide::First, 3),
                SelectedCell::new(SpectrumSide::Second, 2)
            ]
        );
    }

    #[test]
    fn test_recomputation_is_pure() {
        let mut selection = Selection::default();
        selection.push(SelectedCell::new(SpectrumSide::Second, 2));
        selection.push(SelectedCell::new(SpectrumSide::Second, 10));
        let a = Emphasis::from_selection(&selection, SpectrumSide::Second, 3);
        let b = Emphasis::from_selection(&selection, SpectrumSide::Second, 3);
        assert_eq!(a, b);
        assert_eq!(a.indices(), vec![2]);
        assert!(!a.is_emphasized(10));

        selection.clear();
        let c = Emphasis::from_selection(&selection, SpectrumSide::Second, 3);
        assert_eq!(c, Emphasis::none(SpectrumSide::Second, 3));
    }
}
