//! A comparison view that keeps matches, tables and highlights in step with
//! the loaded data and the user's selection.
//!
//! Consumers register callbacks that are invoked synchronously, on the calling
//! thread, whenever a new [`MatchSet`] is produced or the selection changes.
use std::fmt::Debug;

use tracing::{debug, warn};

use crate::annotate::{
    validate_tolerance, ComparisonInput, DefaultComparator, MatchSet, SpectrumComparator,
};
use crate::display::{AnnotationTables, DisplayConfig};
use crate::matcher::{ComparisonError, GreedyCosineMatcher, MatchKind, PeakMatcher};
use crate::normalize::{Normalizer, SquareRootNormalizer};
use crate::selection::{Emphasis, Selection};
use crate::spectrum::{Spectrum, SpectrumSide};

/// Invoked with the new matches and their display tables
pub type MatchSetCallback = Box<dyn FnMut(&MatchSet, &AnnotationTables)>;
/// Invoked with the emphasis of the first and second spectrum
pub type SelectionCallback = Box<dyn FnMut(&Emphasis, &Emphasis)>;

pub struct ComparisonView<N: Normalizer, M: PeakMatcher> {
    comparator: SpectrumComparator<N, M>,
    config: DisplayConfig,
    input: ComparisonInput,
    matches: MatchSet,
    tables: AnnotationTables,
    selection: Selection,
    match_observers: Vec<MatchSetCallback>,
    selection_observers: Vec<SelectionCallback>,
}

impl<N: Normalizer + Debug, M: PeakMatcher + Debug> Debug for ComparisonView<N, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonView")
            .field("comparator", &self.comparator)
            .field("config", &self.config)
            .field("matches", &self.matches.len())
            .field("selection", &self.selection)
            .field("match_observers", &self.match_observers.len())
            .field("selection_observers", &self.selection_observers.len())
            .finish()
    }
}

/// A [`ComparisonView`] over a [`DefaultComparator`]
pub type DefaultComparisonView = ComparisonView<SquareRootNormalizer, GreedyCosineMatcher>;

impl Default for DefaultComparisonView {
    fn default() -> Self {
        Self::new(DefaultComparator::default(), DisplayConfig::default())
    }
}

impl<N: Normalizer, M: PeakMatcher> ComparisonView<N, M> {
    pub fn new(comparator: SpectrumComparator<N, M>, config: DisplayConfig) -> Self {
        Self {
            comparator,
            config,
            input: ComparisonInput::default(),
            matches: MatchSet::default(),
            tables: AnnotationTables::default(),
            selection: Selection::default(),
            match_observers: Vec::new(),
            selection_observers: Vec::new(),
        }
    }

    /// Register a callback for new match sets
    pub fn on_matches<F: FnMut(&MatchSet, &AnnotationTables) + 'static>(&mut self, callback: F) {
        self.match_observers.push(Box::new(callback));
    }

    /// Register a callback for selection changes
    pub fn on_selection<F: FnMut(&Emphasis, &Emphasis) + 'static>(&mut self, callback: F) {
        self.selection_observers.push(Box::new(callback));
    }

    pub fn tolerance(&self) -> f64 {
        self.comparator.tolerance()
    }

    /// Change the m/z tolerance and recompute the matches. An invalid
    /// tolerance is rejected and leaves the view unchanged.
    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<(), ComparisonError> {
        validate_tolerance(tolerance)?;
        self.comparator.set_tolerance(tolerance);
        self.refresh()
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Change how many decimal digits are displayed. Matches are not recomputed.
    pub fn set_float_precision(&mut self, float_precision: usize) {
        self.config.float_precision = float_precision;
    }

    pub fn input(&self) -> &ComparisonInput {
        &self.input
    }

    pub fn matches(&self) -> &MatchSet {
        &self.matches
    }

    pub fn tables(&self) -> &AnnotationTables {
        &self.tables
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The formatted cells of one table under the current display settings
    pub fn formatted_rows(&self, kind: MatchKind) -> Vec<[String; 3]> {
        self.tables.get(kind).formatted_rows(&self.config)
    }

    /// Replace all loaded data and recompute
    pub fn set_input(&mut self, input: ComparisonInput) -> Result<(), ComparisonError> {
        self.input = input;
        self.refresh()
    }

    /// Replace the data loaded for one side and recompute
    pub fn set_spectrum(
        &mut self,
        side: SpectrumSide,
        spectrum: Option<Spectrum>,
        parent_mass: Option<f64>,
    ) -> Result<(), ComparisonError> {
        match side {
            SpectrumSide::First => {
                self.input.spectrum1 = spectrum;
                self.input.parent_mass1 = parent_mass;
            }
            SpectrumSide::Second => {
                self.input.spectrum2 = spectrum;
                self.input.parent_mass2 = parent_mass;
            }
        }
        self.refresh()
    }

    /// Recompute matches from the loaded data.
    ///
    /// When some data is missing, nothing is compared and the view is
    /// cleared. When the comparison fails the view is cleared and the error
    /// is returned. Either way observers are notified, and the selection is
    /// reset because it referred to the previous tables.
    pub fn refresh(&mut self) -> Result<(), ComparisonError> {
        let result = match self.input.ready() {
            Some((s1, p1, s2, p2)) => self
                .comparator
                .annotate(s1, p1, s2, p2)
                .and_then(|matches| {
                    let tables = AnnotationTables::from_match_set(&matches, s1, p1, s2, p2)?;
                    Ok((matches, tables))
                })
                .map(Some),
            None => {
                debug!("Comparison data incomplete, clearing");
                Ok(None)
            }
        };

        let outcome = match result {
            Ok(Some((matches, tables))) => {
                self.matches = matches;
                self.tables = tables;
                Ok(())
            }
            Ok(None) => {
                self.clear_results();
                Ok(())
            }
            Err(e) => {
                warn!("Comparison failed: {e}");
                self.clear_results();
                Err(e)
            }
        };

        for callback in self.match_observers.iter_mut() {
            callback(&self.matches, &self.tables);
        }
        self.select(Selection::default());
        outcome
    }

    fn clear_results(&mut self) {
        self.matches = MatchSet::default();
        self.tables = AnnotationTables::default();
    }

    fn spectrum_len(&self, side: SpectrumSide) -> usize {
        self.input.spectrum(side).map(|s| s.len()).unwrap_or_default()
    }

    /// The current emphasis of one spectrum
    pub fn emphasis(&self, side: SpectrumSide) -> Emphasis {
        Emphasis::from_selection(&self.selection, side, self.spectrum_len(side))
    }

    /// Replace the selection and notify observers with freshly computed emphases
    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
        let first = self.emphasis(SpectrumSide::First);
        let second = self.emphasis(SpectrumSide::Second);
        for callback in self.selection_observers.iter_mut() {
            callback(&first, &second);
        }
    }

    /// Select `(row, column)` cells of one of the tables
    pub fn select_table_cells(&mut self, kind: MatchKind, cells: &[(usize, usize)]) {
        let selection = Selection::from_table_cells(self.tables.get(kind), cells);
        self.select(selection);
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn load(view: &mut DefaultComparisonView) -> Result<(), ComparisonError> {
        view.set_input(ComparisonInput::new(
            Some(vec![(100.0, 50.0), (200.0, 100.0)].into()),
            Some(300.0),
            Some(vec![(100.05, 60.0)].into()),
            Some(300.0),
        ))
    }

    #[test_log::test]
    fn test_observers_fire() -> Result<(), ComparisonError> {
        let mut view = DefaultComparisonView::default();
        view.set_tolerance(0.1)?;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_ = Rc::clone(&seen);
        view.on_matches(move |matches, tables| {
            seen_
                .borrow_mut()
                .push((matches.len(), tables.fragments.header_visible()));
        });

        let highlights = Rc::new(RefCell::new(Vec::new()));
        let highlights_ = Rc::clone(&highlights);
        view.on_selection(move |first, second| {
            highlights_
                .borrow_mut()
                .push((first.indices(), second.indices()));
        });

        load(&mut view)?;
        assert_eq!(seen.borrow().last(), Some(&(1, true)));
        assert_eq!(view.formatted_rows(MatchKind::Fragment)[0][1], "100.0500");

        view.select_table_cells(MatchKind::Fragment, &[(0, 0)]);
        assert_eq!(
            highlights.borrow().last(),
            Some(&(vec![0], Vec::<usize>::new()))
        );
        assert_eq!(
            view.emphasis(SpectrumSide::First).line_widths(view.config()),
            vec![2.5, 1.0]
        );
        Ok(())
    }

    #[test]
    fn test_missing_input_clears() -> Result<(), ComparisonError> {
        let mut view = DefaultComparisonView::default();
        view.set_tolerance(0.1)?;
        load(&mut view)?;
        assert_eq!(view.matches().len(), 1);

        let count = Rc::new(RefCell::new(0usize));
        let count_ = Rc::clone(&count);
        view.on_matches(move |matches, _| {
            assert!(matches.is_empty());
            *count_.borrow_mut() += 1;
        });
        view.set_spectrum(SpectrumSide::Second, None, None)?;
        assert!(view.matches().is_empty());
        assert!(view.tables().is_empty());
        assert_eq!(*count.borrow(), 1);
        Ok(())
    }

    #[test]
    fn test_failure_clears_and_propagates() -> Result<(), ComparisonError> {
        let mut view = DefaultComparisonView::default();
        view.set_tolerance(0.1)?;
        load(&mut view)?;
        view.select_table_cells(MatchKind::Fragment, &[(0, 2)]);
        assert_eq!(view.selection().cells().len(), 2);

        let err = view
            .set_spectrum(
                SpectrumSide::First,
                Some(vec![(-5.0, 1.0)].into()),
                Some(300.0),
            )
            .unwrap_err();
        assert!(matches!(err, ComparisonError::InvalidSpectrum(_)));
        assert!(view.matches().is_empty());
        assert!(view.selection().is_empty());
        Ok(())
    }

    #[test]
    fn test_invalid_tolerance_rejected() -> Result<(), ComparisonError> {
        let mut view = DefaultComparisonView::default();
        assert_eq!(
            view.set_tolerance(f64::NAN).map_err(|e| e.to_string()),
            Err("Invalid m/z tolerance NaN".to_string())
        );
        assert_eq!(view.set_tolerance(-0.5), Err(ComparisonError::InvalidTolerance(-0.5)));
        assert_eq!(view.tolerance(), crate::DEFAULT_TOLERANCE);

        view.set_tolerance(0.1)?;
        load(&mut view)?;
        assert!(view.set_tolerance(f64::INFINITY).is_err());
        assert_eq!(view.tolerance(), 0.1);
        assert_eq!(view.matches().len(), 1);
        Ok(())
    }

    #[test]
    fn test_precision_does_not_recompute() -> Result<(), ComparisonError> {
        let mut view = DefaultComparisonView::default();
        view.set_tolerance(0.1)?;
        load(&mut view)?;
        let before = view.matches().clone();
        view.set_float_precision(1);
        assert_eq!(view.formatted_rows(MatchKind::Fragment)[0][0], "100.0");
        assert_eq!(view.matches(), &before);
        Ok(())
    }
}
