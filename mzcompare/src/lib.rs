//! Pairwise comparison of tandem mass spectra.
//!
//! Two peak lists are normalized, their peaks paired by a
//! [`PeakMatcher`](crate::matcher::PeakMatcher) either directly
//! ([`MatchKind::Fragment`]) or relative to their parent masses
//! ([`MatchKind::NeutralLoss`]), and the pairs turned into display tables
//! and peak highlights.
pub mod matcher;
pub mod normalize;
pub mod spectrum;

pub mod annotate;
pub mod display;
pub mod selection;
pub mod view;

pub use crate::annotate::{
    annotate, validate_tolerance, ComparisonInput, DefaultComparator, MatchSet,
    SpectrumComparator, DEFAULT_TOLERANCE,
};
pub use crate::display::{AnnotationRow, AnnotationTable, AnnotationTables, DisplayConfig};
pub use crate::matcher::{
    cosine_score, ComparisonError, GreedyCosineMatcher, MatchKind, PeakMatch, PeakMatcher,
    ScoreType,
};
pub use crate::normalize::{
    keep_most_intense, square_root_and_normalize, Normalizer, PeakFilter, SquareRootNormalizer,
};
pub use crate::selection::{Emphasis, SelectedCell, Selection};
pub use crate::spectrum::{InvalidSpectrumError, Spectrum, SpectrumSide};
pub use crate::view::{ComparisonView, DefaultComparisonView};
