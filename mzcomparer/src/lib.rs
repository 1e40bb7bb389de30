mod args;
mod driver;
mod types;
mod write;

pub use args::*;
pub use driver::{MZComparer, MZComparerError, DEFAULT_PEAK_LIMIT};
pub use types::ComparedSpectrum;
pub use write::{write_pair, write_ranking, PairReport, RankedHit, RankingReport};
