mod config;
mod cooccurrence;
mod disambiguate;
mod error;
mod morphology;
mod pipeline;
mod similarity;
mod train;

pub use config::{files_handling, Config, JsonDisambiguation, JsonTrain, JsonTypes, SelectionMode};
pub use cooccurrence::Counts;
pub use disambiguate::{filter_neighbors, overlap, select_candidate, Disambiguator, FeaturePool, Selection};
pub use error::{DisambiguationError, Result};
pub use morphology::{Analyzer, Lexicon, Parse, TestCase};
pub use pipeline::Pipeline;
pub use similarity::{EmbeddingModel, Similarity};
pub use train::Train;
