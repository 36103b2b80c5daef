//! Weighted fusion of the four model opinions into one five-way signal.

pub mod aggregator;
pub mod bands;
pub mod weights;


pub use aggregator::EnsembleAggregator;
pub use bands::SignalBands;
pub use weights::ModelWeights;
