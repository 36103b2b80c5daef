pub mod engine;

pub use engine::{RiskConfig, RiskEngine, MIN_REWARD_RISK};
