pub mod indicators;
pub mod patterns;
pub mod snapshot;


pub use indicators::*;
pub use patterns::*;
pub use snapshot::*;
