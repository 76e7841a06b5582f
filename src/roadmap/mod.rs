pub mod distributor;
pub mod enricher;
pub mod index;
pub mod normalize;
pub mod outline;
pub mod parser;
pub mod topics;

pub use index::*;
