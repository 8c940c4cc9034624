pub mod elevation;

pub use elevation::*;
