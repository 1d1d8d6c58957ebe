//! Application services layered above the engine and database modules

pub mod cache;
pub mod ordering;
pub mod trigger;
pub mod weighting;
