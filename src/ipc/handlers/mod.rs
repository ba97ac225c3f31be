pub mod analytics;
pub mod core;
pub mod datasets;
pub mod matching;
