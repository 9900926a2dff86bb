pub mod config;
pub mod constants;
pub mod engine;
pub mod grid;
pub mod rng;
pub mod types;
