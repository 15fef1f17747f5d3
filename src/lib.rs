pub mod config;
pub mod dataset;
pub mod engine;
pub mod feed;
pub mod pipeline;
