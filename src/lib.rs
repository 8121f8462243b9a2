pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod media;
pub mod orchestrator;
pub mod report;
pub mod sampler;
pub mod util;
