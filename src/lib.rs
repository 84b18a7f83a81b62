pub mod batch;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod renderer;
pub mod report;
pub mod store;
pub mod util;
