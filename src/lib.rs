pub mod classifier;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod schema;
pub mod store;
pub mod util;
pub mod view;
