// Library root: scoring, evaluation, ranking, and the jobs that drive them.
// The binary and the integration tests reach everything through here.

pub mod config;
pub mod db;
pub mod error;
pub mod evaluation;
pub mod jobs;
pub mod model;
pub mod ranking;
pub mod scoring;
pub mod store;
pub mod triggers;
