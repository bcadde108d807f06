pub mod auth;
pub mod batch;
pub mod config;
pub mod fetch;
pub mod graph;
pub mod output;
pub mod permissions;
pub mod report;
