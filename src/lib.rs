pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod entity;
pub mod fetch;
pub mod output;
pub mod pagination;
pub mod query;
pub mod runner;
pub mod session;
pub mod stats;
pub mod utils;

#[cfg(test)]
mod tests;
