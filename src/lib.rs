pub mod command;
pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod iupac;
pub mod method;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod progress;
pub mod session;
pub mod socket;
pub mod store;
pub mod wire;
