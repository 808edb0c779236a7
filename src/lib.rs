pub mod message;
pub mod archive;
pub mod config;
pub mod cleaning;
pub mod patterns;
pub mod links;
pub mod metrics;
pub mod parser;
pub mod temporal;
pub mod aggregate;
pub mod tables;
pub mod query;
pub mod source;
pub mod report;
