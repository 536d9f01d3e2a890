pub mod aggregate;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod dispatch;
pub mod parse;
pub mod report;
pub mod scan;
