pub mod aggregate;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fallback;
pub mod fs_util;
pub mod gtdb;
pub mod output;
pub mod profile;
pub mod resolve;
pub mod taxonomy;
