pub mod audit;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod git_sync;
pub mod lockfile;
pub mod model;
pub mod paths;
pub mod provider;
pub mod remote;
pub mod report;
pub mod sync_engine;
