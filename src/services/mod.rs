//! Background services

pub mod auto_refresh;

pub use auto_refresh::{AutoRefreshConfig, AutoRefreshHandle, AutoRefreshService};
