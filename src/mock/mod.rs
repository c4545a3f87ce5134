//! Synthetic backend: generated cluster data kept "live" by a periodic
//! refresher, plus the fixed menu and OAuth catalogs.

pub mod catalog;
pub mod generate;
mod store;

pub use store::{DataStore, RefreshHandle, Snapshot};
