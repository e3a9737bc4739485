pub mod config;
pub mod debounce;
pub mod error;
pub mod model;
pub mod observer;
pub mod remote;
pub mod storage;
pub mod task_store;
pub mod views;

pub use task_store::{ImportOutcome, LoadOutcome, StoreOptions, TaskStore};
