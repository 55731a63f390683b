//! Client library for the NEXUS CRM backend.

pub mod api;
pub mod app;
pub mod cache;
pub mod contracts;
pub mod error;
pub mod inbox;
pub mod storage;
pub mod ticker;
pub mod utils;

pub use error::{Error, Result};
