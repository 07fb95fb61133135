//! Client library for the CaixaHub personal finance backend.
//!
//! Covers authentication, banking data with cached stores, connection sync
//! polling, subscription usage and the bank-connection widget events.

pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod services;
pub mod stores;
pub mod sync;
pub mod usage;
pub mod widget;

pub use error::{ApiError, ErrorKind};
pub use http::{ClientSettings, HttpClient};
pub use sync::{PollSettings, SyncPoller, SyncStatus};
