//! # Affiliate Console Library
//!
//! Cursor-paginated, filterable, cached list views over the affiliate
//! dashboard REST API, plus the mutations that keep them consistent and a
//! terminal table/card presentation.

pub mod api;
pub mod cache;
pub mod config;
pub mod cursor;
pub mod error;
pub mod invalidation;
pub mod list;
pub mod models;
pub mod mutation;
pub mod page;
pub mod query;
pub mod session;
pub mod table;
pub mod telemetry;

pub use error::ClientError;
