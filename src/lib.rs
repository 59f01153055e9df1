//! # Step Battle
//!
//! Backend for a prefecture-vs-prefecture step count competition.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (prefectures, reports, user records, tiers)
//! - **calculate**: Aggregation and ranking engine
//! - **storage**: Record stores (in-memory, JSONL log)
//! - **standings**: Service binding the engine to a store
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation
//! - **client**: HTTP client for a running server

pub mod api;
pub mod calculate;
pub mod client;
pub mod config;
pub mod models;
pub mod standings;
pub mod storage;

pub use models::*;
