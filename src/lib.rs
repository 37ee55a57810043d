//! subsync - master/client replication of subscription credentials and topology
//!
//! This crate provides:
//! - A master node holding the authoritative credential and node stores
//! - Client nodes serving reads from a TTL-bounded, pull-based snapshot cache
//! - Short-lived HS256 inter-node tokens authenticating every pull
//! - Admin mutations gated by a static API key
//! - redb embedded database (ACID, MVCC, crash-safe)
//! - REST API

pub mod admin;
pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use std::sync::Arc;

use cluster::NodeBehavior;

/// Shared application state
pub struct AppState {
    pub node: Arc<dyn NodeBehavior>,
}
