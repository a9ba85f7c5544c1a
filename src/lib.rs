//! # Clustermap
//!
//! Redis Cluster topology model for operators and admin tooling: decode
//! `CLUSTER NODES` and `CLUSTER INFO` replies into a queryable collection
//! of nodes, reason about hash slots including ones being migrated, and
//! push configuration to every master or replica.
//!
//! ## Features
//!
//! - `json` - Serialize the model and [`cluster::ClusterSummary`] with serde
//! - `test-utils` - In-memory transports in [`testing`]
//!
//! ## Example
//!
//! ```no_run
//! use clustermap::cluster::{is_master_with_slots, Order};
//! use clustermap::AdminBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let admin = AdminBuilder::new().seeds("redis://127.0.0.1:7000").build().await?;
//!     let nodes = admin.get_topology().await?;
//!     for master in nodes.find_all(is_master_with_slots)?.sort_by_id(Order::Ascending) {
//!         println!("{} serves {} slots", master.id, master.total_slots());
//!     }
//!     admin.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod admin;
pub mod cluster;
pub mod core;
pub mod proto;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use crate::admin::Admin;
pub use crate::core::builder::{AdminBuilder, AdminConfig};
pub use crate::core::transport::{ClusterTransport, Transport};
pub use crate::proto::error::{Error, ParseError, Result};
