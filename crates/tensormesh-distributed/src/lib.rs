//! TensorMesh Distributed - Collectives and Shard Resolution
//!
//! The communication layer the sharded linear layers are built on.
//!
//! # Features
//!
//! ## Collectives
//! - **CollectiveBackend**: the two-and-a-half operations the core
//!   actually consumes (all-reduce, broadcast, all-gather) plus a barrier,
//!   all blocking and barrier-style
//! - **ThreadBackend**: an in-process world whose collectives are real
//!   rendezvous, used by tests and single-host runs
//! - **CommGroup**: tensor-level wrapper, cloneable, lifetime-of-module
//!
//! ## Sharding
//! - **ShardSpec**: row/column partition of one axis with an explicit
//!   remainder policy (final shard absorbs it)
//! - **DeviceMesh**: binds specs to a group and validates shard counts
//!
//! This crate implements no network transport; it assumes the host
//! environment supplies a connected backend.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod comm_group;
pub mod error;
pub mod shard;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::{CollectiveBackend, ReduceOp, ThreadBackend};
pub use comm_group::CommGroup;
pub use error::{DistributedError, DistributedResult};
pub use shard::{DeviceMesh, ShardDim, ShardSpec};
