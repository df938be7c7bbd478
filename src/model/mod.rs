//! # Property Graph Model
//!
//! Stored-graph DTOs: what a backend holds after an upsert.
//! These types cross the storage boundary and are what tests inspect.
//!
//! This module is pure data with no I/O.

pub mod node;
pub mod edge;
pub mod value;
pub mod property_map;

pub use node::{Node, NodeId};
pub use edge::{Edge, EdgeId, Direction};
pub use value::Value;
pub use property_map::{PropertyMap, props};
