//! # tidewater-core
//!
//! Core types shared by every Tidewater crate: the error type, the `Result`
//! alias with its extension trait, resource identifiers and image references.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![forbid(clippy::expect_used)]

pub mod error;
pub mod image;
pub mod resource_id;
pub mod result;

pub use error::Error;
pub use image::ImageRef;
pub use resource_id::{CLUSTER_SCOPE, ResourceId};
pub use result::{Result, ResultExt};
