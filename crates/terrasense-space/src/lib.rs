//! Coordinate references and the shared normalized frame.
//!
//! Every source declares a native [`CoordinateReference`]. The
//! [`SpatialIndex`] maps native coordinates onto a shared geographic
//! reference and from there onto the unit box used by every task, and
//! back again. The [`TimeAxis`] does the same for time offsets.
//!
//! # References
//!
//! - `Geographic`: latitude / longitude, identity onto the shared reference
//! - `Projected`: metres north / east of an origin
//! - `GridIndex`: fractional row / column of a regular grid
//!
//! [`CoordinateReference`]: terrasense_core::CoordinateReference

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod index;
pub mod reference;
pub mod time;

pub use error::SpaceError;
pub use index::SpatialIndex;
pub use reference::ReferenceTransform;
pub use time::TimeAxis;
