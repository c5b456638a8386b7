//! Core mesh data structures.
//!
//! This module provides the face-vertex triangle surface used throughout the
//! pipeline, together with its typed attribute storage.
//!
//! # Overview
//!
//! The primary type is [`Surface`], a triangulated 2-manifold with boundary.
//! Named scalar/integer/vector arrays attach to its points or cells through
//! [`AttributeSet`]; pipeline stages append new arrays and downstream stages
//! look them up by [`Field`](crate::field::Field) with checked accessors.
//!
//! # Construction
//!
//! ```
//! use vesselmap::mesh::Surface;
//! use nalgebra::Point3;
//!
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let surface = Surface::new(points, vec![[0, 1, 2]]).unwrap();
//! assert_eq!(surface.num_triangles(), 1);
//! ```

mod attributes;
mod surface;

pub use attributes::{Attribute, AttributeSet};
pub use surface::Surface;
