//! Typed attribute storage for mesh and centerline data.
//!
//! An [`AttributeSet`] maps [`Field`] identifiers to typed arrays. Lookups
//! are checked: asking for a field that is absent, or stored under a
//! different array type, yields an explicit error instead of silently
//! propagating NaNs downstream.

use std::collections::BTreeMap;

use nalgebra::Vector3;

use crate::error::{MapError, Result};
use crate::field::Field;

/// A typed attribute array.
#[derive(Debug, Clone)]
pub enum Attribute {
    /// One `f64` per element.
    Scalars(Vec<f64>),
    /// One `i64` per element (group ids, tract ids, bin indices, flags).
    Integers(Vec<i64>),
    /// One 3-vector per element (frames, normals).
    Vectors(Vec<Vector3<f64>>),
}

impl Attribute {
    /// Number of elements in the array.
    pub fn len(&self) -> usize {
        match self {
            Attribute::Scalars(v) => v.len(),
            Attribute::Integers(v) => v.len(),
            Attribute::Vectors(v) => v.len(),
        }
    }

    /// True when the array is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn type_name(&self) -> &'static str {
        match self {
            Attribute::Scalars(_) => "scalar",
            Attribute::Integers(_) => "integer",
            Attribute::Vectors(_) => "vector",
        }
    }
}

/// An ordered collection of named, typed attribute arrays.
///
/// Attached either to the points or to the cells of a [`Surface`]
/// (crate::mesh::Surface) or [`Centerline`](crate::centerline::Centerline).
/// The `location` tag only affects error messages.
#[derive(Debug, Clone)]
pub struct AttributeSet {
    arrays: BTreeMap<Field, Attribute>,
    location: &'static str,
}

impl AttributeSet {
    /// Create an empty set attached to points.
    pub fn points() -> Self {
        Self {
            arrays: BTreeMap::new(),
            location: "point",
        }
    }

    /// Create an empty set attached to cells.
    pub fn cells() -> Self {
        Self {
            arrays: BTreeMap::new(),
            location: "cell",
        }
    }

    /// Number of stored arrays.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// True when no arrays are stored.
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// True when the field is present (any type).
    pub fn contains(&self, field: &Field) -> bool {
        self.arrays.contains_key(field)
    }

    /// Iterate over stored fields and arrays in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Attribute)> {
        self.arrays.iter()
    }

    /// Iterate over stored field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.arrays.keys()
    }

    /// Insert or replace a scalar array.
    pub fn set_scalars(&mut self, field: Field, values: Vec<f64>) {
        self.arrays.insert(field, Attribute::Scalars(values));
    }

    /// Insert or replace an integer array.
    pub fn set_integers(&mut self, field: Field, values: Vec<i64>) {
        self.arrays.insert(field, Attribute::Integers(values));
    }

    /// Insert or replace a vector array.
    pub fn set_vectors(&mut self, field: Field, values: Vec<Vector3<f64>>) {
        self.arrays.insert(field, Attribute::Vectors(values));
    }

    /// Remove a field, returning its array if present.
    pub fn remove(&mut self, field: &Field) -> Option<Attribute> {
        self.arrays.remove(field)
    }

    /// Get a field as raw [`Attribute`], failing if absent.
    pub fn get(&self, field: &Field) -> Result<&Attribute> {
        self.arrays.get(field).ok_or_else(|| MapError::MissingField {
            field: field.clone(),
            location: self.location,
        })
    }

    /// Get a scalar array, failing if absent or of another type.
    pub fn scalars(&self, field: &Field) -> Result<&[f64]> {
        match self.get(field)? {
            Attribute::Scalars(v) => Ok(v),
            other => Err(self.type_error(field, other, "scalar")),
        }
    }

    /// Get an integer array, failing if absent or of another type.
    pub fn integers(&self, field: &Field) -> Result<&[i64]> {
        match self.get(field)? {
            Attribute::Integers(v) => Ok(v),
            other => Err(self.type_error(field, other, "integer")),
        }
    }

    /// Get a vector array, failing if absent or of another type.
    pub fn vectors(&self, field: &Field) -> Result<&[Vector3<f64>]> {
        match self.get(field)? {
            Attribute::Vectors(v) => Ok(v),
            other => Err(self.type_error(field, other, "vector")),
        }
    }

    /// Check that every stored array has exactly `expected` elements.
    pub fn validate_len(&self, expected: usize) -> Result<()> {
        for (field, attr) in &self.arrays {
            if attr.len() != expected {
                return Err(MapError::FieldLength {
                    field: field.clone(),
                    len: attr.len(),
                    expected,
                    location: self.location,
                });
            }
        }
        Ok(())
    }

    /// Build a new set holding, for every array, only the elements selected
    /// by `indices` (in the given order). Used by splitting, where point and
    /// cell ids are not preserved.
    pub fn subset(&self, indices: &[usize]) -> AttributeSet {
        let mut out = AttributeSet {
            arrays: BTreeMap::new(),
            location: self.location,
        };
        for (field, attr) in &self.arrays {
            let taken = match attr {
                Attribute::Scalars(v) => {
                    Attribute::Scalars(indices.iter().map(|&i| v[i]).collect())
                }
                Attribute::Integers(v) => {
                    Attribute::Integers(indices.iter().map(|&i| v[i]).collect())
                }
                Attribute::Vectors(v) => {
                    Attribute::Vectors(indices.iter().map(|&i| v[i]).collect())
                }
            };
            out.arrays.insert(field.clone(), taken);
        }
        out
    }

    fn type_error(&self, field: &Field, actual: &Attribute, expected: &'static str) -> MapError {
        MapError::FieldType {
            field: field.clone(),
            actual: actual.type_name(),
            expected,
        }
    }
}
