//! Named field identifiers.
//!
//! Every pipeline stage communicates through named point-data and cell-data
//! arrays. The spellings below are a wire contract shared with the
//! surrounding toolchain: downstream stages look fields up by name, so the
//! strings are fixed, not configurable.
//!
//! Using an enum instead of bare strings turns a typo'd lookup into a
//! compile error and an absent field into an explicit
//! [`MissingField`](crate::error::MapError::MissingField) error.

use std::fmt;
use std::str::FromStr;

/// A named attribute field.
///
/// The unit variants cover the fixed inter-stage contract; [`Field::Named`]
/// carries free-form payload scalars (e.g. wall shear stress from a CFD
/// solution) that ride along through mapping and patching untouched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Maximum inscribed sphere radius along the centerline.
    Radius,
    /// Marks centerline tracts lying inside a bifurcation region.
    Blanking,
    /// Branch identity shared by all tracts of a non-bifurcating sub-tree.
    GroupIds,
    /// Rotation-minimizing frame normals along the centerline.
    ParallelTransportNormals,
    /// Arc-length coordinate along each centerline path.
    Abscissas,
    /// Frenet frame tangent along the centerline.
    FrenetTangent,
    /// Frenet frame normal along the centerline.
    FrenetNormal,
    /// Position within a traced centerline path.
    TractIds,
    /// Identity of the individual traced centerline path.
    CenterlineIds,
    /// Normalized circumferential coordinate around a branch cross-section.
    AngularMetric,
    /// Longitudinal arc-length coordinate along a branch.
    AbscissaMetric,
    /// Position along an open boundary loop, anchored per bifurcation.
    BoundaryMetric,
    /// Laplace solution over the branch treated as a topological cylinder.
    HarmonicMapping,
    /// Harmonic coordinate rescaled to true arc-length units.
    StretchedMapping,
    /// Longitudinal patch bin index.
    Slab,
    /// Circumferential patch bin index.
    Sector,
    /// True (area-weighted) surface area of the containing patch.
    PatchArea,
    /// Free-form payload scalar carried through the pipeline.
    Named(String),
}

impl Field {
    /// The wire spelling of this field.
    pub fn as_str(&self) -> &str {
        match self {
            Field::Radius => "Radius",
            Field::Blanking => "Blanking",
            Field::GroupIds => "GroupIds",
            Field::ParallelTransportNormals => "ParallelTransportNormals",
            Field::Abscissas => "Abscissas",
            Field::FrenetTangent => "FrenetTangent",
            Field::FrenetNormal => "FrenetNormal",
            Field::TractIds => "TractIds",
            Field::CenterlineIds => "CenterlineIds",
            Field::AngularMetric => "AngularMetric",
            Field::AbscissaMetric => "AbscissaMetric",
            Field::BoundaryMetric => "BoundaryMetric",
            Field::HarmonicMapping => "HarmonicMapping",
            Field::StretchedMapping => "StretchedMapping",
            Field::Slab => "Slab",
            Field::Sector => "Sector",
            Field::PatchArea => "PatchArea",
            Field::Named(name) => name,
        }
    }

    /// Resolve a spelling to a field, mapping contract names to their unit
    /// variants and anything else to [`Field::Named`].
    pub fn from_name(name: &str) -> Field {
        match name {
            "Radius" => Field::Radius,
            "Blanking" => Field::Blanking,
            "GroupIds" => Field::GroupIds,
            "ParallelTransportNormals" => Field::ParallelTransportNormals,
            "Abscissas" => Field::Abscissas,
            "FrenetTangent" => Field::FrenetTangent,
            "FrenetNormal" => Field::FrenetNormal,
            "TractIds" => Field::TractIds,
            "CenterlineIds" => Field::CenterlineIds,
            "AngularMetric" => Field::AngularMetric,
            "AbscissaMetric" => Field::AbscissaMetric,
            "BoundaryMetric" => Field::BoundaryMetric,
            "HarmonicMapping" => Field::HarmonicMapping,
            "StretchedMapping" => Field::StretchedMapping,
            "Slab" => Field::Slab,
            "Sector" => Field::Sector,
            "PatchArea" => Field::PatchArea,
            other => Field::Named(other.to_string()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Field::from_name(s))
    }
}
