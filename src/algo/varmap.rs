//! Variable map extraction.
//!
//! Turns one raster layer into a dense matrix for downstream statistics:
//! rows are longitudinal slabs (row 0 proximal), columns circumferential
//! sectors (column 0 at the seam).

use nalgebra::DMatrix;

use crate::error::Result;
use crate::field::Field;
use crate::raster::PatchRaster;

/// Extract one variable of a patch raster as a `slabs × sectors` matrix.
///
/// # Errors
///
/// `MissingField` when the raster has no layer for `field`.
pub fn extract_variable_map(raster: &PatchRaster, field: &Field) -> Result<DMatrix<f64>> {
    let layer = raster.layer(field)?;
    Ok(DMatrix::from_row_slice(
        raster.slabs(),
        raster.sectors(),
        layer,
    ))
}
