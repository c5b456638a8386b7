//! Rectangular patch raster.
//!
//! The patching stage discretizes a mapped branch into `slabs × sectors`
//! quadrilateral patches: slabs along the stretched longitudinal coordinate,
//! sectors around the circumference. A [`PatchRaster`] holds one scalar
//! value per patch and per variable, in slab-major order (slab 0 is the
//! proximal end, sector 0 starts at the circumferential seam).

use std::collections::BTreeMap;

use crate::error::{MapError, Result};
use crate::field::Field;

/// Per-patch scalar layers over a fixed `slabs × sectors` grid.
#[derive(Debug, Clone)]
pub struct PatchRaster {
    slabs: usize,
    sectors: usize,
    layers: BTreeMap<Field, Vec<f64>>,
}

impl PatchRaster {
    /// Create an empty raster over a `slabs × sectors` grid.
    pub fn new(slabs: usize, sectors: usize) -> Self {
        Self {
            slabs,
            sectors,
            layers: BTreeMap::new(),
        }
    }

    /// Number of longitudinal slabs.
    #[inline]
    pub fn slabs(&self) -> usize {
        self.slabs
    }

    /// Number of circumferential sectors.
    #[inline]
    pub fn sectors(&self) -> usize {
        self.sectors
    }

    /// Number of patches.
    #[inline]
    pub fn num_patches(&self) -> usize {
        self.slabs * self.sectors
    }

    /// Flat index of a patch in slab-major order.
    #[inline]
    pub fn patch_index(&self, slab: usize, sector: usize) -> usize {
        debug_assert!(slab < self.slabs && sector < self.sectors);
        slab * self.sectors + sector
    }

    /// Store a layer. The vector must have one value per patch.
    pub fn set_layer(&mut self, field: Field, values: Vec<f64>) -> Result<()> {
        if values.len() != self.num_patches() {
            return Err(MapError::FieldLength {
                field,
                len: values.len(),
                expected: self.num_patches(),
                location: "patch",
            });
        }
        self.layers.insert(field, values);
        Ok(())
    }

    /// A layer's values in slab-major order.
    pub fn layer(&self, field: &Field) -> Result<&[f64]> {
        self.layers
            .get(field)
            .map(Vec::as_slice)
            .ok_or_else(|| MapError::MissingField {
                field: field.clone(),
                location: "patch",
            })
    }

    /// True when the raster carries a layer for `field`.
    pub fn contains(&self, field: &Field) -> bool {
        self.layers.contains_key(field)
    }

    /// Fields of the stored layers, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.layers.keys()
    }

    /// One patch value of one layer.
    pub fn value(&self, field: &Field, slab: usize, sector: usize) -> Result<f64> {
        Ok(self.layer(field)?[self.patch_index(slab, sector)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_round_trip() {
        let mut raster = PatchRaster::new(3, 2);
        raster
            .set_layer(Field::PatchArea, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        assert_eq!(raster.value(&Field::PatchArea, 0, 0).unwrap(), 1.0);
        assert_eq!(raster.value(&Field::PatchArea, 2, 1).unwrap(), 6.0);
        assert!(raster.contains(&Field::PatchArea));
        assert_eq!(raster.fields().count(), 1);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut raster = PatchRaster::new(2, 2);
        let err = raster
            .set_layer(Field::PatchArea, vec![0.0; 3])
            .unwrap_err();
        assert!(matches!(err, MapError::FieldLength { .. }));
    }

    #[test]
    fn test_missing_layer() {
        let raster = PatchRaster::new(1, 1);
        let err = raster.layer(&Field::PatchArea).unwrap_err();
        assert!(matches!(err, MapError::MissingField { .. }));
    }
}
