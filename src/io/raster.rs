//! Plain-text export of variable maps.
//!
//! Writes one raster layer as a whitespace-separated table for spreadsheet
//! and plotting tools. The table is printed the way clinicians read the
//! flattened vessel: the proximal end at the bottom and the sector order
//! mirrored, so the file is the patch grid flipped both vertically and
//! horizontally relative to memory order.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::field::Field;
use crate::raster::PatchRaster;

/// Save one raster layer as a text table.
pub fn save_variable_map<P: AsRef<Path>>(
    raster: &PatchRaster,
    field: &Field,
    path: P,
) -> Result<()> {
    let table = render_variable_map(raster, field)?;
    std::fs::write(path, table)?;
    Ok(())
}

fn render_variable_map(raster: &PatchRaster, field: &Field) -> Result<String> {
    let layer = raster.layer(field)?;
    let mut out = String::new();
    for slab in (0..raster.slabs()).rev() {
        for sector in (0..raster.sectors()).rev() {
            if sector + 1 < raster.sectors() {
                out.push(' ');
            }
            let _ = write!(out, "{:.3}", layer[raster.patch_index(slab, sector)]);
        }
        out.push('\n');
    }
    Ok(out)
}
