//! Geometry and raster file I/O.
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | Legacy VTK polydata | `.vtk` | ✓ | ✓ | ASCII only, full attributes |
//! | Variable map table | `.dat`, `.txt` | ✗ | ✓ | One raster layer as text |
//!
//! [`load_surface`], [`load_centerline`], [`save_surface`] and
//! [`save_centerline`] detect the format from the file extension;
//! format-specific functions live in the submodules.

pub mod raster;
pub mod vtk;

use std::path::Path;

use crate::centerline::Centerline;
use crate::error::{MapError, Result};
use crate::mesh::Surface;

/// Supported geometry file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Legacy ASCII VTK polydata.
    Vtk,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "vtk" => Some(Format::Vtk),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn detect<P: AsRef<Path>>(path: P) -> Result<Format> {
    let path = path.as_ref();
    Format::from_path(path).ok_or_else(|| MapError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a surface with automatic format detection.
pub fn load_surface<P: AsRef<Path>>(path: P) -> Result<Surface> {
    match detect(&path)? {
        Format::Vtk => vtk::load_surface(path),
    }
}

/// Load a centerline with automatic format detection.
pub fn load_centerline<P: AsRef<Path>>(path: P) -> Result<Centerline> {
    match detect(&path)? {
        Format::Vtk => vtk::load_centerline(path),
    }
}

/// Save a surface with automatic format detection.
pub fn save_surface<P: AsRef<Path>>(surface: &Surface, path: P) -> Result<()> {
    match detect(&path)? {
        Format::Vtk => vtk::save_surface(surface, path),
    }
}

/// Save a centerline with automatic format detection.
pub fn save_centerline<P: AsRef<Path>>(centerline: &Centerline, path: P) -> Result<()> {
    match detect(&path)? {
        Format::Vtk => vtk::save_centerline(centerline, path),
    }
}
