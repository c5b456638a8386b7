//! Legacy ASCII VTK polydata support.
//!
//! Surfaces are stored as `POLYGONS` polydata, centerlines as `LINES`
//! polydata. Point and cell attributes map to `SCALARS` (type `long` for
//! integer arrays, `double` for scalar arrays) and `VECTORS` sections, so
//! files written here round-trip through the usual VTK toolchain.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::centerline::Centerline;
use crate::error::{MapError, Result};
use crate::field::Field;
use crate::mesh::{Attribute, AttributeSet, Surface};

/// Load a surface from a legacy ASCII VTK polydata file.
pub fn load_surface<P: AsRef<Path>>(path: P) -> Result<Surface> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    parse_surface(&source).map_err(|message| MapError::LoadError {
        path: path.to_path_buf(),
        message,
    })
}

/// Load a centerline from a legacy ASCII VTK polydata file.
pub fn load_centerline<P: AsRef<Path>>(path: P) -> Result<Centerline> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    parse_centerline(&source).map_err(|message| MapError::LoadError {
        path: path.to_path_buf(),
        message,
    })
}

/// Save a surface as legacy ASCII VTK polydata.
pub fn save_surface<P: AsRef<Path>>(surface: &Surface, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    write_header(&mut w, "vesselmap surface")?;
    write_points(&mut w, surface.points())?;

    writeln!(
        w,
        "POLYGONS {} {}",
        surface.num_triangles(),
        surface.num_triangles() * 4
    )?;
    for tri in surface.triangles() {
        writeln!(w, "3 {} {} {}", tri[0], tri[1], tri[2])?;
    }

    write_attributes(&mut w, "POINT_DATA", surface.num_points(), surface.point_data())?;
    write_attributes(&mut w, "CELL_DATA", surface.num_triangles(), surface.cell_data())?;
    w.flush()?;
    Ok(())
}

/// Save a centerline as legacy ASCII VTK polydata.
pub fn save_centerline<P: AsRef<Path>>(centerline: &Centerline, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    write_header(&mut w, "vesselmap centerline")?;
    write_points(&mut w, centerline.points())?;

    let size: usize = centerline.cells().iter().map(|c| c.len() + 1).sum();
    writeln!(w, "LINES {} {}", centerline.num_cells(), size)?;
    for cell in centerline.cells() {
        write!(w, "{}", cell.len())?;
        for &p in cell {
            write!(w, " {p}")?;
        }
        writeln!(w)?;
    }

    write_attributes(&mut w, "POINT_DATA", centerline.num_points(), centerline.point_data())?;
    write_attributes(&mut w, "CELL_DATA", centerline.num_cells(), centerline.cell_data())?;
    w.flush()?;
    Ok(())
}

fn write_header<W: Write>(w: &mut W, title: &str) -> Result<()> {
    writeln!(w, "# vtk DataFile Version 3.0")?;
    writeln!(w, "{title}")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET POLYDATA")?;
    Ok(())
}

fn write_points<W: Write>(w: &mut W, points: &[Point3<f64>]) -> Result<()> {
    writeln!(w, "POINTS {} double", points.len())?;
    for p in points {
        writeln!(w, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

fn write_attributes<W: Write>(
    w: &mut W,
    section: &str,
    count: usize,
    data: &AttributeSet,
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    writeln!(w, "{section} {count}")?;
    for (field, attr) in data.iter() {
        match attr {
            Attribute::Scalars(values) => {
                writeln!(w, "SCALARS {field} double 1")?;
                writeln!(w, "LOOKUP_TABLE default")?;
                for v in values {
                    writeln!(w, "{v}")?;
                }
            }
            Attribute::Integers(values) => {
                writeln!(w, "SCALARS {field} long 1")?;
                writeln!(w, "LOOKUP_TABLE default")?;
                for v in values {
                    writeln!(w, "{v}")?;
                }
            }
            Attribute::Vectors(values) => {
                writeln!(w, "VECTORS {field} double")?;
                for v in values {
                    writeln!(w, "{} {} {}", v.x, v.y, v.z)?;
                }
            }
        }
    }
    Ok(())
}

// ==================== Parsing ====================

/// Whitespace token cursor over the file body. VTK allows values to wrap
/// lines freely, so parsing works on tokens, not lines.
struct Cursor<'a> {
    tokens: std::str::SplitWhitespace<'a>,
    peeked: Option<&'a str>,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            tokens: source.split_whitespace(),
            peeked: None,
        }
    }

    fn next(&mut self) -> Option<&'a str> {
        self.peeked.take().or_else(|| self.tokens.next())
    }

    fn peek(&mut self) -> Option<&'a str> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next();
        }
        self.peeked
    }

    fn expect(&mut self, what: &str) -> std::result::Result<&'a str, String> {
        self.next().ok_or_else(|| format!("unexpected end of file, expected {what}"))
    }

    fn parse<T: std::str::FromStr>(&mut self, what: &str) -> std::result::Result<T, String> {
        let token = self.expect(what)?;
        token
            .parse()
            .map_err(|_| format!("invalid {what}: '{token}'"))
    }
}

struct PolyData {
    points: Vec<Point3<f64>>,
    polygons: Vec<[usize; 3]>,
    lines: Vec<Vec<usize>>,
    point_data: AttributeSet,
    cell_data: AttributeSet,
}

fn parse_surface(source: &str) -> std::result::Result<Surface, String> {
    let data = parse_polydata(source)?;
    if data.polygons.is_empty() {
        return Err("polydata has no POLYGONS section".to_string());
    }
    let mut surface =
        Surface::new(data.points, data.polygons).map_err(|e| e.to_string())?;
    *surface.point_data_mut() = data.point_data;
    *surface.cell_data_mut() = data.cell_data;
    surface.validate().map_err(|e| e.to_string())?;
    Ok(surface)
}

fn parse_centerline(source: &str) -> std::result::Result<Centerline, String> {
    let data = parse_polydata(source)?;
    if data.lines.is_empty() {
        return Err("polydata has no LINES section".to_string());
    }
    let mut line = Centerline::new(data.points, data.lines).map_err(|e| e.to_string())?;
    *line.point_data_mut() = data.point_data;
    *line.cell_data_mut() = data.cell_data;
    Ok(line)
}

fn parse_polydata(source: &str) -> std::result::Result<PolyData, String> {
    // Header: magic line, free-text title line, then token structure.
    if !source.starts_with("# vtk DataFile") {
        return Err("not a VTK data file".to_string());
    }
    let mut body = source;
    for what in ["magic line", "title line"] {
        let eol = body.find('\n').ok_or_else(|| format!("missing {what}"))?;
        body = &body[eol + 1..];
    }

    let mut cursor = Cursor::new(body);
    match cursor.expect("encoding")? {
        "ASCII" => {}
        other => return Err(format!("unsupported encoding '{other}', expected ASCII")),
    }
    match (cursor.expect("DATASET")?, cursor.expect("dataset type")?) {
        ("DATASET", "POLYDATA") => {}
        (_, other) => return Err(format!("unsupported dataset type '{other}'")),
    }

    let mut data = PolyData {
        points: Vec::new(),
        polygons: Vec::new(),
        lines: Vec::new(),
        point_data: AttributeSet::points(),
        cell_data: AttributeSet::cells(),
    };

    enum Section {
        Geometry,
        PointData(usize),
        CellData(usize),
    }
    let mut section = Section::Geometry;

    while let Some(keyword) = cursor.next() {
        match keyword {
            "POINTS" => {
                let n: usize = cursor.parse("point count")?;
                let _dtype = cursor.expect("point type")?;
                data.points.reserve(n);
                for _ in 0..n {
                    let x: f64 = cursor.parse("point coordinate")?;
                    let y: f64 = cursor.parse("point coordinate")?;
                    let z: f64 = cursor.parse("point coordinate")?;
                    data.points.push(Point3::new(x, y, z));
                }
            }
            "POLYGONS" => {
                let n: usize = cursor.parse("polygon count")?;
                let _size: usize = cursor.parse("polygon list size")?;
                for _ in 0..n {
                    let arity: usize = cursor.parse("polygon arity")?;
                    let mut poly = Vec::with_capacity(arity);
                    for _ in 0..arity {
                        poly.push(cursor.parse::<usize>("polygon index")?);
                    }
                    // Fan-triangulate anything beyond a triangle.
                    for i in 1..poly.len().saturating_sub(1) {
                        data.polygons.push([poly[0], poly[i], poly[i + 1]]);
                    }
                }
            }
            "LINES" => {
                let n: usize = cursor.parse("line count")?;
                let _size: usize = cursor.parse("line list size")?;
                for _ in 0..n {
                    let arity: usize = cursor.parse("line arity")?;
                    let mut cell = Vec::with_capacity(arity);
                    for _ in 0..arity {
                        cell.push(cursor.parse::<usize>("line index")?);
                    }
                    data.lines.push(cell);
                }
            }
            "POINT_DATA" => {
                let n: usize = cursor.parse("point data count")?;
                section = Section::PointData(n);
            }
            "CELL_DATA" => {
                let n: usize = cursor.parse("cell data count")?;
                section = Section::CellData(n);
            }
            "SCALARS" | "VECTORS" => {
                let (count, set) = match &section {
                    Section::PointData(n) => (*n, &mut data.point_data),
                    Section::CellData(n) => (*n, &mut data.cell_data),
                    Section::Geometry => {
                        return Err(format!("{keyword} outside POINT_DATA/CELL_DATA"))
                    }
                };
                parse_attribute(&mut cursor, keyword, count, set)?;
            }
            // Attribute kinds we carry no structure for are skipped by
            // letting their value tokens fall through the keyword loop.
            "LOOKUP_TABLE" => {
                let _name = cursor.expect("lookup table name")?;
            }
            other if other.parse::<f64>().is_ok() => {}
            other => {
                return Err(format!("unsupported keyword '{other}'"));
            }
        }
    }
    Ok(data)
}

fn parse_attribute(
    cursor: &mut Cursor<'_>,
    kind: &str,
    count: usize,
    set: &mut AttributeSet,
) -> std::result::Result<(), String> {
    let name = cursor.expect("attribute name")?;
    let dtype = cursor.expect("attribute type")?;
    let field = Field::from_name(name);

    if kind == "VECTORS" {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let x: f64 = cursor.parse("vector component")?;
            let y: f64 = cursor.parse("vector component")?;
            let z: f64 = cursor.parse("vector component")?;
            values.push(Vector3::new(x, y, z));
        }
        set.set_vectors(field, values);
        return Ok(());
    }

    // SCALARS: optional component count (1 to 4 per the format), then a
    // LOOKUP_TABLE line. Only single-component arrays have a home here.
    if let Some(token) = cursor.peek() {
        if let Ok(ncomp) = token.parse::<usize>() {
            if (1..=4).contains(&ncomp) {
                cursor.next();
                if ncomp != 1 {
                    return Err(format!(
                        "SCALARS {name} has {ncomp} components, expected 1"
                    ));
                }
            }
        }
    }
    if cursor.peek() == Some("LOOKUP_TABLE") {
        cursor.next();
        cursor.expect("lookup table name")?;
    }

    let integer = matches!(dtype, "int" | "long" | "short" | "char" | "vtkIdType" | "bit");
    if integer {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(cursor.parse::<i64>("integer value")?);
        }
        set.set_integers(field, values);
    } else {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(cursor.parse::<f64>("scalar value")?);
        }
        set.set_scalars(field, values);
    }
    Ok(())
}
