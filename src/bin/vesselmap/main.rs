//! Vesselmap CLI - branch mapping and patching command-line tool.
//!
//! Usage: vesselmap <COMMAND> [OPTIONS]
//!
//! Run `vesselmap --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use vesselmap::algo::Progress;
use vesselmap::field::Field;
use vesselmap::io;
use vesselmap::pipeline::{process_branches, PipelineOptions};

#[derive(Parser)]
#[command(name = "vesselmap")]
#[command(author, version, about = "Vascular surface mapping CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display surface or centerline information
    Info {
        /// Input polydata file
        input: PathBuf,

        /// Read the input as a centerline instead of a surface
        #[arg(long)]
        centerline: bool,
    },

    /// Map and patch every branch of a vessel surface
    Map {
        /// Input wall surface file
        surface: PathBuf,

        /// Input centerline file
        centerline: PathBuf,

        /// Output directory for per-branch results
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Longitudinal patch size, in surface units
        #[arg(short = 's', long, default_value = "1.0")]
        patch_size: f64,

        /// Number of circumferential sectors
        #[arg(short = 'n', long, default_value = "8")]
        sectors: usize,

        /// Only process these branch group ids (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        groups: Option<Vec<i64>>,

        /// Also export these variables as text tables (repeatable)
        #[arg(short = 'e', long = "export")]
        export: Vec<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input, centerline } => {
            cmd_info(&input, centerline)?;
        }

        Commands::Map {
            surface,
            centerline,
            output,
            patch_size,
            sectors,
            groups,
            export,
        } => {
            cmd_map(&surface, &centerline, &output, patch_size, sectors, groups, &export)?;
        }
    }

    Ok(())
}

fn cmd_info(input: &Path, centerline: bool) -> Result<(), Box<dyn std::error::Error>> {
    if centerline {
        let line = io::load_centerline(input)?;
        println!("Centerline: {}", input.display());
        println!("  Points: {}", line.num_points());
        println!("  Cells:  {}", line.num_cells());
        match line.branch_group_ids() {
            Ok(groups) => println!("  Branch groups: {groups:?}"),
            Err(_) => println!("  Branch groups: (no segmentation attributes)"),
        }
        print_fields("Point data", line.point_data().fields());
        print_fields("Cell data", line.cell_data().fields());
    } else {
        let surface = io::load_surface(input)?;
        println!("Surface: {}", input.display());
        println!("  Points:     {}", surface.num_points());
        println!("  Triangles:  {}", surface.num_triangles());
        println!("  Components: {}", surface.num_components());
        println!("  Area:       {:.4}", surface.surface_area());
        print_fields("Point data", surface.point_data().fields());
        print_fields("Cell data", surface.cell_data().fields());
    }
    Ok(())
}

fn print_fields<'a>(label: &str, fields: impl Iterator<Item = &'a Field>) {
    let names: Vec<&str> = fields.map(Field::as_str).collect();
    if names.is_empty() {
        println!("  {label}: (none)");
    } else {
        println!("  {label}: {}", names.join(", "));
    }
}

fn cmd_map(
    surface_path: &Path,
    centerline_path: &Path,
    output: &Path,
    patch_size: f64,
    sectors: usize,
    groups: Option<Vec<i64>>,
    export: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let surface = io::load_surface(surface_path)?;
    let centerline = io::load_centerline(centerline_path)?;
    std::fs::create_dir_all(output)?;

    let mut options = PipelineOptions {
        group_ids: groups,
        progress: terminal_progress(),
        ..Default::default()
    };
    options.patching.longitudinal_size = patch_size;
    options.patching.circumferential_sectors = sectors;

    let start = Instant::now();
    let result = process_branches(&surface, &centerline, &options)?;
    eprintln!();
    println!(
        "Processed {} branch(es) in {:.2}s ({} skipped)",
        result.branches.len(),
        start.elapsed().as_secs_f64(),
        result.failures.len()
    );
    for failure in &result.failures {
        println!("  skipped branch {}: {}", failure.group_id, failure.error);
    }

    io::save_surface(&result.overview, output.join("overview.vtk"))?;
    for branch in &result.branches {
        let stem = format!("branch_{}", branch.group_id);
        io::save_surface(&branch.surface, output.join(format!("{stem}.vtk")))?;

        for name in export {
            let field = Field::from_name(name);
            let table = output.join(format!("{stem}_{name}.dat"));
            io::raster::save_variable_map(&branch.raster, &field, &table)?;
        }
        println!(
            "  branch {}: {} x {} patches -> {stem}.vtk",
            branch.group_id,
            branch.raster.slabs(),
            branch.raster.sectors()
        );
    }
    Ok(())
}

/// Progress reporter that rewrites a single terminal line per branch.
fn terminal_progress() -> Progress {
    Progress::new(|current, total, message| {
        if total == 0 {
            return;
        }
        eprint!("\r[{current}/{total}] {message}        ");
        std::io::stderr().flush().ok();
    })
}
