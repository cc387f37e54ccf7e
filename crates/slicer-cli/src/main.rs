//! Command-line front end for the slicing kernel: reads an indexed
//! triangle mesh from JSON, builds its spatial index, slices it into
//! layers, and writes the result back out as JSON.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use slicer_core::{AABBTree, CancellationToken, GapClosingConfig, IndexedMesh, Slicer};

/// Slice a triangle mesh into layer contours.
#[derive(Parser, Debug)]
#[command(name = "slice")]
#[command(about = "Slices an indexed triangle mesh into layer contours")]
struct Args {
    /// Path to the input mesh, serialized as JSON.
    #[arg(short, long)]
    input: PathBuf,

    /// Layer height in millimeters.
    #[arg(short = 'H', long)]
    layer_height: f32,

    /// Path to write the slice result, serialized as JSON.
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum contour gap to bridge, in millimeters.
    #[arg(long, default_value_t = 2.0)]
    max_gap_mm: f32,

    /// Maximum angular deflection a bridged gap may introduce, in degrees.
    #[arg(long, default_value_t = 45.0)]
    max_angle_deg: f32,

    /// Disable gap closing entirely; unclosed rings are discarded.
    #[arg(long)]
    no_gap_closing: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let input_json = fs::read_to_string(&args.input)?;
    let mesh: IndexedMesh = serde_json::from_str(&input_json)?;

    info!(
        input = %args.input.display(),
        vertices = mesh.vertices().len(),
        triangles = mesh.triangle_count(),
        "loaded mesh"
    );

    let tree = AABBTree::build(&mesh, None)?;
    let gap_config = GapClosingConfig {
        max_gap_mm: args.max_gap_mm,
        max_angle_deg: args.max_angle_deg,
        enable: !args.no_gap_closing,
    };

    let slicer = Slicer::new(&mesh, &tree, gap_config);
    let cancel = CancellationToken::new();
    let result = slicer.slice(args.layer_height, Some(&cancel))?;

    info!(
        layers = result.layers.len(),
        completion = result.statistics.polygon_completion_rate,
        "slicing complete"
    );

    let output_json = serde_json::to_string_pretty(&result)?;
    fs::write(&args.output, output_json)?;

    Ok(())
}
