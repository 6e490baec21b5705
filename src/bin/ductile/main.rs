//! Ductile CLI - run ARAP edits on procedural meshes.
//!
//! Usage: ductile <COMMAND> [OPTIONS]
//!
//! Run `ductile --help` for available commands. Set `RUST_LOG=debug` to see
//! per-iteration solver output.

mod shapes;

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use nalgebra::Vector3;

use ductile::algo::arap::{AnchorPolicy, DeformOptions};
use ductile::algo::Progress;
use ductile::anim::AnimationFrame;
use ductile::mesh::{HalfEdgeMesh, VertexId};
use ductile::Document;

use shapes::Shape;

#[derive(Parser)]
#[command(name = "ductile")]
#[command(author, version, about = "As-rigid-as-possible mesh editing CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone, Copy)]
struct MeshArgs {
    /// Procedural mesh to edit
    #[arg(short, long, value_enum, default_value = "grid")]
    shape: Shape,

    /// Number of rows of the generated mesh
    #[arg(short, long, default_value = "8")]
    resolution: usize,
}

#[derive(clap::Args, Clone, Copy)]
struct SolverArgs {
    /// Maximum local/global iterations
    #[arg(short, long, default_value = "30")]
    iterations: usize,

    /// Convergence tolerance, relative to the bounding box diagonal
    #[arg(short, long, default_value = "1e-6")]
    tolerance: f64,

    /// Use single-threaded execution (for benchmarking)
    #[arg(long)]
    sequential: bool,
}

impl SolverArgs {
    fn options(self) -> DeformOptions {
        DeformOptions::default()
            .with_max_iterations(self.iterations)
            .with_tolerance(self.tolerance)
            .with_anchor(AnchorPolicy::Reject)
            .with_parallel(!self.sequential)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh and weight information
    Info {
        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Hold the bottom row, drag the top row and solve
    Deform {
        #[command(flatten)]
        mesh: MeshArgs,

        #[command(flatten)]
        solver: SolverArgs,

        /// Distance the top row is dragged
        #[arg(short, long, default_value = "0.5")]
        lift: f64,
    },

    /// Bake a drag of the top row into keyframes and sample the timeline
    Animate {
        #[command(flatten)]
        mesh: MeshArgs,

        #[command(flatten)]
        solver: SolverArgs,

        /// Distance the top row is dragged by the last frame
        #[arg(short, long, default_value = "0.5")]
        lift: f64,

        /// Number of frames
        #[arg(short, long, default_value = "8")]
        frames: usize,

        /// Timeline samples to print
        #[arg(long, default_value = "5")]
        samples: usize,
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
        Commands::Info { mesh } => cmd_info(mesh)?,
        Commands::Deform { mesh, solver, lift } => cmd_deform(mesh, solver, lift)?,
        Commands::Animate {
            mesh,
            solver,
            lift,
            frames,
            samples,
        } => cmd_animate(mesh, solver, lift, frames, samples)?,
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };
        if max_percent.fetch_max(percent, Ordering::Relaxed) >= percent && percent != 100 {
            return;
        }

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);
        eprint!("\r[{}{}] {:3}% {}", bar, space, percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

/// Mean and max relative change of edge lengths from the rest shape.
fn edge_distortion(mesh: &HalfEdgeMesh) -> (f64, f64) {
    let mut total = 0.0;
    let mut worst: f64 = 0.0;
    let mut count = 0usize;
    for e in mesh.edge_ids() {
        let (a, b) = mesh.edge_vertices(e);
        let rest = (mesh.rest_position(b) - mesh.rest_position(a)).norm();
        if rest <= 0.0 {
            continue;
        }
        let change = (mesh.edge_length(e) - rest).abs() / rest;
        total += change;
        worst = worst.max(change);
        count += 1;
    }
    if count == 0 {
        (0.0, 0.0)
    } else {
        (total / count as f64, worst)
    }
}

fn load(args: MeshArgs, options: DeformOptions) -> Result<(Document, Vec<usize>, Vec<usize>), Box<dyn std::error::Error>> {
    let generated = args.shape.build(args.resolution)?;
    let doc = Document::new(generated.mesh, options);
    println!(
        "Mesh: {:?} ({} vertices, {} faces)",
        args.shape,
        doc.mesh().num_vertices(),
        doc.mesh().num_faces()
    );
    Ok((doc, generated.bottom, generated.top))
}

fn cmd_info(args: MeshArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (doc, bottom, top) = load(args, DeformOptions::default())?;
    let mesh = doc.mesh();

    println!("Edges: {}", mesh.num_edges());
    println!("Half-edges: {}", mesh.num_halfedges());

    let total_area: f64 = mesh.face_ids().map(|f| mesh.face_area(f)).sum();
    println!("Surface area: {:.6}", total_area);

    if let Some((min, max)) = mesh.bounding_box() {
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
    }

    let boundary = mesh.vertex_ids().filter(|&v| mesh.is_boundary_vertex(v)).count();
    if boundary == 0 {
        println!("Topology: Closed (no boundary)");
    } else {
        println!("Topology: Open ({} boundary vertices)", boundary);
    }

    let stats = doc.weight_stats();
    println!(
        "Cotangent weights: min={:.4}, max={:.4}, mean={:.4}, negative={}",
        stats.min, stats.max, stats.mean, stats.negative
    );
    println!("Handle rows: {} held, {} dragged", bottom.len(), top.len());

    Ok(())
}

fn cmd_deform(args: MeshArgs, solver: SolverArgs, lift: f64) -> Result<(), Box<dyn std::error::Error>> {
    let (mut doc, bottom, top) = load(args, solver.options())?;
    let offset = args.shape.drag_axis() * lift;

    for &v in &bottom {
        doc.toggle_handle(VertexId::new(v))?;
    }
    for &v in &top {
        let target = doc.mesh().position(VertexId::new(v)) + offset;
        doc.set_handle_target(VertexId::new(v), target)?;
    }

    let mode = if solver.sequential { "sequential" } else { "parallel" };
    println!("Solving with {} handles ({})...", doc.constraints().len(), mode);

    let start = Instant::now();
    let report = doc.compute()?;
    let elapsed = start.elapsed();

    println!(
        "Iterations: {} (converged: {}, last step {:.3e})",
        report.iterations, report.converged, report.max_displacement
    );
    let (mean, worst) = edge_distortion(doc.mesh());
    println!("Edge length change: mean {:.3}%, max {:.3}%", mean * 100.0, worst * 100.0);
    println!("Solved in {:.2?}", elapsed);

    Ok(())
}

fn cmd_animate(
    args: MeshArgs,
    solver: SolverArgs,
    lift: f64,
    frame_count: usize,
    samples: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut doc, bottom, top) = load(args, solver.options())?;
    let axis = args.shape.drag_axis();

    let frames: Vec<AnimationFrame> = (1..=frame_count)
        .map(|k| {
            let step = axis * (lift * k as f64 / frame_count as f64);
            bottom
                .iter()
                .map(|&v| (VertexId::new(v), Vector3::zeros()))
                .chain(top.iter().map(|&v| (VertexId::new(v), step)))
                .collect()
        })
        .collect();

    println!("Baking {} frames...", frames.len());
    let start = Instant::now();
    let report = doc.ingest_animation(frames, &create_progress())?;
    println!(
        "Baked {} frames ({} iterations, {} unconverged) in {:.2?}",
        report.frames,
        report.iterations,
        report.unconverged,
        start.elapsed()
    );

    let Some((first, last)) = doc.time_range() else {
        return Ok(());
    };
    let probe = VertexId::new(top[top.len() / 2]);
    let count = samples.max(2);
    for s in 0..count {
        let t = first + (last - first) * s as f64 / (count - 1) as f64;
        doc.play(t)?;
        let (mean, _) = edge_distortion(doc.mesh());
        let p = doc.mesh().position(probe);
        println!(
            "t={:6.3}: probe ({:.4}, {:.4}, {:.4}), edge change {:.3}%",
            t,
            p.x,
            p.y,
            p.z,
            mean * 100.0
        );
    }

    Ok(())
}
