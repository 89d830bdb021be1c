use clap::Parser;
use rust_python_split_systems::fit::{induced_distances, max_residual};
use rust_python_split_systems::io::{read_matrix_tsv, write_matrix_tsv, write_splits_file};
use rust_python_split_systems::matrix::{ASYMMETRY_TOLERANCE, SymmetricMatrix, asymmetry};
use rust_python_split_systems::pipeline::{AnalysisOptions, analyze_matrix};
use rust_python_split_systems::progress::NoProgress;
use std::path::PathBuf;
use std::time::Instant;

/// Compute the split decomposition of a labeled distance matrix (TSV),
/// classify the resulting split system and write it in extended Newick form.
#[derive(Parser, Debug)]
#[command(name = "split-decompose", version, about = "Split decomposition of a distance matrix")]
struct Args {
    /// Path to the TSV distance matrix (`.gz` accepted, `-` for stdin)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output path for the split system (`-` for stdout)
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: PathBuf,

    /// Also write the distances induced by the splits as a TSV matrix
    #[arg(long = "induced")]
    induced: Option<PathBuf>,

    /// Seed for the circular ordering search
    #[arg(long = "seed", default_value_t = 42)]
    seed: u64,

    /// Annealing moves per chain
    #[arg(long = "iterations", default_value_t = 20_000)]
    iterations: usize,

    /// Independent annealing chains run in parallel
    #[arg(long = "chains", default_value_t = 4)]
    chains: usize,

    /// Isolation indices at or below this are treated as zero
    #[arg(long = "tolerance", default_value_t = 1e-7)]
    tolerance: f64,

    /// Quiet mode: suppresses progress messages
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();
    // Progress goes to stderr when the split system itself goes to stdout.
    let show = !args.quiet;
    let to_stderr = args.output.as_os_str() == "-";

    let t0 = Instant::now();
    let (names, rows) = match read_matrix_tsv(&args.input) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Failed to read {:?}: {e}", args.input);
            std::process::exit(2);
        }
    };
    let read_s = t0.elapsed().as_secs_f64();
    log_if(show, to_stderr, format!("Read {} taxa in {read_s:.3}s", names.len()));

    let skew = asymmetry(&rows);
    if skew > ASYMMETRY_TOLERANCE {
        log_if(show, to_stderr, format!("Warning: matrix is asymmetric (max |d(i,j) - d(j,i)| = {skew}), averaging"));
    }

    let distances = match SymmetricMatrix::from_rows(&rows) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Invalid distance matrix {:?}: {e}", args.input);
            std::process::exit(3);
        }
    };

    let mut options = AnalysisOptions::default();
    options.decomposition.isolation_tolerance = args.tolerance;
    options.classifier.budget = options
        .classifier
        .budget
        .with_seed(args.seed)
        .with_iterations(args.iterations)
        .with_chains(args.chains);

    let t1 = Instant::now();
    let system = match analyze_matrix(&distances, &options, &mut NoProgress) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Split decomposition failed: {e}");
            std::process::exit(3);
        }
    };
    let comp_s = t1.elapsed().as_secs_f64();
    log_if(show, to_stderr, format!("Computed {} splits in {comp_s:.3}s", system.len()));
    log_if(show, to_stderr, format!("Split system is {}", system.compatibility()));
    if let Some(fit) = system.fit() {
        log_if(show, to_stderr, format!("Fit {fit:.2}%"));
    }
    if let Some((i, j, residual)) = max_residual(system.splits(), &distances) {
        let (a, b) = (&names[i - 1], &names[j - 1]);
        log_if(show, to_stderr, format!("Largest residual {residual} between {a} and {b}"));
    }

    let t2 = Instant::now();
    if let Err(e) = write_splits_file(&args.output, &system, Some(&names)) {
        eprintln!("Failed to write output {:?}: {e}", args.output);
        std::process::exit(4);
    }
    if let Some(path) = &args.induced {
        let induced = induced_distances(system.splits(), system.ntax());
        if let Err(e) = write_matrix_tsv(path, &names, &induced) {
            eprintln!("Failed to write induced distances {path:?}: {e}");
            std::process::exit(4);
        }
    }
    let write_s = t2.elapsed().as_secs_f64();
    log_if(show, to_stderr, format!("Writing output {write_s:.3}s"));
}

fn log_if(show: bool, to_stderr: bool, msg: String) {
    if !show {
        return;
    }
    if to_stderr {
        eprintln!("{msg}");
    } else {
        println!("{msg}");
    }
}
