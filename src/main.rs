use gofront::{
    analysis::diagnostic::Severity,
    diagnostics::{emit_diagnostics, emit_error},
    Analysis, AnalysisOptions,
};
use std::{env, path::PathBuf, process};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: gofront [-v|-vv] [--rename NAME] [--config FILE] <package-dir>";

struct Args {
    dir: PathBuf,
    verbosity: u8,
    options: AnalysisOptions,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut dir = None;
    let mut verbosity = 0;
    let mut options = AnalysisOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" => verbosity += 1,
            "-vv" => verbosity += 2,
            "--rename" => {
                options.rename = Some(args.next().ok_or("--rename needs a name")?);
            }
            "--config" => {
                options.config = Some(args.next().ok_or("--config needs a path")?.into());
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with('-') => return Err(format!("unknown flag {flag}")),
            _ if dir.is_some() => return Err("only one package directory is accepted".into()),
            _ => dir = Some(PathBuf::from(arg)),
        }
    }
    Ok(Args {
        dir: dir.ok_or("missing package directory")?,
        verbosity,
        options,
    })
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("GOFRONT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn print_summary(analysis: &Analysis) {
    println!("package {}", analysis.unit.emit_name());
    if !analysis.dependencies.is_empty() {
        println!("dependencies: {}", analysis.dependencies.join(", "));
    }
    println!("emission order:");
    for name in analysis.emission_order() {
        println!("  {name}");
    }
    let work = &analysis.worklists;
    println!(
        "temps {}, multi-returns {}, assignments {}, goroutines {}, channel ops {}, closures {}, defers {}, globals {}",
        work.temp_count(),
        work.multi_returns.len(),
        work.kv_pairs.len(),
        work.goroutines.len(),
        work.chan_ops.len(),
        work.closures.len(),
        work.defers.len(),
        work.globals.len(),
    );
    println!("diagnostics: {}", analysis.diagnostics.len());
}

fn main() {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            if message != USAGE {
                eprintln!("{USAGE}");
            }
            process::exit(2);
        }
    };
    init_logging(args.verbosity);

    match Analysis::run(&args.dir, &args.options) {
        Ok(analysis) => {
            let min = if args.verbosity > 0 {
                Severity::Info
            } else {
                Severity::Warning
            };
            emit_diagnostics(&analysis, min);
            print_summary(&analysis);
        }
        Err(error) => {
            emit_error(error);
            process::exit(1);
        }
    }
}
