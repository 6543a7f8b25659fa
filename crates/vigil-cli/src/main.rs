//! Vigil compiler CLI.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};

use vigil_compiler::lower::LoweringFailure;
use vigil_compiler::manifest::RoutingManifest;
use vigil_compiler::{Compiler, CompilerConfig};

mod ui;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil compiler - lowers monitor declarations to Rust")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile source trees to Rust modules
    Compile {
        /// Directory of JSON source trees
        #[arg(short, long, default_value = "monitors")]
        input: PathBuf,

        /// Output directory for generated Rust code
        #[arg(short, long, default_value = "src/generated")]
        output: PathBuf,

        /// Package for source trees that declare none
        #[arg(short, long)]
        package: Option<String>,

        /// Do not write the routing manifest
        #[arg(long)]
        no_manifest: bool,

        /// Skip structural validation
        #[arg(long)]
        skip_validation: bool,
    },

    /// Validate and lower source trees without writing anything
    Check {
        /// Directory of JSON source trees
        #[arg(short, long, default_value = "monitors")]
        input: PathBuf,

        /// Package for source trees that declare none
        #[arg(short, long)]
        package: Option<String>,
    },

    /// Watch source trees and recompile on change
    Watch {
        /// Directory of JSON source trees
        #[arg(short, long, default_value = "monitors")]
        input: PathBuf,

        /// Output directory for generated Rust code
        #[arg(short, long, default_value = "src/generated")]
        output: PathBuf,

        /// Package for source trees that declare none
        #[arg(short, long)]
        package: Option<String>,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            package,
            no_manifest,
            skip_validation,
        } => {
            let config = CompilerConfig {
                input_dir: input,
                out_dir: output,
                package,
                skip_validation,
                emit_manifest: !no_manifest,
            };
            compile(config).await?;
        }

        Commands::Check { input, package } => {
            let config = CompilerConfig {
                input_dir: input,
                out_dir: PathBuf::new(),
                package,
                ..CompilerConfig::default()
            };
            check(config).await?;
        }

        Commands::Watch {
            input,
            output,
            package,
        } => {
            let config = CompilerConfig {
                input_dir: input,
                out_dir: output,
                package,
                ..CompilerConfig::default()
            };
            run_watch_mode(config).await?;
        }
    }

    Ok(())
}

/// Compile source trees and print a summary.
async fn compile(config: CompilerConfig) -> miette::Result<()> {
    let start = Instant::now();
    let spinner = ui::spinner("Lowering monitors...");

    let compiler = Compiler::new(config);
    let result = match compiler.compile().await {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_and_clear();
            ui::error_header();
            return Err(e.into());
        }
    };
    spinner.finish_and_clear();

    ui::success(&format!(
        "{} monitor(s) {} {} namespace(s) {} {} file(s)",
        result.monitors,
        ui::symbols::DOT,
        result.namespaces,
        ui::symbols::DOT,
        result.files.len()
    ));
    println!();

    ui::tree_dir("", &compiler.config().out_dir.to_string_lossy());
    let last = result.files.len().saturating_sub(1);
    for (i, file) in result.files.iter().enumerate() {
        ui::tree_item("   ", file, None, i == last);
    }
    println!();

    ui::timing("Done", start.elapsed().as_millis());
    report_failures(result.failures)
}

/// Check source trees and print their routing.
async fn check(config: CompilerConfig) -> miette::Result<()> {
    let spinner = ui::spinner("Checking monitors...");
    let compiler = Compiler::new(config);

    let result = match compiler.check().await {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_and_clear();
            ui::nope_header();
            return Err(e.into());
        }
    };
    spinner.finish_and_clear();

    if result.report.is_clean() {
        ui::looking_good();
    } else {
        ui::nope_header();
    }
    println!();
    print_routes(&result.manifest);
    report_failures(result.report.failures)
}

fn print_routes(manifest: &RoutingManifest) {
    ui::box_header("MONITORS");
    ui::box_line("");
    for (name, monitor) in &manifest.monitors {
        ui::monitor_line(name, monitor.events.len(), monitor.handlers.len());
    }
    ui::box_line("");
    ui::box_footer();

    let bindings = manifest.bindings();
    if bindings.is_empty() {
        return;
    }
    println!();
    ui::box_header("BINDINGS");
    ui::box_line("");
    for binding in bindings {
        ui::binding_line(&binding.exchange, &binding.routing_key, &binding.queue);
    }
    ui::box_line("");
    ui::box_footer();
}

/// Prints every rejected declaration; fails if there are any.
fn report_failures(failures: Vec<LoweringFailure>) -> miette::Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    println!();
    let count = failures.len();
    for failure in failures {
        ui::error(&format!("{} was rejected", failure.declaration));
        eprintln!("{:?}", miette::Report::new(failure.error));
    }
    Err(miette::miette!("{} declaration(s) rejected", count))
}

/// Watch mode: recompile whenever a source tree changes.
async fn run_watch_mode(config: CompilerConfig) -> miette::Result<()> {
    ui::info(&format!("Watching for changes in {}", config.input_dir.display()));
    println!();

    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |result: DebounceEventResult| {
            if let Ok(events) = result {
                if !events.is_empty() {
                    let _ = tx.try_send(());
                }
            }
        },
    )
    .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;
    debouncer
        .watcher()
        .watch(&config.input_dir, RecursiveMode::Recursive)
        .map_err(|e| miette::miette!("Failed to watch {}: {}", config.input_dir.display(), e))?;

    recompile(&config).await;
    ui::info("Ready! Waiting for changes...");

    loop {
        tokio::select! {
            _ = rx.recv() => {
                println!();
                recompile(&config).await;
                println!();
                ui::info("Ready! Waiting for changes...");
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                ui::dim("Stopping watch mode.");
                break;
            }
        }
    }

    Ok(())
}

async fn recompile(config: &CompilerConfig) {
    if is_inside(&config.out_dir, &config.input_dir) {
        ui::error("Output directory is inside the input directory; refusing to recompile");
        return;
    }
    let spinner = ui::spinner("Recompiling...");
    let start = Instant::now();

    let compiler = Compiler::new(config.clone());
    match compiler.compile().await {
        Ok(result) => {
            spinner.finish_and_clear();
            ui::success(&format!(
                "Compiled {} monitor(s) in {}ms",
                result.monitors,
                start.elapsed().as_millis()
            ));
            for failure in result.failures {
                ui::error(&format!("{}: {}", failure.declaration, failure.error));
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            ui::error(&format!("{}", e));
        }
    }
}

fn is_inside(path: &Path, dir: &Path) -> bool {
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => path.starts_with(dir),
    }
}
