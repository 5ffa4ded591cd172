//! Vela module resolver (velamod)

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use vela_modules::{DiagnosticTarget, ModuleRegistry, Overrides, ResolutionPlan, SessionReport, ToolchainConfig};

#[derive(Parser)]
#[command(name = "velamod")]
#[command(about = "Vela module resolver", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a plan and report conflicts and incompatibilities
    Check {
        /// Resolution plan (TOML)
        plan: PathBuf,

        /// Toolchain configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Dependency overrides
        #[arg(long)]
        overrides: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,vela_modules=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            plan,
            config,
            overrides,
        } => {
            let config = match config {
                Some(path) => ToolchainConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => ToolchainConfig::default(),
            };
            let overrides = overrides
                .map(|path| {
                    Overrides::from_file(&path).with_context(|| format!("loading {}", path.display()))
                })
                .transpose()?;
            let plan = ResolutionPlan::from_file(&plan)
                .with_context(|| format!("loading {}", plan.display()))?;

            let report = plan.run(&config, overrides.as_ref())?;
            print_report(&report);
            if report.has_errors() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn describe(registry: &ModuleRegistry, target: DiagnosticTarget) -> String {
    match target {
        DiagnosticTarget::Module(module) => registry.get(module).coordinates(),
        DiagnosticTarget::Declaration { root, dependency } => format!(
            "{} (import of {})",
            registry.get(root).coordinates(),
            registry.get(dependency).coordinates()
        ),
        DiagnosticTarget::Import {
            importer,
            dependency,
        } => format!(
            "{} -> {}",
            registry.get(importer).coordinates(),
            registry.get(dependency).coordinates()
        ),
    }
}

fn print_report(report: &SessionReport) {
    let registry = &report.registry;
    for diagnostic in report.diagnostics.iter() {
        println!("{}", diagnostic);
        println!("  --> {}", describe(registry, diagnostic.target));
    }
    if !report.diagnostics.is_empty() {
        println!();
    }

    println!("Modules:");
    for module in registry.modules() {
        let mut flags = Vec::new();
        if module.is_available() {
            flags.push("available");
        }
        if module.is_from_platform() {
            flags.push("platform");
        }
        if module.is_from_binary() {
            flags.push("binary");
        }
        println!("  {} [{}]", module.coordinates(), flags.join(", "));
        for import in module.imports() {
            let mut line = format!("    -> {}", registry.get(import.module).coordinates());
            if import.optional {
                line.push_str(" optional");
            }
            if import.export {
                line.push_str(" export");
            }
            println!("{}", line);
        }
    }

    let errors = report.diagnostics.errors().count();
    let warnings = report.diagnostics.warnings().count();
    println!();
    println!("{} error(s), {} warning(s)", errors, warnings);
}
