use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stagehand::server::ServerConfig;
use stagehand::{build, config};

#[derive(Parser)]
#[command(name = "stagehand", version)]
#[command(about = "Build and serve single-page front-ends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the source tree into a fingerprinted output directory
    Build {
        /// Manifest path (default: ./stagehand.toml, falling back to defaults)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Override the output directory
        #[arg(long)]
        out: Option<PathBuf>,

        /// Fail when the entry document is missing
        #[arg(long)]
        strict: bool,
    },

    /// Serve a built output directory
    Serve {
        /// Manifest path (default: ./stagehand.toml, falling back to defaults)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Serve this directory instead of the manifest's output directory
        #[arg(long)]
        root: Option<PathBuf>,

        /// Override the listening port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Build, watch, and serve with live reload
    Dev {
        /// Manifest path (default: ./stagehand.toml, falling back to defaults)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Server port
        #[arg(long, default_value_t = 3333)]
        port: u16,
    },

    /// Validate the manifest and report what a build would produce
    Check {
        /// Manifest path (default: ./stagehand.toml, falling back to defaults)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Emit the plan as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Remove the output directory
    Clean {
        /// Manifest path (default: ./stagehand.toml, falling back to defaults)
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            manifest,
            out,
            strict,
        } => {
            let mut manifest = load_manifest(manifest.as_deref());
            if let Some(out) = out {
                manifest.build.out_dir = out;
            }
            match build::build_site(&manifest, strict) {
                Ok(report) => {
                    for file in &report.written {
                        eprintln!("  {} -> {}", file.rel.display(), file.out_rel.display());
                    }
                    eprintln!(
                        "built {} files ({} bytes) -> {}",
                        report.written.len(),
                        report.total_bytes,
                        manifest.build.out_dir.display()
                    );
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    process::exit(1);
                }
            }
        }

        Commands::Serve {
            manifest,
            root,
            port,
        } => {
            let manifest = load_manifest(manifest.as_deref());
            let mut config = ServerConfig::from_manifest(&manifest);
            if let Some(root) = root {
                config.root = root;
            }
            if let Some(port) = port {
                config.port = port;
            }
            run_async(stagehand::server::run_server(config));
        }

        Commands::Dev { manifest, port } => {
            let manifest = load_manifest(manifest.as_deref());
            run_async(stagehand::server::dev::run_dev_server(manifest, port));
        }

        Commands::Check { manifest, json } => {
            let manifest = load_manifest(manifest.as_deref());
            match build::plan_build(&manifest, false) {
                Ok(plan) if json => {
                    let files: Vec<_> = plan
                        .files
                        .iter()
                        .map(|f| {
                            serde_json::json!({
                                "source": f.rel,
                                "output": f.out_rel,
                                "fingerprint": f.fingerprint,
                            })
                        })
                        .collect();
                    let payload = serde_json::json!({
                        "entry_present": plan.entry_present,
                        "files": files,
                    });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&payload).unwrap_or_default()
                    );
                }
                Ok(plan) => {
                    for file in &plan.files {
                        match &file.fingerprint {
                            Some(hash) => eprintln!(
                                "  {} -> {} [{hash}]",
                                file.rel.display(),
                                file.out_rel.display()
                            ),
                            None => eprintln!("  {}", file.rel.display()),
                        }
                    }
                    if plan.entry_present {
                        eprintln!("ok: {} files would be built", plan.files.len());
                    } else {
                        eprintln!(
                            "warning: entry document '{}' is missing",
                            manifest.site.entry.display()
                        );
                    }
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    process::exit(1);
                }
            }
        }

        Commands::Clean { manifest } => {
            let manifest = load_manifest(manifest.as_deref());
            if let Err(e) = build::clean(&manifest) {
                eprintln!("error: {e}");
                process::exit(1);
            }
            eprintln!("removed {}", manifest.build.out_dir.display());
        }
    }
}

fn load_manifest(path: Option<&std::path::Path>) -> config::SiteManifest {
    match config::load_or_default(path) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn run_async(task: impl std::future::Future<Output = stagehand::Result<()>>) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: cannot create tokio runtime: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(task) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
