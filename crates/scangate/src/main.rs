//! Scangate - Security scan report detection, policy gating and bundling.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use scangate_bundle::{update_in_place, verify_bundle, Bundle};
use scangate_detect::{default_candidates, Candidate, DetectMode, Detector, Format};
use scangate_policy::{validate_decoded, EpssScores, KevCatalog, PolicyDocument, ValidationContext};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "scangate")]
#[command(
    author,
    version,
    about = "Detect security scan reports, gate them on policy and bundle them"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Detection timeout in milliseconds
    #[arg(long, global = true, default_value = "5000")]
    timeout_ms: u64,

    /// Try decoders one at a time in a fixed order
    #[arg(long, global = true)]
    sequential: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the format of a report and list its findings
    Detect {
        /// Report file
        file: PathBuf,

        /// Only try this format's decoder (grype, semgrep, gitleaks, cyclonedx, bundle)
        #[arg(long)]
        format: Option<Format>,
    },

    /// Validate a report or bundle against a policy document
    Validate {
        /// Report or bundle file
        file: PathBuf,

        /// Policy document (YAML or JSON)
        #[arg(long, short)]
        config: PathBuf,

        /// Known exploited vulnerabilities catalog (JSON)
        #[arg(long)]
        kev: Option<PathBuf>,

        /// EPSS scores (CSV)
        #[arg(long)]
        epss: Option<PathBuf>,
    },

    /// Manage bundle archives
    Bundle {
        #[command(subcommand)]
        command: BundleCommands,
    },

    /// Manage policy documents
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum BundleCommands {
    /// Add a file to a bundle, creating the bundle if needed
    Add {
        bundle: PathBuf,
        file: PathBuf,

        /// Label to store the file under (defaults to the file name)
        #[arg(long)]
        label: Option<String>,

        /// Extra property as key=value
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },

    /// Remove an entry from a bundle
    Rm { bundle: PathBuf, label: String },

    /// List bundle entries
    Ls { bundle: PathBuf },

    /// Check manifest schema and digests
    Verify { bundle: PathBuf },

    /// Write one entry to a file or stdout
    Extract {
        bundle: PathBuf,
        label: String,

        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default policy template
    Init {
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

/// Built-in candidates restricted to `format`; empty when it has no decoder.
fn candidates_for(format: Format) -> Vec<Candidate> {
    default_candidates()
        .into_iter()
        .filter(|c| c.format() == format)
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let timeout = Duration::from_millis(cli.timeout_ms);
    let mode = if cli.sequential {
        DetectMode::Sequential
    } else {
        DetectMode::Race
    };

    match cli.command {
        Commands::Detect { file, format } => {
            let content = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {:?}", file))?;

            let (detector, decoded) = match format {
                Some(format) => {
                    let candidates = candidates_for(format);
                    if candidates.is_empty() {
                        bail!("No decoder for format {}", format);
                    }
                    let detector = Detector::with_candidates(candidates).with_mode(mode);
                    let decoded = detector
                        .detect(content, timeout)
                        .await
                        .with_context(|| format!("{:?} is not a {} report", file, format))?;
                    (detector, decoded)
                }
                None => {
                    let detector = Detector::new().with_mode(mode);
                    let decoded = detector
                        .detect_with_hint(&file_name(&file), content, timeout)
                        .await?;
                    (detector, decoded)
                }
            };
            info!(
                "Detected {:?} as {}",
                file,
                detector.file_type().unwrap_or_default()
            );

            let summary = serde_json::json!({
                "format": decoded.format(),
                "fileType": detector.file_type(),
                "findings": decoded.findings(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Validate {
            file,
            config,
            kev,
            epss,
        } => {
            let raw_doc = std::fs::read(&config)
                .with_context(|| format!("Failed to read policy document {:?}", config))?;

            let mut ctx = ValidationContext::new().with_detect_timeout(timeout);
            if cli.sequential {
                ctx = ctx.sequential();
            }
            if let Some(path) = kev {
                let raw = std::fs::read(&path)
                    .with_context(|| format!("Failed to read KEV catalog {:?}", path))?;
                ctx = ctx.with_kev(KevCatalog::from_json(&raw)?);
            }
            if let Some(path) = epss {
                let raw = std::fs::read(&path)
                    .with_context(|| format!("Failed to read EPSS scores {:?}", path))?;
                ctx = ctx.with_epss(EpssScores::from_csv(&raw)?);
            }

            let content = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {:?}", file))?;
            let decoded = ctx
                .detector()
                .detect_with_hint(&file_name(&file), content, timeout)
                .await?;

            info!("Validating {:?} as {}", file, decoded.format());
            validate_decoded(&decoded, &raw_doc, &ctx).await?;
            info!("Policy passed for {:?}", file);
        }

        Commands::Bundle { command } => match command {
            BundleCommands::Add {
                bundle,
                file,
                label,
                tags,
            } => {
                let content = tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("Failed to read {:?}", file))?;
                let label = label.unwrap_or_else(|| file_name(&file));

                let detector = Detector::new().with_mode(mode);
                let file_type = match detector
                    .detect_with_hint(&label, content.clone(), timeout)
                    .await
                {
                    Ok(decoded) => decoded.format().file_type(),
                    Err(e) => {
                        warn!("Could not identify {:?}: {}", file, e);
                        Format::Generic.file_type()
                    }
                };

                let mut properties: BTreeMap<String, String> = tags.into_iter().collect();
                properties.insert("filetype".to_string(), file_type.to_string());

                let mut dest = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&bundle)
                    .with_context(|| format!("Failed to open bundle {:?}", bundle))?;
                update_in_place(&mut dest, |b| b.add(label.as_str(), content, properties))?;
                info!("Added {} ({}) to {:?}", label, file_type, bundle);
            }

            BundleCommands::Rm { bundle, label } => {
                let mut dest = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&bundle)
                    .with_context(|| format!("Failed to open bundle {:?}", bundle))?;
                update_in_place(&mut dest, |b| {
                    b.remove(&label);
                    Ok(())
                })?;
                info!("Removed {} from {:?}", label, bundle);
            }

            BundleCommands::Ls { bundle } => {
                let archive = read_bundle(&bundle)?;
                for (label, content) in archive.entries() {
                    let (digest, filetype) = archive
                        .descriptor(label)
                        .map(|d| {
                            (
                                d.digest.as_str(),
                                d.properties.get("filetype").map(String::as_str),
                            )
                        })
                        .unwrap_or_default();
                    println!(
                        "{}\t{}\t{}\t{}",
                        label,
                        content.len(),
                        digest,
                        filetype.unwrap_or("-")
                    );
                }
            }

            BundleCommands::Verify { bundle } => {
                let archive = read_bundle(&bundle)?;
                let report = verify_bundle(&archive)?;
                for note in &report.notes {
                    warn!("{}", note);
                }
                for problem in &report.problems {
                    println!("ERROR: {}", problem);
                }
                if !report.is_valid() {
                    bail!(
                        "Bundle {:?} failed verification with {} problems",
                        bundle,
                        report.problems.len()
                    );
                }
                println!("{:?}: {} entries verified", bundle, archive.len());
            }

            BundleCommands::Extract { bundle, label, out } => {
                let archive = read_bundle(&bundle)?;
                let content = archive.get(&label)?;
                match out {
                    Some(path) => {
                        std::fs::write(&path, content)
                            .with_context(|| format!("Failed to write {:?}", path))?;
                        info!("Extracted {} to {:?}", label, path);
                    }
                    None => {
                        use std::io::Write;
                        std::io::stdout().write_all(content)?;
                    }
                }
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Init { out } => {
                let template = PolicyDocument::default().to_yaml()?;
                match out {
                    Some(path) => {
                        std::fs::write(&path, template)
                            .with_context(|| format!("Failed to write {:?}", path))?;
                        info!("Policy template written to {:?}", path);
                    }
                    None => print!("{}", template),
                }
            }
        },
    }

    Ok(())
}

fn read_bundle(path: &Path) -> anyhow::Result<Bundle> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open bundle {:?}", path))?;
    Ok(Bundle::decode(file)?)
}
