use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kfxmod::codec::Variant;
use kfxmod::metadata::{ModMetadata, METADATA_FILE_NAME};
use kfxmod::reader::ModPack;
use kfxmod::validate::validate;
use kfxmod::writer::{pack_dir_with_progress, PackOptions, Progress};

#[derive(Parser)]
#[command(name = "kfxmod", about = "The .kfxmod mod package CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a mod directory into a .kfxmod archive
    Pack {
        source: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Metadata JSON file (default: <source>/metadata.json)
        #[arg(short, long)]
        metadata: Option<PathBuf>,
        /// Compression: zlib (default) or none
        #[arg(short, long, default_value = "zlib")]
        compression: String,
        /// Fully validate the archive before it replaces the destination
        #[arg(long)]
        validate: bool,
    },
    /// Unpack a .kfxmod archive
    Unpack {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Extract only metadata.json
        #[arg(long)]
        metadata_only: bool,
        /// Only extract entries whose path contains one of these substrings
        #[arg(short, long)]
        filter: Vec<String>,
    },
    /// Show archive metadata
    Info {
        input: PathBuf,
    },
    /// Check archive integrity
    Validate {
        input: PathBuf,
    },
}

struct StdoutProgress;
impl Progress for StdoutProgress {
    fn file_packed(&self, index: usize, total: usize, path: &str) {
        println!("  packed  [{index}/{total}] {path}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack {
            source,
            output,
            metadata,
            compression,
            validate,
        } => {
            let variant = Variant::from_name(&compression)
                .ok_or_else(|| format!("unknown compression '{compression}' (zlib or none)"))?;
            let metadata_path = metadata.unwrap_or_else(|| source.join(METADATA_FILE_NAME));
            let meta_bytes = std::fs::read(&metadata_path)
                .map_err(|e| format!("cannot read {}: {e}", metadata_path.display()))?;
            let meta = ModMetadata::parse(&meta_bytes)?;

            let opts = PackOptions {
                variant,
                validate_first: validate,
            };
            let summary = pack_dir_with_progress(
                &source,
                &output,
                meta,
                Some(&metadata_path),
                &opts,
                &StdoutProgress,
            )?;
            println!(
                "Created: {} ({} entries, {} bytes)",
                summary.output.display(),
                summary.entry_count,
                summary.total_size
            );
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack {
            input,
            output_dir,
            metadata_only,
            filter,
        } => {
            let mut pack = ModPack::open(&input)?;
            let count = pack.unpack_to(&output_dir, &filter, metadata_only)?;
            println!(
                "Unpacked {count} entries (+ metadata.json) to: {}",
                output_dir.display()
            );
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pack = ModPack::open(&input)?;
            let compressed: u64 = pack.entries.iter().map(|e| e.compressed_size as u64).sum();
            let uncompressed: u64 = pack
                .entries
                .iter()
                .map(|e| e.uncompressed_size as u64)
                .sum();

            println!("── .kfxmod Archive ──────────────────────────────────────");
            println!("  Path            {}", input.display());
            println!("  Format version  {}", pack.header.format_version);
            println!("  Mod id          {}", pack.metadata.id);
            println!("  Name            {}", pack.metadata.name);
            println!("  Version         {}", pack.metadata.version);
            println!("  Author          {}", pack.metadata.author);
            println!("  Type            {:?}", pack.metadata.mod_type);
            println!(
                "  Compression     {}",
                pack.header
                    .metadata_variant()
                    .map(|v| v.name())
                    .unwrap_or("UNKNOWN")
            );
            println!("  Entries         {}", pack.entries.len());
            println!("  Content         {compressed} B compressed / {uncompressed} B raw");
            println!("  Archive size    {} B", pack.header.total_size);
            if !pack.metadata.dependencies.is_empty() {
                println!("  Dependencies ({}):", pack.metadata.dependencies.len());
                for dep in &pack.metadata.dependencies {
                    let need = if dep.required { "required" } else { "optional" };
                    println!("    {} >= {} ({})", dep.id, dep.min_version, need);
                }
            }
        }

        // ── Validate ─────────────────────────────────────────────────────────
        Commands::Validate { input } => {
            let mut pack = ModPack::open(&input)?;
            let report = validate(&mut pack)?;
            for warning in &report.warnings {
                println!("warning: {}", warning.message);
            }
            for error in &report.errors {
                eprintln!("error: {}", error.message);
            }
            if report.passed() {
                println!(
                    "ok: {} entries, {} warning(s)",
                    pack.entries.len(),
                    report.warnings.len()
                );
            } else {
                eprintln!("FAILED: {} error(s)", report.errors.len());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
