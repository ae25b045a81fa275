//! archivekv CLI
//!
//! Command-line access to an archive directory.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use archivekv::{Archive, ArchiveError, Config, Key, KEY_SIZE};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// archivekv CLI
#[derive(Parser, Debug)]
#[command(name = "archivekv")]
#[command(about = "Append-only key-value archive keyed by 20-byte hashes")]
#[command(version)]
struct Args {
    /// Base directory holding the page files
    #[arg(short, long, default_value = "./")]
    dir: PathBuf,

    /// Existing page to open (repeat, oldest first)
    #[arg(short, long = "page")]
    pages: Vec<String>,

    /// fsync pages after saving
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file's contents under a key
    Put {
        /// The key, 40 hex characters
        key: String,

        /// File whose bytes become the value
        file: PathBuf,
    },

    /// Write a value to stdout
    Get {
        /// The key or a prefix of it (6 to 40 hex characters)
        key: String,

        /// Read at most this many bytes
        #[arg(long)]
        max_size: Option<usize>,
    },

    /// Exit 0 if a key (or prefix) is present, 1 otherwise
    Has {
        /// The key or a prefix of it (6 to 40 hex characters)
        key: String,
    },

    /// List pages with their item counts and data sizes
    Info,
}

fn main() -> ExitCode {
    // Initialize tracing/logging (stderr, so `get` output stays clean)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,archivekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> archivekv::Result<ExitCode> {
    let config = Config::builder()
        .base_dir(&args.dir)
        .pages(args.pages)
        .sync_on_save(args.sync)
        .build();

    let mut archive = Archive::open(config)?;
    let code = execute(&mut archive, args.command);
    let freed = archive.free();
    let code = code?;
    freed?;
    Ok(code)
}

fn execute(archive: &mut Archive, command: Commands) -> archivekv::Result<ExitCode> {
    match command {
        Commands::Put { key, file } => {
            let key = parse_full_key(&key)?;
            let data = fs::read(&file)?;
            archive.set(&key, &data)?;
            let saved = archive.save()?;
            print!("{}", saved);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Get { key, max_size } => {
            let prefix = parse_prefix(&key)?;
            let fetched = archive.get_partial(&prefix, max_size)?;
            tracing::info!(
                key = %hex::encode(fetched.key),
                size = fetched.size,
                truncated = fetched.is_truncated(),
                "found"
            );
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&fetched.data)?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Has { key } => {
            let prefix = parse_prefix(&key)?;
            match archive.has_partial(&prefix)? {
                Some(full) => {
                    println!("{}", hex::encode(full));
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::from(1)),
            }
        }
        Commands::Info => {
            for page in archive.pages() {
                println!(
                    "{}\titems={}\tdata_size={}",
                    page.filename(),
                    page.len(),
                    page.data_size()
                );
            }
            println!("pages={}\titems={}", archive.page_count(), archive.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_prefix(text: &str) -> archivekv::Result<Vec<u8>> {
    hex::decode(text).map_err(|e| ArchiveError::Config(format!("invalid hex key {:?}: {}", text, e)))
}

fn parse_full_key(text: &str) -> archivekv::Result<Key> {
    let bytes = parse_prefix(text)?;
    Key::try_from(bytes.as_slice()).map_err(|_| {
        ArchiveError::Config(format!(
            "key must be {} bytes ({} hex characters), got {}",
            KEY_SIZE,
            KEY_SIZE * 2,
            bytes.len()
        ))
    })
}
