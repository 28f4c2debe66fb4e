//! Tapedeck CLI

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use tapedeck::{JsonLinesStorage, Storage};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Tapedeck v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: tapedeck <command> <cassette.jsonl>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  stats     Show recording statistics");
        eprintln!("  check     Verify every recording can be rebuilt");
        process::exit(1);
    }

    let path = PathBuf::from(&args[2]);
    let result = match args[1].as_str() {
        "stats" => show_stats(&path),
        "check" => check(&path),
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'tapedeck' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn open(path: &Path) -> anyhow::Result<JsonLinesStorage> {
    if !path.is_file() {
        bail!("Cassette not found: {}", path.display());
    }
    JsonLinesStorage::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn show_stats(path: &Path) -> anyhow::Result<()> {
    let storage = open(path)?;
    let mut by_method: BTreeMap<String, usize> = BTreeMap::new();

    for recording in storage.recordings() {
        let request = recording?.request()?;
        *by_method.entry(request.method.to_uppercase()).or_default() += 1;
    }

    println!("Cassette: {}", path.display());
    println!("Recordings: {}", storage.len());
    for (method, count) in by_method {
        println!("  {method:<8} {count}");
    }
    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let storage = open(path)?;

    for (index, recording) in storage.recordings().enumerate() {
        let recording = recording?;
        recording
            .request()
            .and_then(|_| recording.response())
            .with_context(|| format!("Recording #{} is malformed", index + 1))?;
    }

    println!("{}: {} recordings OK", path.display(), storage.len());
    Ok(())
}
