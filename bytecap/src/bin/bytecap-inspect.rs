// bytecap-inspect: look at what capture sessions left on disk
//
// Commands:
//   bytecap-inspect list [<dir>] [--json]
//   bytecap-inspect summary [<dir>] [--json]
//   bytecap-inspect dupes [<dir>] [--json]
//   bytecap-inspect clean [<dir>]

use anyhow::{Context, Result};
use bytecap::capture::inventory::{content_duplicates, scan_captures, summarize, CaptureFile};
use bytecap::capture::store::cleanup_stale_temps_in;
use bytecap::CaptureConfig;
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    println!(
        r#"bytecap-inspect - inspect captured code units

USAGE:
    bytecap-inspect <COMMAND> [DIR] [OPTIONS]

COMMANDS:
    list       List every captured file with size and SHA-256
    summary    Per-session counts, sizes and sequence gaps
    dupes      Files whose contents are identical
    clean      Delete stale temp files left by interrupted writes
    help       Show this help message

OPTIONS:
    --json     Output in JSON format

DIR defaults to the configured output root (BYTECAP_OUTPUT_DIR or
BYTECAP_CONFIG). Logging follows RUST_LOG.

EXAMPLES:
    bytecap-inspect list /data/data/com.example.app
    bytecap-inspect summary --json
    bytecap-inspect clean ~/captures
"#
    );
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn short_digest(file: &CaptureFile) -> &str {
    &file.sha256[..file.sha256.len().min(12)]
}

fn cmd_list(root: &Path, json: bool) -> Result<()> {
    let files = scan_captures(root).with_context(|| format!("Failed to scan {}", root.display()))?;
    if json {
        return print_json(&files);
    }

    if files.is_empty() {
        println!("No captures found in {}", root.display());
        return Ok(());
    }

    for file in &files {
        let modified = file
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>10}  {}  {}  {}",
            file.size,
            modified,
            short_digest(file),
            file.path.display()
        );
    }
    Ok(())
}

fn cmd_summary(root: &Path, json: bool) -> Result<()> {
    let files = scan_captures(root).with_context(|| format!("Failed to scan {}", root.display()))?;
    let sessions = summarize(&files);
    if json {
        return print_json(&sessions);
    }

    if sessions.is_empty() {
        println!("No captures found in {}", root.display());
        return Ok(());
    }

    for session in &sessions {
        print!(
            "{}  session {:05}: {} files, {} bytes",
            session.directory.display(),
            session.session_id,
            session.count,
            session.total_bytes
        );
        if session.missing_count == 0 {
            println!();
        } else if session.missing_count as usize > session.missing_sequences.len() {
            println!(
                "  ({} missing, first {:?})",
                session.missing_count, session.missing_sequences
            );
        } else {
            println!("  (missing {:?})", session.missing_sequences);
        }
    }
    Ok(())
}

fn cmd_dupes(root: &Path, json: bool) -> Result<()> {
    let files = scan_captures(root).with_context(|| format!("Failed to scan {}", root.display()))?;
    let groups = content_duplicates(&files);
    if json {
        return print_json(&groups);
    }

    if groups.is_empty() {
        println!("No duplicate contents");
        return Ok(());
    }

    for group in &groups {
        println!("{} ({} bytes):", short_digest(group[0]), group[0].size);
        for file in group {
            println!("    {}", file.path.display());
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct CleanReport {
    directory: PathBuf,
    deleted: usize,
    scanned: usize,
    hit_limit: bool,
}

fn cmd_clean(root: &Path, json: bool) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    // The root itself plus one directory per application
    let mut dirs = vec![root.to_path_buf()];
    for entry in std::fs::read_dir(root).with_context(|| format!("Failed to read {}", root.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }

    let mut reports = Vec::new();
    for dir in dirs {
        let (deleted, scanned, hit_limit) = cleanup_stale_temps_in(&dir)
            .with_context(|| format!("Failed to clean {}", dir.display()))?;
        reports.push(CleanReport {
            directory: dir,
            deleted,
            scanned,
            hit_limit,
        });
    }

    if json {
        return print_json(&reports);
    }

    let total: usize = reports.iter().map(|r| r.deleted).sum();
    for report in reports.iter().filter(|r| r.deleted > 0 || r.hit_limit) {
        println!(
            "{}: deleted {} of {} scanned{}",
            report.directory.display(),
            report.deleted,
            report.scanned,
            if report.hit_limit { " (scan limit hit)" } else { "" }
        );
    }
    println!("Removed {} stale temp file(s)", total);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bytecap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let command = &args[1];

    let mut json_output = false;
    let mut dir_arg: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => {
                json_output = true;
            }
            other if !other.starts_with('-') && dir_arg.is_none() => {
                dir_arg = Some(other.to_string());
            }
            other => {
                eprintln!("Unknown option: {}", other);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let run: fn(&Path, bool) -> Result<()> = match command.as_str() {
        "list" => cmd_list,
        "summary" => cmd_summary,
        "dupes" => cmd_dupes,
        "clean" => cmd_clean,
        "help" | "--help" | "-h" => {
            print_help();
            return Ok(());
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_help();
            std::process::exit(1);
        }
    };

    // Only commands that touch captures need the configured root
    let root = match dir_arg {
        Some(dir) => PathBuf::from(dir),
        None => CaptureConfig::from_env()?.output_root(),
    };

    run(&root, json_output)
}
