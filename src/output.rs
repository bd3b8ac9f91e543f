use crate::cache::{RestoreOutcome, SessionSource, SessionStatus};
use crate::config::Config;
use crate::gallery::ServedFile;
use crate::scanner::{Listing, ReconcileStats};
use crate::theme::Theme;
use serde::Serialize;

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,       // Only errors
    Normal,      // Standard output
    Verbose,     // More details
    VeryVerbose, // All details including file paths
}

impl OutputMode {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            OutputMode::Quiet
        } else if verbose >= 2 {
            OutputMode::VeryVerbose
        } else if verbose == 1 {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }

    /// Default log filter for this mode when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            OutputMode::Quiet => "error",
            OutputMode::Normal => "warn",
            OutputMode::Verbose => "gallery=info,warn",
            OutputMode::VeryVerbose => "gallery=debug,info",
        }
    }
}

/// How many playlist or listing entries to show before eliding
fn list_limit(mode: OutputMode) -> usize {
    match mode {
        OutputMode::VeryVerbose => usize::MAX,
        OutputMode::Verbose => 100,
        _ => 20,
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct JsonScan {
    timestamp: String,
    scanned: usize,
    upserted: usize,
    removed: usize,
    failed: usize,
    elapsed_ms: u64,
}

pub fn print_scan_json(stats: &ReconcileStats) -> anyhow::Result<()> {
    print_json(&JsonScan {
        timestamp: chrono::Utc::now().to_rfc3339(),
        scanned: stats.scanned,
        upserted: stats.upserted,
        removed: stats.removed,
        failed: stats.failed,
        elapsed_ms: stats.elapsed.as_millis() as u64,
    })
}

pub fn print_scan(stats: &ReconcileStats, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }

    println!();
    println!("{}", Theme::header("Library Scan"));
    println!("{}", Theme::divider_bold(40));
    println!("{:<12} {:>10}", "Images", Theme::value(&stats.scanned.to_string()));
    println!("{:<12} {:>10}", "Updated", Theme::value(&stats.upserted.to_string()));
    println!("{:<12} {:>10}", "Removed", Theme::value(&stats.removed.to_string()));
    if stats.failed > 0 {
        println!("{:<12} {:>10}", "Unreadable", Theme::warning(&stats.failed.to_string()));
    }
    println!("{}", Theme::divider(40));
    println!(
        "{} in {:.2}s",
        if stats.changed() {
            Theme::success("Index updated")
        } else {
            Theme::muted("Index already up to date")
        },
        stats.elapsed.as_secs_f64()
    );
    println!();
}

pub fn print_playlist(paths: &[String], mode: OutputMode) {
    if mode == OutputMode::Quiet {
        for path in paths {
            println!("{path}");
        }
        return;
    }

    println!();
    println!(
        "{} {}",
        Theme::header("Playlist"),
        Theme::muted(&format!("({} images)", paths.len()))
    );
    println!("{}", Theme::divider_bold(40));
    print_paths(paths, mode);
    println!();
}

fn print_paths(paths: &[String], mode: OutputMode) {
    let limit = list_limit(mode);
    for (idx, path) in paths.iter().take(limit).enumerate() {
        println!("{:>5}  {}", Theme::muted(&idx.to_string()), path);
    }
    if paths.len() > limit {
        println!(
            "{}",
            Theme::muted(&format!("  ... and {} more (use -vv to list all)", paths.len() - limit))
        );
    }
}

pub fn print_restore(outcome: &RestoreOutcome, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }

    println!();
    println!(
        "{} {} of {} paths still exist",
        Theme::success("Restored"),
        Theme::value(&outcome.valid_count.to_string()),
        Theme::value(&outcome.original_count.to_string())
    );
    if mode != OutputMode::Normal {
        print_paths(&outcome.paths, mode);
    }
    println!();
}

pub fn print_status(client_id: &str, status: &SessionStatus, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }

    let source = match status.source {
        SessionSource::Memory => Theme::success("in memory"),
        SessionSource::Durable => Theme::value("on disk"),
        SessionSource::None => Theme::muted("none"),
    };
    println!("Session for {}: {}", Theme::primary(client_id), source);
    if status.present {
        println!("  {} images", Theme::value(&status.size.to_string()));
    }
}

pub fn print_listing(listing: &Listing, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        for entry in &listing.entries {
            println!("{}", entry.path);
        }
        return;
    }

    println!();
    println!("{}", Theme::header(&listing.path));
    println!("{}", Theme::divider_bold(40));
    if listing.entries.is_empty() {
        println!("{}", Theme::muted("(empty)"));
    }
    for entry in &listing.entries {
        if entry.is_dir {
            println!("  {}/", Theme::folder(&entry.name));
        } else {
            println!("  {}", entry.name);
        }
    }
    println!();
}

pub fn print_served(served: &ServedFile, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }
    println!(
        "{}  {}  {}",
        served.path,
        Theme::muted(&served.media_type),
        Theme::size(&bytesize::to_string(served.bytes.len() as u64, true))
    );
}

pub fn print_config(config: &Config) {
    println!("{}", Theme::header("Current Configuration"));
    println!("{}", Theme::divider_bold(60));
    println!();
    println!("Library:");
    match &config.library.root {
        Some(root) => println!("  Root: {}", root.display()),
        None => println!("  Root: (current directory)"),
    }
    match &config.library.database {
        Some(db) => println!("  Database: {}", db.display()),
        None => println!("  Database: (inside root)"),
    }
    if config.library.exclude_patterns.is_empty() {
        println!("  Exclusions: (none)");
    } else {
        println!("  Exclusions:");
        for pattern in &config.library.exclude_patterns {
            println!("    {pattern}");
        }
    }
    println!();
    println!("Scan:");
    println!("  Workers: {} (0 = auto)", config.scan.workers);
    println!();
    println!("Cache:");
    println!("  Content entries: {}", config.cache.content_capacity);
    println!("  Sessions: {}", config.cache.session_capacity);
    println!("  Session max age: {} days", config.cache.session_max_age_days);
    println!();
    println!("Preload:");
    println!("  Radius: {}", config.preload.radius);
    println!("  Trigger every: {} requests", config.preload.trigger_interval);
    println!("  Workers: {}", config.preload.workers);
    println!();
    println!("Access:");
    println!("  Parent directories: {}", config.access.allow_parent_dir_access);
    println!();
    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}
