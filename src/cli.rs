use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::gallery::Gallery;
use crate::library::OrientationFilter;
use crate::output::{self, OutputMode};
use crate::playlist::{Direction, PlaylistRequest, SortMode};
use crate::progress;
use crate::theme::Theme;

/// Client identity used when the command line acts as a viewer
pub const DEFAULT_CLIENT: &str = "cli";

#[derive(Parser)]
#[command(name = "gallery")]
#[command(version)]
#[command(about = "Index an image library and build slideshow playlists")]
#[command(long_about = "Gallery keeps an SQLite index of every image under a root directory \
    and builds ordered, filtered playlists from it.\n\n\
    Examples:\n  \
    gallery --root ~/Pictures scan          # Index or refresh the library\n  \
    gallery playlist -p trips -p family     # Shuffled playlist of two folders\n  \
    gallery playlist -p . --sort name       # Everything, in natural order\n  \
    gallery browse trips                    # List one folder")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Library root (overrides config and GALLERY_ROOT_DIR)
    #[arg(long, value_name = "PATH", global = true)]
    pub root: Option<PathBuf>,

    /// Allow paths that resolve outside the root
    #[arg(long, global = true)]
    pub allow_parent: bool,

    /// Increase output verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the index with the library root
    #[command(visible_alias = "s")]
    Scan {
        /// Output results as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Build a playlist and store it as the client's session
    #[command(visible_alias = "p")]
    Playlist {
        /// Folder prefix relative to the root, "." for everything (repeatable)
        #[arg(short = 'p', long = "path", value_name = "PREFIX")]
        paths: Vec<String>,

        /// shuffle, name, date, subfolder_random or subfolder_date
        #[arg(long, default_value = "shuffle")]
        sort: String,

        /// any, landscape or portrait
        #[arg(long, default_value = "any")]
        orientation: String,

        /// forward or reverse
        #[arg(long, default_value = "forward")]
        direction: String,

        /// Rotate the playlist so this path comes first
        #[arg(long, value_name = "PATH")]
        anchor: Option<String>,

        #[arg(long, default_value = DEFAULT_CLIENT)]
        client: String,

        /// Output the playlist as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-validate a saved playlist and install what still exists
    Restore {
        /// Playlist entries, in order
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<String>,

        /// Index of the entry the viewer was showing
        #[arg(long, default_value = "0")]
        cursor: usize,

        #[arg(long, default_value = DEFAULT_CLIENT)]
        client: String,

        #[arg(long)]
        json: bool,
    },

    /// Show where a client's session currently lives
    Status {
        #[arg(long, default_value = DEFAULT_CLIENT)]
        client: String,

        #[arg(long)]
        json: bool,
    },

    /// List one folder of the library
    #[command(visible_alias = "b")]
    Browse {
        /// Folder relative to the root
        #[arg(default_value = "")]
        path: String,

        #[arg(long)]
        json: bool,
    },

    /// Read a file the way a viewer would
    File {
        /// File relative to the root
        path: String,

        #[arg(long, default_value = DEFAULT_CLIENT)]
        client: String,

        /// Write the bytes here instead of printing a summary
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// View or reset configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Reset to defaults
        #[arg(long)]
        reset: bool,

        /// Print the configuration file location
        #[arg(long)]
        path: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_flags(self.verbose, self.quiet)
    }

    pub fn run(self) -> anyhow::Result<()> {
        let output_mode = self.output_mode();
        let Cli {
            command,
            root,
            allow_parent,
            ..
        } = self;
        let open_gallery = move || -> anyhow::Result<Gallery> {
            let mut config = Config::load();
            config.apply_cli_overrides(root, allow_parent);
            Gallery::open(&config)
        };

        match command {
            Commands::Scan { json } => {
                let gallery = open_gallery()?;
                let spinner = if json || output_mode == OutputMode::Quiet {
                    progress::hidden()
                } else {
                    progress::create_spinner("Scanning library...")
                };
                let result = gallery.reconcile();
                spinner.finish_and_clear();

                let stats = result.context("Library scan failed")?;
                if json {
                    output::print_scan_json(&stats)?;
                } else {
                    output::print_scan(&stats, output_mode);
                }
                Ok(())
            }
            Commands::Playlist {
                paths,
                sort,
                orientation,
                direction,
                anchor,
                client,
                json,
            } => {
                let request = PlaylistRequest {
                    prefixes: paths,
                    orientation: orientation.parse::<OrientationFilter>()?,
                    sort: SortMode::from_name(&sort),
                    direction: direction.parse::<Direction>()?,
                    anchor,
                };
                let gallery = open_gallery()?;
                let playlist = gallery.build_playlist(&request, &client)?;
                if json {
                    output::print_json(playlist.as_slice())?;
                } else {
                    output::print_playlist(&playlist, output_mode);
                }
                Ok(())
            }
            Commands::Restore {
                paths,
                cursor,
                client,
                json,
            } => {
                let gallery = open_gallery()?;
                let outcome = gallery.restore_playlist(&paths, cursor, &client)?;
                if json {
                    output::print_json(&outcome)?;
                } else {
                    output::print_restore(&outcome, output_mode);
                }
                Ok(())
            }
            Commands::Status { client, json } => {
                let status = open_gallery()?.session_status(&client)?;
                if json {
                    output::print_json(&status)?;
                } else {
                    output::print_status(&client, &status, output_mode);
                }
                Ok(())
            }
            Commands::Browse { path, json } => {
                let listing = open_gallery()?.browse(&path)?;
                if json {
                    output::print_json(&listing)?;
                } else {
                    output::print_listing(&listing, output_mode);
                }
                Ok(())
            }
            Commands::File {
                path,
                client,
                output: target,
            } => {
                let gallery = open_gallery()?;
                let served = gallery.serve_file(&path, &client)?;
                if let Some(target) = target {
                    std::fs::write(&target, &served.bytes[..])
                        .with_context(|| format!("Failed to write {}", target.display()))?;
                }
                output::print_served(&served, output_mode);
                // Let any preload the request triggered finish before exiting
                gallery.tasks().wait_idle();
                Ok(())
            }
            Commands::Config {
                show: _,
                reset,
                path,
            } => run_config(reset, path),
        }
    }
}

/// `--show` and the bare command both print the configuration
fn run_config(reset: bool, path: bool) -> anyhow::Result<()> {
    if reset {
        let saved = Config::default().save()?;
        println!(
            "{} Configuration reset to defaults ({}).",
            Theme::success("OK"),
            saved.display()
        );
    } else if path {
        println!("{}", Config::config_path()?.display());
    } else {
        output::print_config(&Config::load_or_create());
    }
    Ok(())
}
