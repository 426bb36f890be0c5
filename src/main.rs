//! Command-line maintenance of well annotation stores.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use well_annotator::config::AnnotatorConfig;
use well_annotator::discovery::TierpsyLayout;
use well_annotator::session::{Progress, Resolution, rescan_contents, resolve_next};
use well_annotator::store::{StoreHandle, default_csv_path, export_csv, export_warnings};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Inspect and maintain well annotation stores
#[derive(Parser, Debug)]
#[clap(name = "well-annotator", version)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log debug messages
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the working directory recorded in a store
    WorkingDir { store: PathBuf },

    /// Point a store at a moved working directory
    Rebase { store: PathBuf, new_dir: PathBuf },

    /// Open or create the store for a video directory and show progress
    Status { input: PathBuf },

    /// Register videos added to the working directory since the last scan
    Rescan { store: PathBuf },

    /// Write one CSV row per annotated well
    ExportCsv {
        store: PathBuf,

        /// Output file (defaults to the store path with a .csv extension)
        #[clap(long, short, value_name = "CSV")]
        output: Option<PathBuf>,

        /// Export even if wells or videos are still unannotated
        #[clap(long)]
        force: bool,
    },

    /// Write the default configuration to the --config file or the user config directory
    InitConfig {
        /// Replace an existing configuration file
        #[clap(long)]
        force: bool,
    },
}

fn init_logging(config: &AnnotatorConfig, verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        config.preferences.log_level.to_level_filter()
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = AnnotatorConfig::load_or_default(args.config.as_deref());
    init_logging(&config, args.verbose);

    match run(args.command, args.config.as_deref(), &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config_path: Option<&Path>, config: &AnnotatorConfig) -> CliResult {
    match command {
        Command::WorkingDir { store } => {
            let working_dir = StoreHandle::open(store)?.read_working_dir()?;
            println!("{}", working_dir.display());
        }
        Command::Rebase { store, new_dir } => {
            let handle = StoreHandle::open(store)?;
            let old = handle.rebase(&new_dir)?;
            println!("old working directory: {}", old.display());
            println!("new working directory: {}", handle.read_working_dir()?.display());
        }
        Command::Status { input } => status(&input, config)?,
        Command::Rescan { store } => {
            let handle = StoreHandle::open(store)?;
            let mut contents = handle.load()?;
            let mut discovery = TierpsyLayout::new(config.preferences.prestim_only);
            let added = rescan_contents(&mut contents, &mut discovery);
            handle.save(&contents)?;
            println!("{} new videos registered", added.len());
            for record in &added {
                println!("  {}", record.filename);
            }
        }
        Command::ExportCsv {
            store,
            output,
            force,
        } => {
            let handle = StoreHandle::open(store)?;
            let contents = handle.load()?;
            let warnings = export_warnings(&contents);
            for warning in &warnings {
                eprintln!("warning: {}", warning);
            }
            if !warnings.is_empty() && !force {
                return Err("export refused, rerun with --force to export anyway".into());
            }

            let vocabulary = config.vocabulary()?;
            let path = output.unwrap_or_else(|| default_csv_path(handle.path()));
            let result = export_csv(&contents, &vocabulary, &path)?;
            println!(
                "{} wells exported to {}",
                result.rows_exported,
                result.path.display()
            );
        }
        Command::InitConfig { force } => {
            let path = config_path
                .map(Path::to_path_buf)
                .or_else(AnnotatorConfig::default_path)
                .ok_or("could not determine the user config directory, pass --config")?;
            if path.exists() && !force {
                return Err(format!(
                    "{} already exists, rerun with --force to replace it",
                    path.display()
                )
                .into());
            }
            AnnotatorConfig::new().save_to(&path)?;
            println!("configuration written to {}", path.display());
        }
    }
    Ok(())
}

fn status(input: &Path, config: &AnnotatorConfig) -> CliResult {
    let discovery = TierpsyLayout::new(config.preferences.prestim_only);
    let handle = StoreHandle::open_or_create(input, &discovery)?;
    let contents = handle.load()?;
    let progress = Progress::of(&contents);

    println!("store: {}", handle.path().display());
    println!("working directory: {}", contents.working_dir.display());
    println!(
        "videos: {} registered, {} visited",
        progress.files, progress.visited_files
    );
    println!(
        "wells: {} annotated, {} unannotated",
        progress.annotated_wells, progress.unannotated_wells
    );

    if let Some(resolution) = resolve_next(&contents.files, &contents.wells, None) {
        let filename = contents
            .files
            .get(resolution.file_id())
            .map(|r| r.filename.as_str())
            .unwrap_or("?");
        let reason = match resolution {
            Resolution::Unannotated(_) => "has unannotated wells",
            Resolution::Untouched(_) => "not yet opened",
            Resolution::Complete(_) => "every video annotated",
        };
        println!("resume at: {} ({})", filename, reason);
    }
    Ok(())
}
