use anyhow::Context;
use clap::Parser;
use sheetmerge::{Cli, MergeError, OutputFormatter, OutputMode, SheetMerge, UserFriendlyError};
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbosity_level()) {
        eprintln!("Warning: {:#}", e);
    }
    tracing::debug!("{}", sheetmerge::build_info());

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let merger = match SheetMerge::from_cli(&cli) {
        Ok(merger) => merger,
        Err(e) => {
            print_startup_error(&e, cli.output_mode());
            return e.exit_code();
        }
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &merger);
    }

    match merger.merge_archives(&cli.inputs).await {
        Ok(report) => {
            if cli.verbosity_level() > 0 && cli.output_mode() != OutputMode::Json {
                merger.output_formatter().print_merge_report(&report);
            }
            0
        }
        Err(e) => {
            merger.handle_error(&e);
            e.exit_code()
        }
    }
}

/// `RUST_LOG` wins; otherwise the level follows `-v`.
fn setup_logging(verbosity: u8) -> anyhow::Result<()> {
    let default_level = match verbosity {
        0 => "sheetmerge=warn",
        1 => "sheetmerge=info",
        2 => "sheetmerge=debug",
        _ => "sheetmerge=trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to initialize logging")
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "sheetmerge.toml".to_string());

    match SheetMerge::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  sheetmerge <archives...> --config {}", config_path);
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, merger: &SheetMerge) -> i32 {
    let formatter = merger.output_formatter();

    formatter.info("DRY RUN MODE - No spreadsheets will be parsed");
    formatter.print_separator();

    let config = merger.config();
    formatter.info("Configuration that would be used:");
    println!("  Extensions: {}", config.filters.extensions.join(", "));
    println!("  Max entry size: {} bytes", config.filters.max_entry_size);
    if config.rows.exclude_substrings.is_empty() {
        println!("  Row exclusion: none");
    } else {
        println!("  Row exclusion: {}", config.rows.exclude_substrings.join(", "));
    }
    println!("  Delimiter: {:?}", config.output.delimiter);
    println!("  Output file: {}", config.output_path().display());

    formatter.print_separator();

    let plan = match merger.plan(&cli.inputs) {
        Ok(plan) => plan,
        Err(e) => {
            merger.handle_error(&e);
            return e.exit_code();
        }
    };

    if plan.is_empty() {
        formatter.error("No archives found in the given inputs");
        return MergeError::EmptyBatch.exit_code();
    }

    let mut unreadable = 0;
    for planned in &plan {
        match &planned.entries {
            Ok(entries) => {
                println!(
                    "  {} ({}): {} spreadsheet(s)",
                    planned.input.name,
                    planned.input.format_size(),
                    entries.len()
                );
                for entry in entries {
                    println!("    - {}", entry.name);
                }
            }
            Err(e) => {
                unreadable += 1;
                formatter.warning(&format!("{}: {}", planned.input.name, e.user_message()));
            }
        }
    }

    if config.output_path().exists() && !cli.force {
        formatter.warning("Output file already exists; the merge would stop unless --force is given");
    }

    formatter.print_separator();
    if unreadable > 0 {
        formatter.warning(&format!("{} archive(s) could not be read", unreadable));
    } else {
        formatter.success("Dry run completed successfully");
    }
    formatter.info("Run without --dry-run to perform the merge");

    0
}

fn print_startup_error(error: &MergeError, mode: OutputMode) {
    let formatter = OutputFormatter::new(mode, 0, false);
    formatter.print_user_friendly_error(error);
}
