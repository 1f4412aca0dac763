use clap::Parser;
use log::{Level, LevelFilter};
use mbff_tray::*;
use pretty_env_logger::formatted_builder;
use std::process::ExitCode;

/// Clusters single-bit flip-flops of a placed design into multi-bit trays.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Design file to optimize.
    input: String,
    /// Where to write the rewritten design.
    #[arg(short, long)]
    output: Option<String>,
    /// JSON file with engine parameters. Command-line flags override it.
    #[arg(short, long)]
    config: Option<String>,
    #[arg(short = 'j', long)]
    threads: Option<usize>,
    /// Number of clustering trials.
    #[arg(short, long)]
    multistart: Option<usize>,
    /// Worst timing paths used for criticality weighting.
    #[arg(long)]
    num_paths: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum)]
    remainder: Option<RemainderPolicy>,
    /// Abort the search after this many seconds.
    #[arg(long)]
    timeout: Option<f64>,
    /// Write the run summary as JSON.
    #[arg(long)]
    summary_json: Option<String>,
    #[arg(short, long)]
    quiet: bool,
    /// Log intermediate tables after every phase.
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(multistart) = self.multistart {
            config.multistart = multistart;
        }
        if let Some(num_paths) = self.num_paths {
            config.num_paths = num_paths;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(policy) = self.remainder {
            config.remainder_policy = policy;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        config.quiet |= self.quiet;
        config.debug_graphics |= self.debug;
        config.validate()?;
        Ok(config)
    }
}

fn run(args: &Args) -> Result<Summary, EngineError> {
    let config = args.engine_config()?;
    let mut design = DesignContext::from_file(&args.input)?;
    let timing = PathSlackTable::new(design.timing_paths.clone());
    let summary = MBFFG::builder()
        .design(&mut design)
        .timing(&timing)
        .config(config)
        .build()
        .run()?;
    if let Some(path) = &args.output {
        design.write_to(path)?;
        info!(target:"internal", "Design written to {}", path);
    }
    if let Some(path) = &args.summary_json {
        let json = summary.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
    }
    Ok(summary)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.debug {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    formatted_builder().filter_level(level).init();

    let tmr = timer!(Level::Info; "Full MBFF Process");
    let result = run(&args);
    finish!(tmr);
    match result {
        Ok(summary) => {
            println!("{summary}");
            if !summary.issues.is_empty() && !args.quiet {
                println!("{}", summary.issues_table());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".bold().red());
            ExitCode::FAILURE
        }
    }
}
