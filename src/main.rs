use std::fs;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;

use mixsim::config_loader::{apply_overrides, load_config, CliOverrides};
use mixsim::orchestrator::run_experiment;
use mixsim::report::{
    generate_json_report, generate_text_report, print_summary, write_plot_tables,
    ExperimentReport,
};

/// Discrete-event simulator for mix network experiments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the experiment configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for results and plot tables
    #[arg(short, long, default_value = "mixsim_output")]
    output: PathBuf,

    /// Override the number of runs per varying value
    #[arg(long)]
    runs: Option<u32>,

    /// Override the experiment seed
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for independent runs (0 = one per core)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Log level filter, overrides general.log_level
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // The experiment file may carry its own log level, so peek at it before
    // logging is up. Errors are reported properly by load_config below.
    let file_level = fs::read_to_string(&args.config)
        .ok()
        .and_then(|text| serde_yaml::from_str::<mixsim::Config>(&text).ok())
        .and_then(|config| config.general.log_level);
    let level = args
        .log_level
        .clone()
        .or(file_level)
        .unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    info!("Starting MixSim");
    info!("Configuration file: {:?}", args.config);
    info!("Output directory: {:?}", args.output);

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .wrap_err("Failed to configure thread pool")?;
    }

    let mut config = load_config(&args.config)?;
    apply_overrides(
        &mut config,
        &CliOverrides {
            runs: args.runs,
            seed: args.seed,
        },
    )?;

    let results = run_experiment(&config)?;

    fs::create_dir_all(&args.output)
        .wrap_err_with(|| format!("Failed to create output directory {:?}", args.output))?;
    let report = ExperimentReport::from_results(&results)?;
    generate_json_report(&report, &args.output.join("results.json"))?;
    generate_text_report(&report, &args.output.join("report.txt"))?;
    let plots = write_plot_tables(&report, &results, &args.output)?;
    info!("Wrote {} plot tables", plots.len());

    print_summary(&report);
    Ok(())
}
