use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use smc_tradeoff_experiment::config::ExperimentConfig;
use smc_tradeoff_experiment::experiment::run_experiment;
use smc_tradeoff_experiment::report;
use smc_tradeoff_experiment::robot::RobotDescription;

/// Compare inverse dynamics against sliding mode control with several boundary-layer widths.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Opts {
    /// JSON experiment configuration; missing fields keep their defaults.
    #[clap(long)]
    config: Option<PathBuf>,

    /// JSON robot description; the built-in UR5e is used otherwise.
    #[clap(long)]
    robot: Option<PathBuf>,

    /// Directory receiving the results table, plot, traces and videos.
    #[clap(long)]
    output_dir: Option<PathBuf>,

    /// Simulated duration of every trial, in seconds.
    #[clap(long)]
    sim_time: Option<f64>,

    /// Boundary-layer width of a sliding mode trial. Repeat for several trials.
    #[clap(long)]
    phi: Vec<f64>,

    #[clap(long)]
    record_video: bool,

    /// Open a viewer window while trials run.
    #[clap(long)]
    show_viewer: bool,

    /// Write a per-step CSV trace of every trial.
    #[clap(long)]
    save_traces: bool,

    /// Redraw the plot from an existing results table instead of running trials.
    #[clap(long)]
    plot_only: bool,
}

impl Opts {
    fn experiment_config(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => ExperimentConfig::default(),
        };

        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(t) = self.sim_time {
            config.sim_time = t;
        }
        if !self.phi.is_empty() {
            config.boundary_layers = self.phi.clone();
        }
        config.record_video |= self.record_video;
        config.save_traces |= self.save_traces;
        if self.show_viewer {
            config.headless = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn robot_description(&self) -> anyhow::Result<RobotDescription> {
        match &self.robot {
            Some(path) => RobotDescription::from_json_file(path)
                .with_context(|| format!("loading robot description {}", path.display())),
            None => Ok(RobotDescription::ur5e()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("kiss3d=warn".parse()?),
        )
        .init();

    let opts = Opts::parse();
    let config = opts.experiment_config()?;
    let results_path = config.results_path();
    let plot_path = config.plot_path();

    let records = if opts.plot_only {
        report::load(&results_path)
            .with_context(|| format!("reading results from {}", results_path.display()))?
    } else {
        let description = opts.robot_description()?;
        info!(
            robot = %description.name,
            trials = config.boundary_layers.len() + 1,
            "running experiment"
        );

        let records = run_experiment(&config, &description).context("experiment failed")?;
        report::persist(&records, &results_path)?;
        records
    };

    report::render_tradeoff_plot(&records, &plot_path)?;

    println!("=== Completed ===");
    print!("{}", report::summary_table(&records));
    println!("Results: {}", results_path.display());
    println!("Plot:    {}", plot_path.display());
    if config.record_video && !opts.plot_only {
        println!("Videos:  {}", config.output_dir.join(&config.video_dir).display());
    }
    Ok(())
}
