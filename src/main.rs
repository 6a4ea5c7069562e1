use std::{fs::OpenOptions, process::ExitCode, sync::Mutex};

use clap::Parser;
use crossbeam_channel::bounded;
use hline_survey::{
    analysis::SpectrumAnalyzer,
    args::{convert_filter, Args},
    clock::SystemClock,
    collaborators::Collaborators,
    config::RunConfig,
    coordinates::AltAzResolver,
    datafile::JsonPersister,
    error::{Error, Stage},
    observation::{ObservationLoop, RunSummary},
    planner,
    plot::CsvPlotter,
    sdr,
};
use tracing::{error, info, warn};

fn init_logging(args: &Args) -> std::io::Result<()> {
    let subscriber =
        tracing_subscriber::fmt().with_max_level(convert_filter(args.verbose.log_level_filter()));
    match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => subscriber.init(),
    }
    Ok(())
}

fn run(args: &Args) -> hline_survey::Result<RunSummary> {
    let mut config = RunConfig::load(&args.config)?;
    if let Some(mode) = args.mode_override() {
        config = config.with_mode(mode);
    }
    // Nothing touches the device until the plan is known to be good
    let plan = planner::plan(&config)?;
    info!(
        mode = ?config.mode(),
        windows = plan.len(),
        "Planned run"
    );

    let mut sdr = sdr::open_device(config.device(), args.seed).map_err(|source| {
        Error::Collaborator {
            stage: Stage::Device,
            source,
        }
    })?;

    // First ^C stops after the current window, a second one exits right away
    let (stop_tx, stop_rx) = bounded(1);
    if let Err(e) = ctrlc::set_handler(move || {
        if stop_tx.try_send(()).is_err() {
            std::process::exit(130);
        }
    }) {
        warn!("Could not install stop handler, the run can only be killed: {}", e);
    }

    let mut analyzer = SpectrumAnalyzer::new();
    let mut plotter = CsvPlotter::new();
    let mut persister = JsonPersister::new();
    let collaborators = Collaborators {
        acquirer: &mut sdr,
        resolver: &AltAzResolver,
        analyzer: &mut analyzer,
        plotter: &mut plotter,
        persister: &mut persister,
    };
    ObservationLoop::new(&config, &plan).run(&SystemClock, collaborators, &stop_rx)
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Could not open log file: {}", e);
        return ExitCode::FAILURE;
    }
    match run(&args) {
        Ok(summary) => {
            info!(
                "Completed {} window(s), {} overran",
                summary.windows_completed, summary.overruns
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
