use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nmea_recorder::{
    CsvSink, EventRecorder, LineSource, LogSink, Pipeline, Recorder, RecorderKind, Settings,
    SystemClock,
};

const LOGGER_NAME: &str = "gps_logger";
const CSV_NAME: &str = "positions";

fn main() -> Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    fs::create_dir_all(&settings.log_dir)
        .with_context(|| format!("cannot create {}", settings.log_dir.display()))?;

    let day = Utc::now().format("%Y-%m-%d").to_string();
    init_logging(&settings.log_dir, &day)?;

    let recorders = build_recorders(&settings, &day)?;
    let device = File::open(&settings.device)
        .with_context(|| format!("cannot open {}", settings.device.display()))?;
    info!(device = %settings.device.display(), "reading sentences");

    Pipeline::new(recorders, SystemClock)
        .echo(settings.echo)
        .poll(settings.poll)
        .run(LineSource::new(BufReader::new(device)));

    Ok(())
}

/// Logs to stderr and to a dated file in `dir`. `RUST_LOG` overrides the
/// default `debug` filter.
fn init_logging(dir: &Path, day: &str) -> Result<()> {
    let path = dir.join(format!("{}.{}.log", LOGGER_NAME, day));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
    Ok(())
}

fn build_recorders(settings: &Settings, day: &str) -> Result<Vec<Box<dyn Recorder>>> {
    let mut recorders: Vec<Box<dyn Recorder>> = Vec::new();
    for kind in &settings.recorders {
        match kind {
            RecorderKind::Log => recorders.push(Box::new(EventRecorder::new(
                settings.throttle_config(),
                SystemClock,
                LogSink,
            ))),
            RecorderKind::Csv => {
                let path = settings.log_dir.join(format!("{}.{}.csv", CSV_NAME, day));
                let sink = CsvSink::append(&path)
                    .with_context(|| format!("cannot open {}", path.display()))?;
                info!(path = %path.display(), "recording positions");
                recorders.push(Box::new(EventRecorder::new(
                    settings.throttle_config(),
                    SystemClock,
                    sink,
                )));
            }
        }
    }
    Ok(recorders)
}
