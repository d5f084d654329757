use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Local;
use env_logger::{fmt::Formatter, Builder, Env, Logger, Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};

use crate::Result;

/// Sends every record to the run's log file and errors to stderr as well.
struct TeeLogger {
    file: Logger,
    console: Logger,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.file.enabled(metadata) || self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.file.matches(record) {
            self.file.log(record);
        }
        if self.console.matches(record) {
            self.console.log(record);
        }
    }

    fn flush(&self) {
        self.file.flush();
        self.console.flush();
    }
}

fn format_line(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    writeln!(
        buf,
        "{} - {} - {} - {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        record.target(),
        record.level(),
        record.args()
    )
}

/// Installs the global logger. `RUST_LOG` narrows the file output, which defaults to `debug`.
pub fn init(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let file_logger = Builder::from_env(Env::default().default_filter_or("debug"))
        .format(format_line)
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(file)))
        .build();

    let console_logger = Builder::new()
        .format(format_line)
        .filter_level(LevelFilter::Error)
        .target(Target::Stderr)
        .build();

    let max_level = file_logger.filter().max(console_logger.filter());
    log::set_boxed_logger(Box::new(TeeLogger {
        file: file_logger,
        console: console_logger,
    }))?;
    log::set_max_level(max_level);

    log::info!("Logger initialized, writing to {}", log_path.display());
    Ok(())
}
