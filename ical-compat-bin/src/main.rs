use clap::Parser;
use ical_compat::{export, import, import_reader, ExportError, ParseError, Settings};
use std::{
    ffi::OsStr,
    fs::{read_to_string, File, OpenOptions},
    io::{self, Error as IoError, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use toml::{de::Error as TomlError, from_str};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum Error {
    #[error("Failed to open input calendar: {0}")]
    OpenInput(IoError),
    #[error("Failed to read settings: {0}")]
    OpenSettings(IoError),
    #[error("Failed to deserialize settings: {0}")]
    ParseSettings(#[from] TomlError),
    #[error(transparent)]
    ParseInput(#[from] ParseError),
    #[error("Failed to export calendar: {0}")]
    Export(#[from] ExportError),
    #[error("Failed to open output: {0}")]
    OpenOutput(IoError),
    #[error("Failed to write to output: {0}")]
    WriteOutput(IoError),
}

#[derive(Parser)]
#[command(author, version, about)]
struct Opt {
    /// Path to the input iCalendar file [default: -]
    input: Option<PathBuf>,
    /// Specify path to write the repaired iCalendar to [default: -]
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Settings file in TOML format
    #[arg(long)]
    config: Option<PathBuf>,
    /// Timezone for floating times and unknown timezone identifiers [default: host timezone]
    #[arg(long)]
    default_timezone: Option<String>,
    /// Write timezone definitions as received instead of reducing them
    #[arg(long)]
    no_minify: bool,
    /// Log every correction that is applied
    #[arg(short, long)]
    verbose: bool,
}

impl Opt {
    /// Settings from the configuration file, overridden by the command line.
    fn settings(&self) -> Result<Settings, Error> {
        let mut settings = match &self.config {
            Some(path) => from_str(&read_to_string(path).map_err(Error::OpenSettings)?)?,
            None => Settings::default(),
        };
        if let Some(zone) = &self.default_timezone {
            settings.default_timezone = Some(zone.clone());
        }
        if self.no_minify {
            settings.minify_timezones = false;
        }
        Ok(settings)
    }
}

#[cfg(not(target_family = "unix"))]
fn is_fifo(_: std::fs::FileType) -> bool {
    false
}

/// Named pipes are written without truncation.
#[cfg(target_family = "unix")]
fn is_fifo(file_type: std::fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    file_type.is_fifo()
}

/// Where the repaired calendar goes.
pub(crate) enum Output {
    Stdout(io::Stdout),
    File(File),
    Pipe(File),
}

impl Output {
    /// `-` is stdout. An existing fifo is opened for writing only; anything else is created or
    /// truncated.
    pub(crate) fn new(path: &OsStr) -> io::Result<Self> {
        if path == "-" {
            return Ok(Output::Stdout(io::stdout()));
        }

        let fifo = std::fs::metadata(path).is_ok_and(|metadata| is_fifo(metadata.file_type()));
        if fifo {
            return Ok(Output::Pipe(OpenOptions::new().write(true).open(path)?));
        }
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        Ok(Output::File(file))
    }
}

impl io::Write for Output {
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(stdout) => stdout.flush(),
            Output::Pipe(pipe) => pipe.flush(),
            Output::File(file) => file.flush(),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(stdout) => stdout.write(buf),
            Output::Pipe(pipe) => pipe.write(buf),
            Output::File(file) => file.write(buf),
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn convert() -> Result<(), Error> {
    let opts = Opt::parse();
    init_logging(opts.verbose);

    let settings = opts.settings()?;
    let catalog = settings.catalog();

    let imported = match opts.input.as_deref().filter(|path| *path != Path::new("-")) {
        Some(path) => import(&read_to_string(path).map_err(Error::OpenInput)?, &catalog)?,
        None => import_reader(io::stdin().lock(), &catalog)?,
    };
    for rejected in &imported.rejected {
        warn!(uid = %rejected.uid, error = %rejected.error, "event dropped");
    }

    let mut calendar = export(&imported.events, &imported.timezones, &catalog, &settings)?;
    calendar.properties = imported.properties;
    info!(
        events = calendar.events.len(),
        timezones = calendar.timezones.len(),
        rejected = imported.rejected.len(),
        "converted calendar"
    );

    let mut output = if let Some(output) = opts.output {
        Output::new(output.as_os_str())
    } else {
        Output::new(OsStr::new("-"))
    }
    .map_err(Error::OpenOutput)?;
    write!(output, "{calendar}").map_err(Error::WriteOutput)?;

    Ok(())
}

fn main() {
    if let Err(e) = convert() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
