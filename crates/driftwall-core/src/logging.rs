//! Process-wide logger setup for the daemon and the CLI.

use env_logger::{fmt::Formatter, Builder, Env};
use log::Record;
use serde_json::json;
use std::env;
use std::io::{self, Write};
use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

const FORMAT_ENV: &str = "DRIFTWALL_LOG_FORMAT";
const LEVEL_ENV: &str = "DRIFTWALL_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Plain,
}

impl LogFormat {
    /// Anything but `plain` (any case) keeps JSON.
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case("plain") => LogFormat::Plain,
            _ => LogFormat::Json,
        }
    }
}

/// Install the global logger once; later calls do nothing.
///
/// `RUST_LOG` wins when set. Otherwise `DRIFTWALL_LOG_LEVEL`, then
/// `default_level`. Output is one JSON object per line unless
/// `DRIFTWALL_LOG_FORMAT=plain`.
pub fn init(default_level: &str) {
    INIT.get_or_init(|| install(default_level));
}

fn install(default_level: &str) {
    let level = env::var(LEVEL_ENV).unwrap_or_else(|_| default_level.to_string());
    let format = LogFormat::parse(env::var(FORMAT_ENV).ok().as_deref());

    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    match format {
        LogFormat::Json => builder.format(write_json),
        LogFormat::Plain => builder.format(write_plain),
    };

    if let Err(err) = builder.try_init() {
        eprintln!("driftwall: logger already installed: {err}");
    }
}

fn write_json(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    let line = json!({
        "ts": buf.timestamp().to_string(),
        "level": record.level().as_str().to_ascii_lowercase(),
        "target": record.target(),
        "msg": record.args().to_string(),
    });
    writeln!(buf, "{line}")
}

fn write_plain(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    writeln!(
        buf,
        "{} {:<5} [{}] {}",
        buf.timestamp(),
        record.level(),
        record.target(),
        record.args()
    )
}
