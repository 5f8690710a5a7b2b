use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
static TICK: AtomicUsize = AtomicUsize::new(0);
static LOGGER: ConsoleLogger = ConsoleLogger;

/// Installs the console logger, optionally mirroring everything to `log_file`.
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        *LOG_FILE.lock() = Some(file);
    }
    log::set_logger(&LOGGER).map_err(|err| anyhow::anyhow!("logger already set: {}", err))?;
    log::set_max_level(level);
    Ok(())
}

/// Records the clock tick shown in front of every log line.
pub fn set_tick(tick: usize) {
    TICK.store(tick, Ordering::Relaxed);
}

pub fn print(args: fmt::Arguments) {
    let mut writer = ConsoleWriter;
    let _ = writer.write_fmt(args);
}

fn mirror(line: &str) {
    if let Some(file) = LOG_FILE.lock().as_mut() {
        let _ = file.write_all(line.as_bytes());
    }
}

struct ConsoleWriter;

impl fmt::Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print!("{}", s);
        mirror(s);
        Ok(())
    }
}

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[tick {:>4}] {:<5} {}\n",
            TICK.load(Ordering::Relaxed),
            record.level(),
            record.args()
        );
        eprint!("{}", line);
        mirror(&line);
    }

    fn flush(&self) {
        if let Some(file) = LOG_FILE.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {{
        $crate::console::print(format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kprintln {
    () => {{
        $crate::kprint!("\n");
    }};
    ($($arg:tt)*) => {{
        $crate::kprint!("{}\n", format_args!($($arg)*));
    }};
}
