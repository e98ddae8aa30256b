use std::io::Write;
use std::sync::Once;

use console::style;
use log::{Level, LevelFilter, Metadata, Record};

use crate::env;

struct Logger {
    level: LevelFilter,
}

static INIT: Once = Once::new();

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let prefix = match record.level() {
            Level::Error => style("ERROR").red().bold(),
            Level::Warn => style("WARN").yellow().bold(),
            Level::Info => style("INFO").cyan(),
            Level::Debug => style("DEBUG").blue().dim(),
            Level::Trace => style("TRACE").dim(),
        };
        let mut stderr = std::io::stderr().lock();
        if self.level >= LevelFilter::Debug {
            let _ = writeln!(
                stderr,
                "{} {} {}",
                prefix,
                style(record.target()).dim(),
                record.args()
            );
        } else {
            let _ = writeln!(stderr, "{} {}", prefix, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the stderr logger. `level` overrides `PLUME_LOG` when set.
pub fn init(level: Option<LevelFilter>) {
    INIT.call_once(|| {
        let level = level.unwrap_or(*env::PLUME_LOG);
        let logger = Box::new(Logger { level });
        if log::set_boxed_logger(logger).is_ok() {
            log::set_max_level(level);
        }
    });
}
