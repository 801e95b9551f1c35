//! Log subsystem (spec 4.D): eleven numeric severities, a message emitted
//! iff its level is at or above a runtime-changeable threshold, written
//! through a runtime-changeable sink (a file, or stdout via `"-"`), with
//! a runtime-changeable gmt/local timestamp.
//!
//! Built on `tracing` + `tracing-subscriber`, mirroring the teacher's
//! `src/log.rs`: the rollerd-specific numeric level rides along as a
//! structured field on an ordinary `tracing` event, and the fixed,
//! externally-contracted line format (`"{Mmm DD HH:MM:SS}: {field}:
//! {msg}"`, spec.md §4.D) is produced by a custom `FormatEvent` rather
//! than `tracing-subscriber`'s default one — the teacher reaches for the
//! same trait when its default formatting isn't good enough (its own
//! hand-rolled `Syslog` layer in the same file).

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use camino::Utf8Path;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer as FmtWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogLevel, LogTz};

/// A dynamically swappable log sink: a file, or stdout when the
/// configured path is the literal string `"-"`.
#[derive(Clone)]
struct Sink(Arc<Mutex<Box<dyn io::Write + Send>>>);

impl Sink {
    fn new(writer: Box<dyn io::Write + Send>) -> Self {
        Self(Arc::new(Mutex::new(writer)))
    }

    fn replace(&self, writer: Box<dyn io::Write + Send>) {
        *self.0.lock().unwrap() = writer;
    }
}

struct SinkGuard(Arc<Mutex<Box<dyn io::Write + Send>>>);

impl io::Write for SinkGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

impl<'a> MakeWriter<'a> for Sink {
    type Writer = SinkGuard;
    fn make_writer(&'a self) -> Self::Writer {
        SinkGuard(self.0.clone())
    }
}

fn open_target(path: &Utf8Path) -> io::Result<Box<dyn io::Write + Send>> {
    if path.as_str() == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Box::new(file))
    }
}

/// Pulls the `level` and `field` structured fields and the formatted
/// message back out of a `tracing::Event`.
#[derive(Default)]
struct Extract {
    level: Option<i64>,
    field: Option<String>,
    message: Option<String>,
}

impl Visit for Extract {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "level" {
            self.level = Some(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "rollerd_field" => self.field = Some(value.to_string()),
            "message" => self.message = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // `%value` (Display-wrapped) fields forward their Debug impl to
        // Display, so this never introduces the quoting `{:?}` would add
        // for a bare `&str`.
        match field.name() {
            "rollerd_field" => self.field = Some(format!("{value:?}")),
            "message" => self.message = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

struct RollerdFormat {
    threshold: Arc<AtomicI64>,
    local: Arc<AtomicBool>,
}

impl<S, N> FormatEvent<S, N> for RollerdFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: FmtWriter<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut extract = Extract::default();
        event.record(&mut extract);

        let level = extract.level.unwrap_or(LogLevel::Info.as_i32() as i64);
        if level < self.threshold.load(Ordering::Relaxed) {
            return Ok(());
        }

        let stamp = if self.local.load(Ordering::Relaxed) {
            jiff::Zoned::now().strftime("%b %d %H:%M:%S").to_string()
        } else {
            jiff::Timestamp::now()
                .to_zoned(jiff::tz::TimeZone::UTC)
                .strftime("%b %d %H:%M:%S")
                .to_string()
        };

        let field = extract.field.as_deref().unwrap_or("rollerd");
        let message = extract.message.as_deref().unwrap_or("");
        writeln!(writer, "{stamp}: {field}: {message}")
    }
}

/// The process-wide log sink and its runtime-mutable settings.
pub struct Logger {
    threshold: Arc<AtomicI64>,
    local: Arc<AtomicBool>,
    sink: Sink,
}

impl Logger {
    /// Installs the global `tracing` subscriber and returns a leaked,
    /// `'static` handle to it, matching the teacher's `Logger::launch`
    /// (both need `'static` lifetime: the subscriber it installs is
    /// itself process-global).
    pub fn launch(
        initial_level: LogLevel,
        initial_tz: LogTz,
        initial_target: &Utf8Path,
    ) -> io::Result<&'static Logger> {
        let threshold = Arc::new(AtomicI64::new(initial_level.as_i32() as i64));
        let local = Arc::new(AtomicBool::new(matches!(initial_tz, LogTz::Local)));
        let sink = Sink::new(open_target(initial_target)?);

        let format = RollerdFormat {
            threshold: threshold.clone(),
            local: local.clone(),
        };
        let layer = tracing_subscriber::fmt::layer()
            .event_format(format)
            .with_writer(sink.clone())
            .with_ansi(false);

        tracing_subscriber::registry().with(layer).init();

        Ok(Box::leak(Box::new(Logger { threshold, local, sink })))
    }

    pub fn set_level(&self, level: LogLevel) {
        self.threshold.store(level.as_i32() as i64, Ordering::Relaxed);
    }

    pub fn set_tz(&self, tz: LogTz) {
        self.local.store(matches!(tz, LogTz::Local), Ordering::Relaxed);
    }

    pub fn set_target(&self, path: &Utf8Path) -> io::Result<()> {
        let writer = open_target(path)?;
        self.sink.replace(writer);
        Ok(())
    }

    /// Emits one message at `level`, tagged with `field` (the original
    /// tool's per-subsystem label, e.g. a zone name or `"rollerd"`).
    pub fn log(&self, level: LogLevel, field: &str, args: fmt::Arguments<'_>) {
        tracing::event!(Level::INFO, level = level.as_i32() as i64, rollerd_field = %field, "{}", args);
    }
}

/// Convenience wrapper so call sites read like `log!(logger, Phase,
/// zonename, "KSK phase {n}")` instead of threading `format_args!`
/// through by hand.
#[macro_export]
macro_rules! rlog {
    ($logger:expr, $level:expr, $field:expr, $($arg:tt)+) => {
        $logger.log($level, $field, format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_target_dash_is_stdout() {
        let writer = open_target(Utf8Path::new("-")).unwrap();
        drop(writer);
    }

    #[test]
    fn open_target_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("nested/log.txt")).unwrap();
        let writer = open_target(&path);
        assert!(writer.is_ok());
        assert!(path.exists());
    }
}
