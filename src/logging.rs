// ABOUTME: Tracing setup with a JSON-lines log file and an optional host callback
// ABOUTME: Each event becomes {"timestamp","level","module","message"} on its own line

use anyhow::{Context as _, Result};
use std::fmt::Write as FmtWrite;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default JSON-lines log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "log.json";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Receives every formatted log message
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct LogOptions {
    /// JSON-lines file; `None` uses [`DEFAULT_LOG_FILE`]
    pub file: Option<PathBuf>,
    pub callback: Option<LogCallback>,
}

/// A tracing layer writing one JSON object per event
pub struct JsonLinesLayer {
    writer: Mutex<Box<dyn Write + Send>>,
    callback: Option<LogCallback>,
}

impl JsonLinesLayer {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            callback: None,
        }
    }

    /// Append to `path`, creating it when missing
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }

    pub fn with_callback(mut self, callback: LogCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl<S> Layer<S> for JsonLinesLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::new();
        event.record(&mut visitor);
        let message = visitor.finish();

        let metadata = event.metadata();
        let entry = serde_json::json!({
            "timestamp": chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            "level": metadata.level().to_string().to_lowercase(),
            "module": metadata.target(),
            "message": &message,
        });

        // Logging never fails the caller
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", entry);
            let _ = writer.flush();
        }

        if let Some(callback) = &self.callback {
            callback(&message);
        }
    }
}

/// Install the global subscriber: env filter, stderr output, JSON-lines file
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_logging(options: LogOptions) -> Result<()> {
    let path = options
        .file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

    let mut json_layer = JsonLinesLayer::open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    if let Some(callback) = options.callback {
        json_layer = json_layer.with_callback(callback);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(json_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Collects the `message` field, followed by any other fields as `name=value`
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn new() -> Self {
        Self {
            message: String::new(),
            fields: String::new(),
        }
    }

    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        let _ = write!(self.fields, " {}={}", name, value);
    }

    fn finish(mut self) -> String {
        self.message.push_str(&self.fields);
        self.message.trim_start().to_string()
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field.name(), &format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), &value);
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push_field(field.name(), &value);
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push_field(field.name(), &value);
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push_field(field.name(), &value);
    }
}
