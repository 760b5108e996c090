//! Logging setup for sigpack hosts.
//!
//! Library crates log through the `log` facade. [`init_logging`] bridges those
//! records into a `tracing` registry filtered by `RUST_LOG` / `SIGPACK_LOG`,
//! optionally echoes them to stderr, and forwards each event to the hook set
//! with [`set_log_hook`] as a [`DispatchLogRecord`].

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing::Subscriber;
use tracing_log::{LogTracer, NormalizeEvent};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

pub const LOG_ENV_VAR: &str = "SIGPACK_LOG";

#[derive(Debug, Clone, Serialize)]
pub struct DispatchLogRecord {
    pub ts: String,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<JsonValue>,
}

type LogHook = Arc<dyn Fn(&DispatchLogRecord) + Send + Sync>;

static LOG_HOOK: OnceCell<LogHook> = OnceCell::new();

/// Keeps a thread-scoped subscriber alive when a global one was already set.
pub struct LoggingGuard {
    scoped: Option<DefaultGuard>,
}

impl LoggingGuard {
    /// False when this call installed the process-wide subscriber.
    pub fn is_scoped(&self) -> bool {
        self.scoped.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Filter used when neither `RUST_LOG` nor `SIGPACK_LOG` is set
    pub default_level: String,
    /// Also write formatted events to stderr
    pub stderr: bool,
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            stderr: false,
            ansi: false,
        }
    }
}

/// Install the process-wide record hook. Only the first call takes effect.
pub fn set_log_hook<F>(hook: F)
where
    F: Fn(&DispatchLogRecord) + Send + Sync + 'static,
{
    let _ = LOG_HOOK.set(Arc::new(hook));
}

pub fn init_logging(opts: LoggingOptions) -> LoggingGuard {
    // Route log:: macros into tracing
    let _ = LogTracer::init();

    let build_subscriber = || {
        let fmt_layer = opts.stderr.then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(opts.ansi)
                .with_target(true)
        });
        tracing_subscriber::registry()
            .with(env_filter(&opts.default_level))
            .with(HookLayer)
            .with(fmt_layer)
    };

    let guard = match tracing::subscriber::set_global_default(build_subscriber()) {
        Ok(()) => None,
        Err(_) => Some(tracing::subscriber::set_default(build_subscriber())),
    };

    LoggingGuard { scoped: guard }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV_VAR))
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

struct HookLayer;

impl<S> Layer<S> for HookLayer
where
    S: Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let hook = match LOG_HOOK.get() {
            Some(h) => h,
            None => return,
        };

        // Events bridged from `log` carry their real target in `log.*` fields.
        let normalized = event.normalized_metadata();
        let meta = normalized.as_ref().unwrap_or_else(|| event.metadata());

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let record = DispatchLogRecord {
            ts: now_rfc3339(),
            level: meta.level().to_string(),
            target: meta.target().to_string(),
            message: visitor.message.unwrap_or_else(|| meta.name().to_string()),
            fields: visitor
                .fields
                .filter(|obj| obj.as_object().map(|m| !m.is_empty()).unwrap_or(false)),
        };

        hook(&record);
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Option<JsonValue>,
}

impl JsonVisitor {
    fn insert(&mut self, field: &tracing::field::Field, value: JsonValue) {
        if field.name().starts_with("log.") {
            return;
        }
        let obj = self
            .fields
            .get_or_insert_with(|| JsonValue::Object(Default::default()));
        if let JsonValue::Object(map) = obj {
            map.insert(field.name().to_string(), value);
        }
    }
}

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.insert(field, JsonValue::String(text));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, JsonValue::String(value.to_string()));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.insert(field, JsonValue::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.insert(field, JsonValue::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.insert(field, JsonValue::Bool(value));
    }
}
