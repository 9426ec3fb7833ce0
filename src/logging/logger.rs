//! Logger Module
//!
//! Leveled, context-carrying logger fanning entries out to its outputs.

use std::backtrace::Backtrace;
use std::error::Error;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::config::{Environment, LoggerConfig};
use crate::error::LogResult;
use crate::logging::{
    ConsoleOutput, FileOutput, HttpTransport, LogContext, LogEntry, LogLevel, LogOutput,
    RemoteOutput,
};

type SharedOutputs = Arc<RwLock<Vec<Arc<dyn LogOutput>>>>;

// == Logger ==
/// Structured logger.
///
/// Outputs are shared with every child logger; the context map is owned by
/// each logger. Logging never fails from the caller's point of view: output
/// errors are reported through `tracing` and dropped.
pub struct Logger {
    config: Arc<LoggerConfig>,
    outputs: SharedOutputs,
    context: Mutex<LogContext>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.config.level)
            .field("outputs", &self.output_count())
            .field("context", &*self.context.lock())
            .finish()
    }
}

impl Logger {
    // == Constructors ==
    /// Creates a logger with no outputs.
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config: Arc::new(config),
            outputs: Arc::new(RwLock::new(Vec::new())),
            context: Mutex::new(LogContext::new()),
        }
    }

    /// Creates a logger with the outputs enabled in `config`.
    ///
    /// The remote output needs an endpoint and a tokio runtime for its flush
    /// timer; without an endpoint it is skipped with a warning.
    pub fn from_config(config: LoggerConfig) -> Self {
        let mut outputs: Vec<Arc<dyn LogOutput>> = Vec::new();

        if config.enable_console {
            outputs.push(Arc::new(ConsoleOutput::new(config.colorize)));
        }

        if config.enable_file {
            outputs.push(Arc::new(FileOutput::new(
                config.log_directory.clone(),
                config.max_file_size,
                config.max_files,
            )));
        }

        if config.enable_remote {
            match (&config.remote_endpoint, HttpTransport::new()) {
                (Some(endpoint), Ok(transport)) => {
                    outputs.push(Arc::new(RemoteOutput::new(endpoint.clone(), Arc::new(transport))));
                }
                (None, _) => warn!("Remote logging enabled without an endpoint, skipping"),
                (_, Err(err)) => warn!(error = %err, "Failed to build HTTP log transport"),
            }
        }

        let logger = Self::new(config);
        *logger.outputs.write() = outputs;
        logger
    }

    /// Logger with the environment's default verbosity and outputs.
    pub fn for_environment(environment: Environment) -> Self {
        Self::from_config(LoggerConfig::for_environment(environment))
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Adds an output. Children created before or after see it too.
    pub fn add_output(&self, output: Arc<dyn LogOutput>) {
        self.outputs.write().push(output);
    }

    pub fn output_count(&self) -> usize {
        self.outputs.read().len()
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.config.level
    }

    // == Context ==
    /// Merges `context` into this logger's context.
    pub fn set_context(&self, context: LogContext) {
        self.context.lock().extend(context);
    }

    pub fn clear_context(&self) {
        self.context.lock().clear();
    }

    pub fn context(&self) -> LogContext {
        self.context.lock().clone()
    }

    /// Logger sharing this one's outputs, starting from this logger's
    /// context merged with `context`.
    pub fn child(&self, context: LogContext) -> Logger {
        let mut merged = self.context();
        merged.extend(context);

        Logger {
            config: Arc::clone(&self.config),
            outputs: Arc::clone(&self.outputs),
            context: Mutex::new(merged),
        }
    }

    // == Core ==
    /// Emits `message` at `level` unless the level is filtered out.
    pub async fn log(&self, level: LogLevel, message: &str, context: Option<LogContext>) {
        self.emit(level, message, context, |_| {}).await;
    }

    async fn emit<F>(&self, level: LogLevel, message: &str, context: Option<LogContext>, decorate: F)
    where
        F: FnOnce(&mut LogEntry) + Send,
    {
        if !self.is_enabled(level) {
            return;
        }

        let mut entry = self.build_entry(level, message, context);
        decorate(&mut entry);
        self.dispatch(&entry).await;
    }

    fn build_entry(&self, level: LogLevel, message: &str, context: Option<LogContext>) -> LogEntry {
        let context = if self.config.include_context {
            let mut merged = self.context();
            if let Some(call_site) = context {
                merged.extend(call_site);
            }
            Some(merged).filter(|m| !m.is_empty())
        } else {
            None
        };

        let lift = |key: &str| {
            context
                .as_ref()
                .and_then(|c| c.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let user_id = lift("userId");
        let session_id = lift("sessionId");
        let request_id = lift("requestId");

        let stack_trace = (self.config.include_stack_trace && level >= LogLevel::Error)
            .then(|| Backtrace::force_capture().to_string());

        LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            context,
            source: self.config.source.clone(),
            user_id,
            session_id,
            request_id,
            stack_trace,
            tags: Vec::new(),
        }
    }

    /// Writes `entry` to every output concurrently and reports failures.
    async fn dispatch(&self, entry: &LogEntry) {
        let outputs: Vec<Arc<dyn LogOutput>> = self.outputs.read().clone();

        let writes = outputs.iter().map(|output| async move {
            let result = AssertUnwindSafe(output.write(entry)).catch_unwind().await;
            (output.name().to_string(), result)
        });

        for (name, result) in join_all(writes).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(output = %name, error = %err, "Log output failed to write entry"),
                Err(_) => error!(output = %name, "Log output panicked while writing entry"),
            }
        }
    }

    // == Level Helpers ==
    pub async fn debug(&self, message: &str, context: Option<LogContext>) {
        self.log(LogLevel::Debug, message, context).await;
    }

    pub async fn info(&self, message: &str, context: Option<LogContext>) {
        self.log(LogLevel::Info, message, context).await;
    }

    pub async fn warn(&self, message: &str, context: Option<LogContext>) {
        self.log(LogLevel::Warn, message, context).await;
    }

    /// Logs at ERROR; `error`'s name, message and cause chain go under the
    /// `error` context key.
    pub fn error<'a>(
        &'a self,
        message: &'a str,
        error: Option<&(dyn Error + 'static)>,
        context: Option<LogContext>,
    ) -> impl Future<Output = ()> + Send + 'a {
        let context = if self.is_enabled(LogLevel::Error) {
            with_error(context, error)
        } else {
            context
        };
        self.log(LogLevel::Error, message, context)
    }

    pub fn critical<'a>(
        &'a self,
        message: &'a str,
        error: Option<&(dyn Error + 'static)>,
        context: Option<LogContext>,
    ) -> impl Future<Output = ()> + Send + 'a {
        let context = if self.is_enabled(LogLevel::Critical) {
            with_error(context, error)
        } else {
            context
        };
        self.log(LogLevel::Critical, message, context)
    }

    // == Semantic Helpers ==
    /// Records how long an operation took.
    pub async fn performance(&self, operation: &str, duration_ms: f64, context: Option<LogContext>) {
        if !self.is_enabled(LogLevel::Info) {
            return;
        }

        let mut ctx = context.unwrap_or_default();
        ctx.insert("type".to_string(), json!("performance"));
        ctx.insert("operation".to_string(), json!(operation));
        ctx.insert("duration".to_string(), json!(duration_ms));

        let message = format!("Performance: {} took {:.2}ms", operation, duration_ms);
        self.emit(LogLevel::Info, &message, Some(ctx), |entry| {
            entry.tags.push("performance".to_string());
        })
        .await;
    }

    /// Records something a user did.
    pub async fn user_action(&self, action: &str, user_id: Option<&str>, context: Option<LogContext>) {
        if !self.is_enabled(LogLevel::Info) {
            return;
        }

        let mut ctx = context.unwrap_or_default();
        ctx.insert("type".to_string(), json!("user_action"));
        ctx.insert("action".to_string(), json!(action));

        let user_id = user_id.map(str::to_string);
        let message = format!("User action: {}", action);
        self.emit(LogLevel::Info, &message, Some(ctx), move |entry| {
            if user_id.is_some() {
                entry.user_id = user_id;
            }
            entry.tags.push("user_action".to_string());
        })
        .await;
    }

    pub async fn system_event(&self, event: &str, context: Option<LogContext>) {
        if !self.is_enabled(LogLevel::Info) {
            return;
        }

        let mut ctx = context.unwrap_or_default();
        ctx.insert("type".to_string(), json!("system_event"));
        ctx.insert("event".to_string(), json!(event));

        let message = format!("System event: {}", event);
        self.emit(LogLevel::Info, &message, Some(ctx), |entry| {
            entry.tags.push("system_event".to_string());
        })
        .await;
    }

    /// Records an API request: WARN for status 400 and above, INFO otherwise.
    pub async fn api_request(
        &self,
        method: &str,
        path: &str,
        status_code: u16,
        duration_ms: f64,
        context: Option<LogContext>,
    ) {
        let level = if status_code >= 400 {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };
        if !self.is_enabled(level) {
            return;
        }

        let mut ctx = context.unwrap_or_default();
        ctx.insert("type".to_string(), json!("api_request"));
        ctx.insert("method".to_string(), json!(method));
        ctx.insert("path".to_string(), json!(path));
        ctx.insert("statusCode".to_string(), json!(status_code));
        ctx.insert("duration".to_string(), json!(duration_ms));

        let message = format!("{} {} {} - {:.2}ms", method, path, status_code, duration_ms);
        self.emit(level, &message, Some(ctx), |entry| {
            entry.tags.push("api_request".to_string());
        })
        .await;
    }

    /// Times `work`, logging its duration on success or an error with the
    /// duration on failure. The result is passed through unchanged.
    pub async fn measure<F, T, E>(&self, operation: &str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let started = Instant::now();
        let result = work.await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => self.performance(operation, duration_ms, None).await,
            Err(err) => {
                let mut ctx = LogContext::new();
                ctx.insert("operation".to_string(), json!(operation));
                ctx.insert("duration".to_string(), json!(duration_ms));
                let message = format!("Operation failed: {}", operation);
                self.error(&message, Some(err), Some(ctx)).await;
            }
        }

        result
    }

    // == Lifecycle ==
    /// Flushes every output, reporting failures.
    pub async fn flush(&self) {
        let outputs: Vec<Arc<dyn LogOutput>> = self.outputs.read().clone();
        let flushes = outputs
            .iter()
            .map(|output| async move { (output.name().to_string(), output.flush().await) });
        report_failures("flush", join_all(flushes).await);
    }

    /// Closes every output, reporting failures.
    pub async fn close(&self) {
        let outputs: Vec<Arc<dyn LogOutput>> = self.outputs.read().clone();
        let closes = outputs
            .iter()
            .map(|output| async move { (output.name().to_string(), output.close().await) });
        report_failures("close", join_all(closes).await);
    }
}

fn report_failures(operation: &str, results: Vec<(String, LogResult<()>)>) {
    for (name, result) in results {
        if let Err(err) = result {
            error!(output = %name, error = %err, "Log output failed to {}", operation);
        }
    }
}

/// Adds `{error: {name, message, stack}}` to the context when an error is
/// given.
fn with_error(context: Option<LogContext>, error: Option<&(dyn Error + 'static)>) -> Option<LogContext> {
    let Some(error) = error else {
        return context;
    };

    let mut causes = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        causes.push(format!("caused by: {}", cause));
        source = cause.source();
    }

    let mut ctx = context.unwrap_or_default();
    ctx.insert(
        "error".to_string(),
        json!({
            "name": error_name(error),
            "message": error.to_string(),
            "stack": if causes.is_empty() { Value::Null } else { Value::String(causes.join("\n")) },
        }),
    );
    Some(ctx)
}

/// Leading identifier of the error's `Debug` form, e.g. `NotFound` for
/// `NotFound("key")`.
fn error_name(error: &dyn Error) -> String {
    let debug = format!("{:?}", error);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}
