use crate::config::AppConfig;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber; keep the guard alive for the process lifetime
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // sqlx logs every statement at info; keep it quiet unless asked
    let filter_str = format!("{},sqlx=warn", config.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    subscriber(filter, config.use_json, non_blocking, std::io::stderr).init();

    guard
}

/// File layer (JSON or text) plus the stderr layer, which is attached in both modes
fn subscriber<F, E>(
    filter: EnvFilter,
    use_json: bool,
    file_writer: F,
    stderr_writer: E,
) -> impl Subscriber + Send + Sync + 'static
where
    F: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (json_layer, text_layer) = if use_json {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(file_writer)
            .with_ansi(false);
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .with_target(false)
            .with_writer(file_writer)
            .with_ansi(false);
        (None, Some(layer))
    };

    // CLI output goes to stdout; diagnostics go to stderr
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .with_writer(stderr_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(stderr_layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn emit(use_json: bool) -> (String, String) {
        let file = Captured::default();
        let stderr = Captured::default();
        let subscriber = subscriber(
            EnvFilter::new("info"),
            use_json,
            file.clone(),
            stderr.clone(),
        );
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(kind = "INSUFFICIENT_FUNDS", "Transfer rejected");
        });
        (file.contents(), stderr.contents())
    }

    #[test]
    fn test_json_mode_keeps_stderr_diagnostics() {
        let (file, stderr) = emit(true);
        assert!(file.contains("\"message\":\"Transfer rejected\""), "file: {}", file);
        assert!(stderr.contains("Transfer rejected"), "stderr: {}", stderr);
    }

    #[test]
    fn test_text_mode_writes_file_and_stderr() {
        let (file, stderr) = emit(false);
        assert!(file.contains("Transfer rejected"));
        assert!(!file.contains("\"message\""));
        assert!(stderr.contains("Transfer rejected"));
    }
}
