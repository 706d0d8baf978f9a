//! Logging, metric names and process signals for the server binary

use tracing_subscriber::EnvFilter;

pub const REQUESTS_TOTAL: &str = "emotion_requests_total";
pub const PREDICTIONS_TOTAL: &str = "emotion_predictions_total";
pub const ERRORS_TOTAL: &str = "emotion_errors_total";
pub const INFERENCE_LATENCY_US: &str = "emotion_inference_latency_us";

/// Register help text for every metric the handlers record
pub fn describe_metrics() {
    metrics::describe_counter!(
        REQUESTS_TOTAL,
        "Classification requests received, by endpoint"
    );
    metrics::describe_counter!(PREDICTIONS_TOTAL, "Sentences classified, by emotion label");
    metrics::describe_counter!(ERRORS_TOTAL, "Failed requests, by error kind");
    metrics::describe_histogram!(
        INFERENCE_LATENCY_US,
        metrics::Unit::Microseconds,
        "Time from dispatch to scored prediction"
    );
}

/// Directives used when `RUST_LOG` is unset
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "emotion_server=debug,emotion_classifier=debug,tower_http=debug"
    } else {
        "emotion_server=info,emotion_classifier=info"
    }
}

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over `--verbose`.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve once SIGINT or SIGTERM arrives, naming the signal.
///
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal;

    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::warn!("Ctrl+C handler unavailable: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_described_metrics_render_help() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            metrics::counter!(REQUESTS_TOTAL, "endpoint" => "emotion").increment(1);
            metrics::counter!(ERRORS_TOTAL, "kind" => "encoding").increment(1);
        });

        let rendered = handle.render();
        assert!(rendered.contains("# HELP emotion_requests_total"));
        assert!(rendered.contains("# HELP emotion_errors_total"));
        assert!(rendered.contains(r#"emotion_requests_total{endpoint="emotion"} 1"#));
    }

    #[test]
    fn test_default_directives_cover_both_crates() {
        for verbose in [false, true] {
            let directives = default_directives(verbose);
            assert!(directives.contains("emotion_server="));
            assert!(directives.contains("emotion_classifier="));
            assert!(EnvFilter::try_new(directives).is_ok());
        }
        assert!(default_directives(true).contains("tower_http=debug"));
    }
}
