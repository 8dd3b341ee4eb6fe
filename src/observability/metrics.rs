//! Prometheus metrics for the completion ledger.
//!
//! Provides metrics for:
//! - Recorded completions and embeddings by model and status
//! - Reported token usage
//! - Upstream latency and time to first token
//! - Ledger write failures and key/provider/model inventory

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::{
    config::MetricsConfig,
    models::{Completion, Embedding, ModelCounts},
};
#[cfg(feature = "prometheus")]
use crate::models::ModelType;

/// Global Prometheus handle for rendering.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
///
/// With a `listen_address`, a scrape endpoint is served from that address.
/// Otherwise the recorder is installed in-process and can be rendered with
/// [`render`].
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = builder(config)?;

    if let Some(addr) = &config.listen_address {
        let addr: std::net::SocketAddr = addr
            .parse()
            .map_err(|e| MetricsError::Setup(format!("Invalid listen address '{addr}': {e}")))?;
        builder.with_http_listener(addr).install()?;
        tracing::info!(%addr, "Prometheus scrape listener started");
    } else {
        let handle = builder.install_recorder()?;
        PROMETHEUS_HANDLE
            .set(handle)
            .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;
    }

    gauge!("nexusgate_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

#[cfg(feature = "prometheus")]
fn builder(config: &MetricsConfig) -> Result<PrometheusBuilder, MetricsError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_seconds".to_string()),
            &seconds_from_ms(&config.latency_buckets_ms),
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))
}

/// Convert millisecond buckets to seconds.
#[cfg(feature = "prometheus")]
fn seconds_from_ms(ms_buckets: &[f64]) -> Vec<f64> {
    ms_buckets.iter().map(|ms| ms / 1000.0).collect()
}

/// Render the in-process metrics in Prometheus text format.
///
/// Returns `None` when metrics are disabled, served by a listener, or the
/// feature is not compiled in.
pub fn render() -> Option<String> {
    #[cfg(feature = "prometheus")]
    {
        PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
    }
    #[cfg(not(feature = "prometheus"))]
    {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record a completion that was persisted to the ledger.
///
/// Token counters only move for counts the upstream actually reported.
pub fn record_completion(completion: &Completion) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "nexusgate_completions_total",
            "model" => completion.model.clone(),
            "status" => completion.status.as_str()
        )
        .increment(1);

        if let Some(prompt) = completion.reported_prompt_tokens() {
            counter!("nexusgate_tokens_prompt_total", "model" => completion.model.clone())
                .increment(prompt);
        }
        if let Some(output) = completion.reported_completion_tokens() {
            counter!("nexusgate_tokens_completion_total", "model" => completion.model.clone())
                .increment(output);
        }

        histogram!("nexusgate_completion_duration_seconds", "model" => completion.model.clone())
            .record(ms_to_secs(completion.duration_ms));
        histogram!("nexusgate_completion_ttft_seconds", "model" => completion.model.clone())
            .record(ms_to_secs(completion.ttft_ms));
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = completion;
    }
}

/// Record an embedding that was persisted to the ledger.
pub fn record_embedding(embedding: &Embedding) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "nexusgate_embeddings_total",
            "model" => embedding.model.clone(),
            "status" => embedding.status.as_str()
        )
        .increment(1);

        if let Some(input) = embedding.reported_input_tokens() {
            counter!("nexusgate_tokens_embedding_total", "model" => embedding.model.clone())
                .increment(input);
        }

        histogram!("nexusgate_embedding_duration_seconds", "model" => embedding.model.clone())
            .record(ms_to_secs(embedding.duration_ms));
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = embedding;
    }
}

/// Record a ledger row that could not be written.
///
/// `table` is the ledger table that rejected the write.
pub fn record_ledger_write_failure(table: &'static str) {
    #[cfg(feature = "prometheus")]
    counter!("nexusgate_ledger_write_failures_total", "table" => table).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = table;
}

/// Update the key, provider and model inventory gauges.
///
/// Every model type gets a series, zero included.
pub fn set_inventory(active_api_keys: i64, providers: i64, models: ModelCounts) {
    #[cfg(feature = "prometheus")]
    {
        gauge!("nexusgate_active_api_keys").set(active_api_keys as f64);
        gauge!("nexusgate_active_providers").set(providers as f64);
        for model_type in [ModelType::Chat, ModelType::Embedding] {
            gauge!("nexusgate_active_models", "type" => model_type.as_str())
                .set(models.get(model_type) as f64);
        }
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (active_api_keys, providers, models);
    }
}

/// Timings are validated non-negative before they reach the ledger.
#[cfg(feature = "prometheus")]
fn ms_to_secs(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

#[cfg(all(test, feature = "prometheus"))]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::models::{CompletionStatus, TOKENS_NOT_REPORTED};

    fn embedding(input_tokens: i32) -> Embedding {
        Embedding {
            id: 1,
            api_key_id: 42,
            upstream_id: None,
            model_id: None,
            model: "text-embedding-3-small".to_string(),
            input: json!({"input": ["hello"]}),
            input_tokens,
            status: CompletionStatus::Success,
            duration_ms: 45,
            created_at: Utc::now(),
        }
    }

    fn completion(prompt_tokens: i32, completion_tokens: i32) -> Completion {
        Completion {
            id: 1,
            api_key_id: 42,
            upstream_id: None,
            model_id: None,
            model: "gpt-4o".to_string(),
            prompt: json!({"messages": []}),
            prompt_tokens,
            completion: json!({}),
            completion_tokens,
            status: CompletionStatus::Success,
            ttft_ms: 120,
            duration_ms: 900,
            created_at: Utc::now(),
        }
    }

    fn render_with(f: impl FnOnce()) -> String {
        let config = MetricsConfig::default();
        let recorder = builder(&config).unwrap().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, f);
        handle.render()
    }

    #[test]
    fn test_record_completion_counts_tokens() {
        let output = render_with(|| record_completion(&completion(12, 30)));

        assert!(output.contains(r#"nexusgate_completions_total{model="gpt-4o",status="success"} 1"#));
        assert!(output.contains(r#"nexusgate_tokens_prompt_total{model="gpt-4o"} 12"#));
        assert!(output.contains(r#"nexusgate_tokens_completion_total{model="gpt-4o"} 30"#));
        assert!(output.contains("nexusgate_completion_duration_seconds_bucket"));
        assert!(output.contains("nexusgate_completion_ttft_seconds_bucket"));
    }

    #[test]
    fn test_unreported_tokens_not_counted() {
        let output = render_with(|| {
            record_completion(&completion(TOKENS_NOT_REPORTED, TOKENS_NOT_REPORTED))
        });

        assert!(output.contains("nexusgate_completions_total"));
        assert!(!output.contains("nexusgate_tokens_prompt_total"));
        assert!(!output.contains("nexusgate_tokens_completion_total"));
    }

    #[test]
    fn test_ledger_write_failure() {
        let output = render_with(|| {
            record_ledger_write_failure("completions");
            record_ledger_write_failure("completions");
            record_ledger_write_failure("logs");
        });

        assert!(output.contains(r#"nexusgate_ledger_write_failures_total{table="completions"} 2"#));
        assert!(output.contains(r#"nexusgate_ledger_write_failures_total{table="logs"} 1"#));
    }

    #[test]
    fn test_record_embedding() {
        let output = render_with(|| {
            record_embedding(&embedding(8));
            record_embedding(&embedding(TOKENS_NOT_REPORTED));
        });

        assert!(output.contains(
            r#"nexusgate_embeddings_total{model="text-embedding-3-small",status="success"} 2"#
        ));
        assert!(
            output.contains(r#"nexusgate_tokens_embedding_total{model="text-embedding-3-small"} 8"#)
        );
        assert!(output.contains("nexusgate_embedding_duration_seconds_bucket"));
        assert!(output.contains("nexusgate_embedding_duration_seconds_count"));
    }

    #[test]
    fn test_inventory_gauges() {
        let output = render_with(|| {
            set_inventory(
                3,
                2,
                ModelCounts {
                    chat: 4,
                    embedding: 0,
                },
            )
        });

        assert!(output.contains("nexusgate_active_api_keys 3"));
        assert!(output.contains("nexusgate_active_providers 2"));
        assert!(output.contains(r#"nexusgate_active_models{type="chat"} 4"#));
        assert!(output.contains(r#"nexusgate_active_models{type="embedding"} 0"#));
    }

    #[test]
    fn test_installed_recorder_renders() {
        let config = MetricsConfig::default();
        init_metrics(&config).unwrap();

        record_ledger_write_failure("embeddings");

        let output = render().expect("recorder installed without a listener");
        assert!(output.contains(r#"nexusgate_info{version=""#));
        assert!(output.contains(r#"nexusgate_ledger_write_failures_total{table="embeddings"} 1"#));
    }

    #[test]
    fn test_seconds_from_ms() {
        assert_eq!(seconds_from_ms(&[100.0, 2500.0]), vec![0.1, 2.5]);
    }
}
