//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming. Generation calls run from
//! seconds to minutes, so they get their own buckets.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all StudyOwl metrics
pub const METRICS_PREFIX: &str = "studyowl";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    300.0,  // 5m
    600.0,  // 10m
];

/// Buckets for model generation latency
pub const GENERATION_BUCKETS: &[f64] = &[
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
    300.0,  // 5m
    600.0,  // 10m
];

/// Buckets for embedding latency
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Generation metrics
    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total generative model requests"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generative model latency in seconds"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    // Study metrics
    describe_counter!(
        format!("{}_notes_generated_total", METRICS_PREFIX),
        Unit::Count,
        "Total notes generated from uploaded files"
    );

    describe_counter!(
        format!("{}_note_chunks_stored_total", METRICS_PREFIX),
        Unit::Count,
        "Total note chunks embedded and stored"
    );

    describe_counter!(
        format!("{}_quizzes_generated_total", METRICS_PREFIX),
        Unit::Count,
        "Total quizzes generated"
    );

    describe_counter!(
        format!("{}_answers_evaluated_total", METRICS_PREFIX),
        Unit::Count,
        "Total student answers evaluated"
    );

    describe_counter!(
        format!("{}_rate_limited_total", METRICS_PREFIX),
        Unit::Count,
        "Requests rejected by the rate limiter"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a generative model call
pub fn record_generation(duration_secs: f64, model: &str, kind: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string(),
            "kind" => kind.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(batch_size.max(1) as u64);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record generated notes and the chunks stored from them
pub fn record_notes(file_kind: &str, chunks_stored: usize) {
    counter!(
        format!("{}_notes_generated_total", METRICS_PREFIX),
        "file_kind" => file_kind.to_string()
    )
    .increment(1);

    counter!(format!("{}_note_chunks_stored_total", METRICS_PREFIX))
        .increment(chunks_stored as u64);
}

pub fn record_quiz(regenerated: bool, questions: usize) {
    counter!(
        format!("{}_quizzes_generated_total", METRICS_PREFIX),
        "regenerated" => regenerated.to_string(),
        "questions" => questions.to_string()
    )
    .increment(1);
}

pub fn record_answer(question_kind: &str, correct: bool) {
    counter!(
        format!("{}_answers_evaluated_total", METRICS_PREFIX),
        "kind" => question_kind.to_string(),
        "correct" => correct.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, GENERATION_BUCKETS, EMBEDDING_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }

        // Media notes may take the full ten-minute generation timeout
        assert_eq!(GENERATION_BUCKETS.last(), Some(&600.0));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/api/query-bot");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }
}
