use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_sessions_total",
        "Total number of quiz sessions by terminal status",
        &["status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "quiz_sessions_active",
        "Number of currently active quiz sessions"
    )
    .unwrap();

    pub static ref QUESTIONS_ISSUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_issued_total",
        "Total number of questions issued",
        &["mode"]
    )
    .unwrap();

    pub static ref ANSWERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_total",
        "Total number of question resolutions",
        &["outcome"]
    )
    .unwrap();

    pub static ref OUTBOUND_SEND_TOTAL: IntCounterVec = register_int_counter_vec!(
        "outbound_send_total",
        "Total number of outbound deliveries",
        &["status"]
    )
    .unwrap();

    pub static ref REMINDER_WORKER_TICKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reminder_worker_ticks_total",
        "Total number of reminder worker ticks",
        &["status"]
    )
    .unwrap();

    pub static ref REMINDERS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reminders_sent_total",
        "Total number of reminder nudges",
        &["status"]
    )
    .unwrap();

    pub static ref BROADCAST_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "broadcast_messages_total",
        "Total number of broadcast deliveries",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Record one question resolution by outcome label.
pub fn record_answer(outcome: &str) {
    ANSWERS_TOTAL.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = QUESTIONS_ISSUED_TOTAL.with_label_values(&["random"]).get();
        let _ = ANSWERS_TOTAL.with_label_values(&["correct"]).get();
    }

    #[test]
    fn test_render_metrics() {
        QUESTIONS_ISSUED_TOTAL.with_label_values(&["lightning"]).inc();

        let result = render_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("questions_issued_total"));
    }
}
