use opentelemetry::metrics::Histogram;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub operation_latency: Histogram<f64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("tessera_indexer");

        let operation_latency = meter
            .f64_histogram("tessera_indexer_operation_latency_ms")
            .with_description("Latency of indexer operations in milliseconds")
            .build();

        Metrics { operation_latency }
    }

    pub fn record_operation(&self, operation_name: &str, succeeded: bool, latency_ms: f64) {
        self.operation_latency.record(
            latency_ms,
            &[
                opentelemetry::KeyValue::new("operation", operation_name.to_string()),
                opentelemetry::KeyValue::new(
                    "outcome",
                    if succeeded { "success" } else { "error" },
                ),
            ],
        );
    }
}
