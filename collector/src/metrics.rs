use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ENTRIES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_entries_total",
        "Total device reports stored"
    ))
    .unwrap();
    pub static ref REJECTED_REPORTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_rejected_reports_total",
        "Total device reports rejected as invalid usage"
    ))
    .unwrap();
    pub static ref GEOCODE_CACHE_HITS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_geocode_cache_hits_total",
        "Total IP lookups answered from previously stored entries"
    ))
    .unwrap();
    pub static ref GEOCODE_API_CALLS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_geocode_api_calls_total",
        "Total requests sent to the IP geolocation API"
    ))
    .unwrap();
    pub static ref GEOCODE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_geocode_failures_total",
        "Total IP lookups that ended without a location"
    ))
    .unwrap();
    pub static ref BACKFILLS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_backfills_total",
        "Total stored entries enriched with a location on read"
    ))
    .unwrap();
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_db_failures_total",
        "Total store operations that failed"
    ))
    .unwrap();
    pub static ref QUERY_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "collector_query_latency_seconds",
            "Time taken to answer a range query, backfill included"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(ENTRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REJECTED_REPORTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GEOCODE_CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GEOCODE_API_CALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GEOCODE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKFILLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DB_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUERY_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
