use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "profiler_api_requests_total",
        "Wallet history requests made, by chain and status."
    );
    describe_histogram!(
        "profiler_api_latency_ms",
        "Wallet history request latency in milliseconds."
    );
    describe_counter!(
        "profiler_fetch_failures_total",
        "Failed fetch attempts, by chain and error kind."
    );
    describe_counter!(
        "profiler_chains_unavailable_total",
        "Chains reported unavailable after exhausting retries."
    );
    describe_counter!(
        "profiler_wallets_total",
        "Wallets processed, by outcome."
    );
}

pub fn install_prometheus(port: u16) -> Result<PrometheusHandle> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    Ok(PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()?)
}
