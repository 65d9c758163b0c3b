// src/monitor/http.rs

use std::sync::Arc;
use tracing::{info, warn};
use warp::Filter;

use super::Metrics;

fn routes(
    metrics: Arc<Metrics>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let metrics_route = warp::path("metrics").map(move || metrics.to_prometheus());
    let health_route = warp::path("health").map(|| "OK");
    metrics_route.or(health_route)
}

/// 只读 HTTP 端点：/metrics 暴露 Prometheus 文本，/health 探活。
/// 端口被占只告警放弃，不影响主服务。
pub async fn serve_metrics(metrics: Arc<Metrics>, port: u16) {
    match warp::serve(routes(metrics)).try_bind_ephemeral(([127, 0, 0, 1], port)) {
        Ok((addr, server)) => {
            info!("metrics endpoint on http://{}/metrics", addr);
            server.await;
        }
        Err(e) => {
            warn!("metrics endpoint on port {} unavailable: {}", port, e);
        }
    }
}
