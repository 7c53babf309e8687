use crate::failure_table::FailureStatus;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::warn;

/// Active-check parameters for one upstream group. Reports into the same
/// four-level `FailureStatus` set (ok/fade/monitor/failed) the rest of the
/// pool uses rather than a binary healthy/unhealthy flag.
#[derive(Debug, Clone)]
pub struct ActiveCheckConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub http_path: String,
    pub healthy_statuses: Vec<u16>,
    pub healthy_successes: u32,
    pub unhealthy_failures: u32,
}

impl Default for ActiveCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(2),
            http_path: "/".to_string(),
            healthy_statuses: vec![200],
            healthy_successes: 2,
            unhealthy_failures: 3,
        }
    }
}

/// Runs active HTTP health probes against a fixed node list on a tokio
/// control-plane task, independent of the monoio data-plane workers
/// (mirrors the split between `worker.rs` and `health_check.rs` in the
/// proxy this crate was generalized from).
#[derive(Clone, Default)]
pub struct HealthChecker {
    statuses: Arc<DashMap<String, FailureStatus>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, addr: &str) -> FailureStatus {
        self.statuses.get(addr).map(|s| *s).unwrap_or(FailureStatus::Ok)
    }

    /// Spawns the polling loop; the returned handle may be aborted on
    /// shutdown.
    pub fn start(&self, group_id: String, nodes: Vec<String>, config: ActiveCheckConfig) -> tokio::task::JoinHandle<()> {
        let statuses = Arc::clone(&self.statuses);
        tokio::spawn(async move {
            let client = match reqwest::Client::builder().timeout(config.timeout).build() {
                Ok(c) => c,
                Err(e) => {
                    warn!(group = %group_id, error = %e, "failed to build health-check client");
                    return;
                }
            };
            let mut tick = interval(config.interval);
            let mut successes: HashMap<String, u32> = HashMap::new();
            let mut failures: HashMap<String, u32> = HashMap::new();

            loop {
                tick.tick().await;
                for node in &nodes {
                    let url = format!("http://{}{}", node, config.http_path);
                    let healthy = match client.get(&url).send().await {
                        Ok(resp) => config.healthy_statuses.contains(&resp.status().as_u16()),
                        Err(_) => false,
                    };

                    if healthy {
                        let count = successes.entry(node.clone()).or_insert(0);
                        *count += 1;
                        failures.insert(node.clone(), 0);
                        if *count >= config.healthy_successes {
                            statuses.insert(node.clone(), FailureStatus::Ok);
                        }
                    } else {
                        let count = failures.entry(node.clone()).or_insert(0);
                        *count += 1;
                        successes.insert(node.clone(), 0);
                        if *count >= config.unhealthy_failures {
                            warn!(group = %group_id, node = %node, "active check marked node Failed");
                            statuses.insert(node.clone(), FailureStatus::Failed);
                        } else if *count > 0 {
                            statuses.insert(node.clone(), FailureStatus::Monitor);
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_node_defaults_to_ok() {
        let hc = HealthChecker::new();
        assert_eq!(hc.status("10.0.0.1:80"), FailureStatus::Ok);
    }

    #[test]
    fn default_config_is_sane() {
        let c = ActiveCheckConfig::default();
        assert!(c.unhealthy_failures > 0);
        assert!(c.healthy_successes > 0);
    }
}
