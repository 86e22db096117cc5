//! In-memory cache of the latest scan's recommendations, periodically
//! refreshed from the datastore.
//!
//! Grounded on `enforcer/resources/recommendation_store.py`: an initial
//! synchronous load at construction, then a periodic background reload
//! that swaps the whole map under a single lock so readers never observe a
//! partially-updated scan.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::datastore::RecommendationsDatastore;
use crate::model::{WorkloadKey, WorkloadRecommendation, WorkloadRecommendationMap};
use crate::recommendation::parse_scan_row;

struct Inner {
    recommendations: WorkloadRecommendationMap,
    scan_id: Option<String>,
}

pub struct RecommendationStore {
    datastore: Arc<dyn RecommendationsDatastore>,
    inner: Mutex<Inner>,
    stop: Arc<Notify>,
}

impl RecommendationStore {
    /// Performs the initial synchronous load and returns the store. Load
    /// failures (e.g. a disabled datastore) are logged and leave the store
    /// empty rather than failing startup, matching the enforcer's
    /// fail-open posture.
    pub async fn new(datastore: Arc<dyn RecommendationsDatastore>) -> Self {
        let store = RecommendationStore {
            datastore,
            inner: Mutex::new(Inner {
                recommendations: WorkloadRecommendationMap::new(),
                scan_id: None,
            }),
            stop: Arc::new(Notify::new()),
        };
        store.reload().await;
        store
    }

    fn store_key(namespace: &str, name: &str, kind: &str) -> WorkloadKey {
        WorkloadKey {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    async fn reload(&self) {
        let current_scan_id = self.inner.lock().unwrap().scan_id.clone();

        let latest = match self
            .datastore
            .get_latest_scan(current_scan_id.as_deref())
            .await
        {
            Ok(latest) => latest,
            Err(e) => {
                error!(error = %e, "failed to reload recommendations");
                return;
            }
        };

        let Some((scan_id, rows)) = latest else {
            return;
        };

        let mut map: WorkloadRecommendationMap = WorkloadRecommendationMap::new();
        for row in &rows {
            let Some((resource, recommendation)) = parse_scan_row(row) else {
                continue;
            };
            let key = Self::store_key(&row.namespace, &row.name, &row.kind);
            let workload = map.entry(key.clone()).or_insert_with(|| WorkloadRecommendation {
                workload_key: key.to_string(),
                container_recommendations: Default::default(),
            });
            let container = workload
                .container_recommendations
                .entry(row.container.clone())
                .or_default();
            if resource == "cpu" {
                container.cpu = Some(recommendation);
            } else {
                container.memory = Some(recommendation);
            }
        }

        let mut inner = self.inner.lock().unwrap();
        debug!(workloads = map.len(), scan_id = %scan_id, "recommendations reloaded");
        inner.recommendations = map;
        inner.scan_id = Some(scan_id);
        info!("recommendations reloaded successfully");
    }

    pub fn get_recommendations(&self, namespace: &str, name: &str, kind: &str) -> Option<WorkloadRecommendation> {
        let inner = self.inner.lock().unwrap();
        inner
            .recommendations
            .get(&Self::store_key(namespace, name, kind))
            .cloned()
    }

    /// Spawns the periodic reload task. Returns a handle that, when
    /// dropped alongside a `stop()` call, lets the task exit cleanly.
    pub fn spawn_periodic_reload(self: &Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let stop = Arc::clone(&self.stop);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        store.reload().await;
                    }
                    _ = stop.notified() => break,
                }
            }
        })
    }

    pub fn stop(&self) {
        self.stop.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DatastoreError;
    use crate::recommendation::{ScanRow, ScanValue};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDatastore {
        calls: AtomicUsize,
        scans: Mutex<Vec<Option<(String, Vec<ScanRow>)>>>,
    }

    #[async_trait]
    impl RecommendationsDatastore for FakeDatastore {
        async fn get_latest_scan(
            &self,
            _current_scan_id: Option<&str>,
        ) -> Result<Option<(String, Vec<ScanRow>)>, DatastoreError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            let scans = self.scans.lock().unwrap();
            Ok(scans.get(idx).cloned().flatten())
        }
    }

    fn row(container: &str, resource: &str, request: f64) -> ScanRow {
        ScanRow {
            namespace: "default".into(),
            name: "web".into(),
            kind: "Deployment".into(),
            container: container.into(),
            resource: resource.into(),
            request: ScanValue::Number(request),
            limit: ScanValue::Null,
        }
    }

    #[tokio::test]
    async fn initial_load_populates_map() {
        let datastore = Arc::new(FakeDatastore {
            calls: AtomicUsize::new(0),
            scans: Mutex::new(vec![Some((
                "scan-1".to_string(),
                vec![row("app", "cpu", 0.5), row("app", "memory", 1024.0)],
            ))]),
        });
        let store = RecommendationStore::new(datastore).await;
        let recs = store.get_recommendations("default", "web", "Deployment").unwrap();
        let container = recs.get("app").unwrap();
        assert!(container.cpu.is_some());
        assert!(container.memory.is_some());
    }

    #[tokio::test]
    async fn missing_workload_returns_none() {
        let datastore = Arc::new(FakeDatastore {
            calls: AtomicUsize::new(0),
            scans: Mutex::new(vec![None]),
        });
        let store = RecommendationStore::new(datastore).await;
        assert!(store.get_recommendations("default", "ghost", "Deployment").is_none());
    }
}
