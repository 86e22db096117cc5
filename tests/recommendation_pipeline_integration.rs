mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{pod_with_cpu_request, scan_row};
use krr::datastore::RecommendationsDatastore;
use krr::errors::DatastoreError;
use krr::mutation::build_mutation_patch;
use krr::recommendation::ScanRow;
use krr::recommendation_store::RecommendationStore;

// ══════════════════════════════════════════════════════════════════
// Scan row -> RecommendationStore -> admission mutation, end to end
// (no cluster or datastore server required).
// ══════════════════════════════════════════════════════════════════

struct FakeDatastore {
    scan: Mutex<Option<(String, Vec<ScanRow>)>>,
}

#[async_trait]
impl RecommendationsDatastore for FakeDatastore {
    async fn get_latest_scan(
        &self,
        _current_scan_id: Option<&str>,
    ) -> Result<Option<(String, Vec<ScanRow>)>, DatastoreError> {
        Ok(self.scan.lock().unwrap().take())
    }
}

#[tokio::test]
async fn scan_row_flows_through_to_a_mutation_patch() {
    let datastore = Arc::new(FakeDatastore {
        scan: Mutex::new(Some((
            "scan-1".to_string(),
            vec![scan_row("default", "web", "Deployment", "app", "cpu", 0.5)],
        ))),
    });
    let store = RecommendationStore::new(datastore).await;

    let recommendation = store.get_recommendations("default", "web", "Deployment").expect("workload should be cached");

    let pod = pod_with_cpu_request("app", "100m");
    let verdict = build_mutation_patch(&pod, &recommendation);

    assert!(verdict.allowed);
    assert_eq!(verdict.patch_ops.len(), 1);
    assert_eq!(verdict.patch_ops[0]["op"], "replace");
    assert_eq!(verdict.patch_ops[0]["value"]["requests"]["cpu"], "0.5");
}

#[tokio::test]
async fn dropped_rows_never_reach_the_store() {
    let datastore = Arc::new(FakeDatastore {
        scan: Mutex::new(Some((
            "scan-1".to_string(),
            vec![
                scan_row("default", "web", "Deployment", "app", "cpu", 0.0), // zero request, dropped
                scan_row("default", "web", "Deployment", "app", "memory", 512.0 * 1024.0 * 1024.0),
            ],
        ))),
    });
    let store = RecommendationStore::new(datastore).await;

    let recommendation = store.get_recommendations("default", "web", "Deployment").unwrap();
    let container = recommendation.get("app").unwrap();
    assert!(container.cpu.is_none());
    assert!(container.memory.is_some());
}

#[tokio::test]
async fn insignificant_change_produces_no_patch() {
    let datastore = Arc::new(FakeDatastore {
        scan: Mutex::new(Some((
            "scan-1".to_string(),
            vec![scan_row("default", "web", "Deployment", "app", "cpu", 1.01)],
        ))),
    });
    let store = RecommendationStore::new(datastore).await;
    let recommendation = store.get_recommendations("default", "web", "Deployment").unwrap();

    let pod = pod_with_cpu_request("app", "1000m"); // ~1% change, below the 20% threshold
    let verdict = build_mutation_patch(&pod, &recommendation);

    assert!(verdict.allowed);
    assert!(verdict.patch_ops.is_empty());
}

#[tokio::test]
async fn unknown_workload_leaves_pod_untouched() {
    let datastore = Arc::new(FakeDatastore { scan: Mutex::new(None) });
    let store = RecommendationStore::new(datastore).await;
    assert!(store.get_recommendations("default", "ghost", "Deployment").is_none());
}
