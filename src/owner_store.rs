//! Tracks ReplicaSet -> owning-controller (Deployment/Rollout/...) links so
//! the admission webhook can resolve a bare Pod's owning workload without an
//! API round trip on every request.
//!
//! Grounded on `enforcer/resources/owner_store.py`: a mutex-guarded map
//! keyed by `namespace/rs_name`, tombstoned on ReplicaSet DELETE and reaped
//! after a grace period, with a non-blocking try-lock used for one-time lazy
//! initialization from a full ReplicaSet listing.

use std::collections::HashMap;
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RsOwner {
    pub owner_name: String,
    pub owner_kind: String,
    pub deletion_ts: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodOwner {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

fn rs_key(namespace: &str, rs_name: &str) -> String {
    format!("{namespace}/{rs_name}")
}

pub struct OwnerStore {
    rs_owners: Mutex<HashMap<String, RsOwner>>,
    loaded: Mutex<bool>,
    deletion_wait: Duration,
}

impl OwnerStore {
    pub fn new(deletion_wait: Duration) -> Self {
        OwnerStore {
            rs_owners: Mutex::new(HashMap::new()),
            loaded: Mutex::new(false),
            deletion_wait,
        }
    }

    /// Lazily loads the full set of ReplicaSet owners on first call. Uses a
    /// non-blocking try-lock so concurrent callers (e.g. many `/health`
    /// requests racing at startup) don't pile up waiting on the same load;
    /// only the first caller to win the try-lock performs the load.
    pub fn finalize_initialization<F>(&self, load_replicasets: F)
    where
        F: FnOnce() -> Vec<(String, String, RsOwner)>,
    {
        {
            let loaded = self.loaded.lock().unwrap();
            if *loaded {
                return;
            }
        }

        match self.loaded.try_lock() {
            Ok(mut loaded) => {
                if *loaded {
                    return;
                }
                let entries = load_replicasets();
                let mut map = self.rs_owners.lock().unwrap();
                for (namespace, rs_name, owner) in entries {
                    map.insert(rs_key(&namespace, &rs_name), owner);
                }
                *loaded = true;
            }
            Err(TryLockError::WouldBlock) => {
                // another caller is already loading; don't block on it
            }
            Err(TryLockError::Poisoned(_)) => {
                warn!("owner store loaded-flag lock poisoned");
            }
        }
    }

    /// Resolves a Pod's owning workload from its `ownerReferences`. Returns
    /// `None` for standalone pods, pods with no recognized controller
    /// reference, or a ReplicaSet-owned pod whose ReplicaSet is not (yet)
    /// known to this store.
    pub fn get_pod_owner(&self, namespace: &str, owner_references: &[Value]) -> Option<PodOwner> {
        let controllers: Vec<&Value> = owner_references
            .iter()
            .filter(|o| o.get("controller").and_then(Value::as_bool).unwrap_or(false))
            .collect();

        if controllers.is_empty() {
            return None;
        }
        if controllers.len() > 1 {
            warn!(namespace = %namespace, "pod has multiple controller owner references, using the first");
        }

        let controller = controllers[0];
        let kind = controller.get("kind")?.as_str()?.to_string();
        let name = controller.get("name")?.as_str()?.to_string();

        if kind == "ReplicaSet" {
            let map = self.rs_owners.lock().unwrap();
            let owner = map.get(&rs_key(namespace, &name))?;
            Some(PodOwner {
                kind: owner.owner_kind.clone(),
                name: owner.owner_name.clone(),
                namespace: namespace.to_string(),
            })
        } else {
            Some(PodOwner {
                kind,
                name,
                namespace: namespace.to_string(),
            })
        }
    }

    /// Handles an admission request for a ReplicaSet: CREATE replaces the
    /// entry, DELETE tombstones it (the entry is removed only after the
    /// grace period, by `cleanup_deleted`).
    pub fn handle_rs_admission(&self, namespace: &str, rs_name: &str, operation: &str, object: Option<&Value>) {
        match operation {
            "DELETE" => {
                let mut map = self.rs_owners.lock().unwrap();
                if let Some(owner) = map.get_mut(&rs_key(namespace, rs_name)) {
                    owner.deletion_ts = Some(Instant::now());
                }
            }
            "CREATE" => {
                let Some(object) = object else { return };
                let Some(owner_references) = object
                    .get("metadata")
                    .and_then(|m| m.get("ownerReferences"))
                    .and_then(Value::as_array)
                else {
                    warn!(namespace = %namespace, rs = %rs_name, "replicaset created with no owner references");
                    return;
                };
                let Some(first) = owner_references.first() else {
                    return;
                };
                let (Some(owner_kind), Some(owner_name)) = (
                    first.get("kind").and_then(Value::as_str),
                    first.get("name").and_then(Value::as_str),
                ) else {
                    return;
                };

                let mut map = self.rs_owners.lock().unwrap();
                map.insert(
                    rs_key(namespace, rs_name),
                    RsOwner {
                        owner_name: owner_name.to_string(),
                        owner_kind: owner_kind.to_string(),
                        deletion_ts: None,
                    },
                );
            }
            _ => {}
        }
    }

    /// Removes tombstoned entries once the grace period has elapsed.
    pub fn cleanup_deleted(&self) {
        let mut map = self.rs_owners.lock().unwrap();
        map.retain(|_, owner| match owner.deletion_ts {
            Some(ts) => ts.elapsed() < self.deletion_wait,
            None => true,
        });
    }

    pub fn len(&self) -> usize {
        self.rs_owners.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_then_lookup_resolves_owner() {
        let store = OwnerStore::new(Duration::from_secs(600));
        store.handle_rs_admission(
            "default",
            "web-abc123",
            "CREATE",
            Some(&json!({
                "metadata": {
                    "ownerReferences": [{"kind": "Deployment", "name": "web", "controller": true}]
                }
            })),
        );

        let owner = store
            .get_pod_owner(
                "default",
                &[json!({"kind": "ReplicaSet", "name": "web-abc123", "controller": true})],
            )
            .unwrap();
        assert_eq!(owner.kind, "Deployment");
        assert_eq!(owner.name, "web");
    }

    #[test]
    fn unknown_replicaset_returns_none() {
        let store = OwnerStore::new(Duration::from_secs(600));
        let owner = store.get_pod_owner(
            "default",
            &[json!({"kind": "ReplicaSet", "name": "ghost-123", "controller": true})],
        );
        assert!(owner.is_none());
    }

    #[test]
    fn standalone_pod_has_no_owner() {
        let store = OwnerStore::new(Duration::from_secs(600));
        assert!(store.get_pod_owner("default", &[]).is_none());
    }

    #[test]
    fn non_replicaset_controller_resolves_directly() {
        let store = OwnerStore::new(Duration::from_secs(600));
        let owner = store
            .get_pod_owner(
                "default",
                &[json!({"kind": "Job", "name": "batch-job", "controller": true})],
            )
            .unwrap();
        assert_eq!(owner.kind, "Job");
        assert_eq!(owner.name, "batch-job");
    }

    #[test]
    fn delete_then_create_replaces_tombstone() {
        let store = OwnerStore::new(Duration::from_secs(600));
        store.handle_rs_admission(
            "default",
            "web-abc123",
            "CREATE",
            Some(&json!({"metadata": {"ownerReferences": [{"kind": "Deployment", "name": "web", "controller": true}]}})),
        );
        store.handle_rs_admission("default", "web-abc123", "DELETE", None);
        assert_eq!(store.len(), 1); // tombstoned, not yet reaped

        store.handle_rs_admission(
            "default",
            "web-abc123",
            "CREATE",
            Some(&json!({"metadata": {"ownerReferences": [{"kind": "Deployment", "name": "web", "controller": true}]}})),
        );
        let owner = store
            .get_pod_owner("default", &[json!({"kind": "ReplicaSet", "name": "web-abc123", "controller": true})])
            .unwrap();
        assert_eq!(owner.name, "web");
    }

    #[test]
    fn cleanup_reaps_after_grace_period_elapses() {
        let store = OwnerStore::new(Duration::from_millis(1));
        store.handle_rs_admission(
            "default",
            "web-abc123",
            "CREATE",
            Some(&json!({"metadata": {"ownerReferences": [{"kind": "Deployment", "name": "web", "controller": true}]}})),
        );
        store.handle_rs_admission("default", "web-abc123", "DELETE", None);
        std::thread::sleep(Duration::from_millis(5));
        store.cleanup_deleted();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn finalize_initialization_only_loads_once() {
        let store = OwnerStore::new(Duration::from_secs(600));
        let mut calls = 0;
        store.finalize_initialization(|| {
            calls += 1;
            vec![(
                "default".to_string(),
                "seeded-rs".to_string(),
                RsOwner {
                    owner_name: "seeded".to_string(),
                    owner_kind: "Deployment".to_string(),
                    deletion_ts: None,
                },
            )]
        });
        store.finalize_initialization(|| {
            calls += 1;
            vec![]
        });
        assert_eq!(calls, 1);
        assert_eq!(store.len(), 1);
    }
}
