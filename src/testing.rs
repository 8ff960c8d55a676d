//! In-memory cluster used by tests
//!
//! Behaves like the API server for the operations the provisioner uses: atomic
//! create with AlreadyExists on duplicates, 404 on reads of missing objects and
//! RFC 7386 merge-patch (via `json_patch::merge`). Failures can be injected per
//! operation and kind.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ApiError, ClusterApi};
use crate::descriptor::{ResourceDescriptor, ResourceKind, ResourceRef};

/// Operation recorded by the fake cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Read,
    Create,
    MergePatch,
}

#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<BTreeMap<ResourceRef, Value>>,
    calls: Mutex<Vec<(Op, ResourceRef)>>,
    failures: Mutex<Vec<(Op, ResourceKind, ApiError)>>,
    latency: Option<Duration>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` (use with paused tokio time)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every `op` on `kind` fail with `error`
    pub fn fail_on(&self, op: Op, kind: ResourceKind, error: ApiError) {
        self.failures.lock().unwrap().push((op, kind, error));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Store an object as if another client had created it
    pub fn insert(&self, descriptor: &ResourceDescriptor) {
        self.objects
            .lock()
            .unwrap()
            .insert(descriptor.to_ref(), descriptor.to_json().unwrap());
    }

    /// Stored object of `kind` in `namespace` (the namespace name for Namespace)
    pub fn find(&self, kind: ResourceKind, namespace: &str) -> Option<Value> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _)| {
                r.kind == kind
                    && match kind {
                        ResourceKind::Namespace => r.name == namespace,
                        _ => r.namespace.as_deref() == Some(namespace),
                    }
            })
            .map(|(_, v)| v.clone())
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn calls(&self) -> Vec<(Op, ResourceRef)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, kind: ResourceKind) -> Vec<Op> {
        self.calls()
            .into_iter()
            .filter(|(_, r)| r.kind == kind)
            .map(|(op, _)| op)
            .collect()
    }

    async fn enter(&self, op: Op, target: &ResourceRef) -> Result<(), ApiError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.calls.lock().unwrap().push((op, target.clone()));
        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(o, k, _)| *o == op && *k == target.kind) {
            Some((_, _, e)) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn read(&self, target: &ResourceRef) -> Result<(), ApiError> {
        self.enter(Op::Read, target).await?;
        match self.objects.lock().unwrap().contains_key(target) {
            true => Ok(()),
            false => Err(ApiError::NotFound(format!("{target} not found"))),
        }
    }

    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError> {
        let target = descriptor.to_ref();
        self.enter(Op::Create, &target).await?;
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&target) {
            return Err(ApiError::Conflict(format!("{target} already exists")));
        }
        let json = descriptor
            .to_json()
            .map_err(|e| ApiError::permanent("SerializationError", e.to_string()))?;
        objects.insert(target, json);
        Ok(())
    }

    async fn merge_patch(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError> {
        let target = descriptor.to_ref();
        self.enter(Op::MergePatch, &target).await?;
        let patch = descriptor
            .to_json()
            .map_err(|e| ApiError::permanent("SerializationError", e.to_string()))?;
        let mut objects = self.objects.lock().unwrap();
        match objects.get_mut(&target) {
            Some(existing) => {
                json_patch::merge(existing, &patch);
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("{target} not found"))),
        }
    }
}
