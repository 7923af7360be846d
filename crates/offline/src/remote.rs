//! Remote data service client.
//!
//! The hosted backend is consumed through the [`RemoteStore`] trait so the
//! worker and adapter can be exercised against in-memory fakes. The real
//! implementation, [`RestRemote`], speaks HTTPS with bearer-token auth and
//! normalizes every inbound payload to the canonical camelCase schema.

use async_trait::async_trait;
use serde_json::Value;

use tillpoint_core::{RecordId, TenantId};
use tillpoint_records::wire;

use crate::config::RemoteConfig;
use crate::error::SyncError;

/// Typed access to the remote relational backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create-or-replace a record.
    async fn upsert(&self, table: &str, id: RecordId, payload: &Value) -> Result<(), SyncError>;

    /// Delete a record. Deleting an absent record is not an error.
    async fn delete(&self, table: &str, id: RecordId) -> Result<(), SyncError>;

    /// Fetch one record, `None` when absent.
    async fn fetch(&self, table: &str, id: RecordId) -> Result<Option<Value>, SyncError>;

    /// List a table's records for one tenant.
    async fn list_by_tenant(&self, table: &str, tenant_id: TenantId)
        -> Result<Vec<Value>, SyncError>;

    /// Cheap reachability probe.
    async fn check_connectivity(&self) -> bool;
}

/// REST implementation over the hosted backend.
pub struct RestRemote {
    config: RemoteConfig,
}

impl RestRemote {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn record_url(&self, table: &str, id: RecordId) -> String {
        format!("{}/tables/{}/records/{}", self.config.url, table, id)
    }

    async fn error_from(resp: reqwest::Response) -> SyncError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        SyncError::Api(status, body)
    }
}

#[async_trait]
impl RemoteStore for RestRemote {
    async fn upsert(&self, table: &str, id: RecordId, payload: &Value) -> Result<(), SyncError> {
        let client = reqwest::Client::new();
        let resp = client
            .put(self.record_url(table, id))
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(resp).await)
        }
    }

    async fn delete(&self, table: &str, id: RecordId) -> Result<(), SyncError> {
        let client = reqwest::Client::new();
        let resp = client
            .delete(self.record_url(table, id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::error_from(resp).await)
        }
    }

    async fn fetch(&self, table: &str, id: RecordId) -> Result<Option<Value>, SyncError> {
        let client = reqwest::Client::new();
        let resp = client
            .get(self.record_url(table, id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("failed to parse {} record: {}", table, e)))?;
        Ok(Some(wire::to_canonical(body)))
    }

    async fn list_by_tenant(
        &self,
        table: &str,
        tenant_id: TenantId,
    ) -> Result<Vec<Value>, SyncError> {
        let client = reqwest::Client::new();
        let url = format!("{}/tables/{}?tenantId={}", self.config.url, table, tenant_id);
        let resp = client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let body: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("failed to parse {} list: {}", table, e)))?;
        Ok(body.into_iter().map(wire::to_canonical).collect())
    }

    async fn check_connectivity(&self) -> bool {
        let client = reqwest::Client::new();
        let url = format!("{}/health", self.config.url);
        client.get(&url).send().await.is_ok()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory remote fake shared by worker and adapter tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Failure script for the fake remote.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Fault {
        None,
        /// Every call fails as a transport error.
        Network,
        /// Writes to the poisoned record fail with a 4xx.
        Poisoned(RecordId),
    }

    pub struct FakeRemote {
        pub records: Mutex<HashMap<(String, RecordId), Value>>,
        pub fault: Mutex<Fault>,
    }

    impl FakeRemote {
        pub fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                fault: Mutex::new(Fault::None),
            }
        }

        pub fn set_fault(&self, fault: Fault) {
            *self.fault.lock().unwrap() = fault;
        }

        pub fn insert(&self, table: &str, id: RecordId, payload: Value) {
            self.records
                .lock()
                .unwrap()
                .insert((table.to_string(), id), payload);
        }

        pub fn contains(&self, table: &str, id: RecordId) -> bool {
            self.records
                .lock()
                .unwrap()
                .contains_key(&(table.to_string(), id))
        }

        fn check_fault(&self, id: Option<RecordId>) -> Result<(), SyncError> {
            match *self.fault.lock().unwrap() {
                Fault::None => Ok(()),
                Fault::Network => Err(SyncError::Network("connection refused".into())),
                Fault::Poisoned(poisoned) if id == Some(poisoned) => {
                    Err(SyncError::Api(422, "schema mismatch".into()))
                }
                Fault::Poisoned(_) => Ok(()),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn upsert(
            &self,
            table: &str,
            id: RecordId,
            payload: &Value,
        ) -> Result<(), SyncError> {
            self.check_fault(Some(id))?;
            self.insert(table, id, payload.clone());
            Ok(())
        }

        async fn delete(&self, table: &str, id: RecordId) -> Result<(), SyncError> {
            self.check_fault(Some(id))?;
            self.records.lock().unwrap().remove(&(table.to_string(), id));
            Ok(())
        }

        async fn fetch(&self, table: &str, id: RecordId) -> Result<Option<Value>, SyncError> {
            self.check_fault(None)?;
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&(table.to_string(), id))
                .cloned())
        }

        async fn list_by_tenant(
            &self,
            table: &str,
            tenant_id: TenantId,
        ) -> Result<Vec<Value>, SyncError> {
            self.check_fault(None)?;
            let tenant = serde_json::json!(tenant_id);
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|((t, _), value)| t == table && value.get("tenantId") == Some(&tenant))
                .map(|(_, value)| value.clone())
                .collect())
        }

        async fn check_connectivity(&self) -> bool {
            *self.fault.lock().unwrap() != Fault::Network
        }
    }
}
