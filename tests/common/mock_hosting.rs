//! Mock hosting client for testing

use async_trait::async_trait;
use housekeeper::error::{Error, Result};
use housekeeper::hosting::{HostingClient, PublishRequest};
use housekeeper::types::{ChangeField, ChangeFieldSet, MergeRequest, UpdateFlags};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Call record for `non_housekeeper_changes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCall {
    pub source_project_id: String,
    pub source_branch: String,
    pub target_branch: String,
    pub target_project_id: String,
}

/// Call record for `create_or_update_merge_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCall {
    pub identifiers: Vec<String>,
    pub title: String,
    pub source_project_id: String,
    pub source_branch: String,
    pub target_branch: String,
    pub target_project_id: String,
    pub update: UpdateFlags,
}

/// Hand-written mock of `HostingClient`
///
/// Features:
/// - Per-branch manual-edit responses (default: no edits)
/// - Call tracking for verification
/// - Per-branch error injection
pub struct MockHostingClient {
    next_iid: AtomicU64,
    edits: Mutex<HashMap<String, ChangeFieldSet>>,
    query_calls: Mutex<Vec<QueryCall>>,
    publish_calls: Mutex<Vec<PublishCall>>,
    error_on_query: Mutex<HashMap<String, String>>,
    error_on_publish: Mutex<HashMap<String, String>>,
}

impl MockHostingClient {
    pub fn new() -> Self {
        Self {
            next_iid: AtomicU64::new(1),
            edits: Mutex::new(HashMap::new()),
            query_calls: Mutex::new(Vec::new()),
            publish_calls: Mutex::new(Vec::new()),
            error_on_query: Mutex::new(HashMap::new()),
            error_on_publish: Mutex::new(HashMap::new()),
        }
    }

    /// Report `fields` as edited by a human on `branch`
    pub fn set_manual_edits(&self, branch: &str, fields: &[ChangeField]) {
        self.edits
            .lock()
            .unwrap()
            .insert(branch.to_string(), fields.iter().copied().collect());
    }

    /// Make `non_housekeeper_changes` fail for `branch`
    pub fn fail_query(&self, branch: &str, msg: &str) {
        self.error_on_query
            .lock()
            .unwrap()
            .insert(branch.to_string(), msg.to_string());
    }

    /// Make `create_or_update_merge_request` fail for `branch`
    pub fn fail_publish(&self, branch: &str, msg: &str) {
        self.error_on_publish
            .lock()
            .unwrap()
            .insert(branch.to_string(), msg.to_string());
    }

    pub fn query_calls(&self) -> Vec<QueryCall> {
        self.query_calls.lock().unwrap().clone()
    }

    pub fn publish_calls(&self) -> Vec<PublishCall> {
        self.publish_calls.lock().unwrap().clone()
    }

    /// Branches `create_or_update_merge_request` was called for, in order
    pub fn published_branches(&self) -> Vec<String> {
        self.publish_calls()
            .into_iter()
            .map(|c| c.source_branch)
            .collect()
    }

    /// Assert a publish call for `branch` used exactly `update`
    pub fn assert_published_with(&self, branch: &str, update: UpdateFlags) {
        let calls = self.publish_calls();
        assert!(
            calls
                .iter()
                .any(|c| c.source_branch == branch && c.update == update),
            "Expected publish({branch}, {update:?}) but got: {calls:?}"
        );
    }
}

#[async_trait]
impl HostingClient for MockHostingClient {
    async fn non_housekeeper_changes(
        &self,
        source_project_id: &str,
        source_branch: &str,
        target_branch: &str,
        target_project_id: &str,
    ) -> Result<ChangeFieldSet> {
        self.query_calls.lock().unwrap().push(QueryCall {
            source_project_id: source_project_id.to_string(),
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            target_project_id: target_project_id.to_string(),
        });

        if let Some(msg) = self.error_on_query.lock().unwrap().get(source_branch) {
            return Err(Error::HostingApi(msg.clone()));
        }

        Ok(self
            .edits
            .lock()
            .unwrap()
            .get(source_branch)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_or_update_merge_request(
        &self,
        request: &PublishRequest<'_>,
    ) -> Result<MergeRequest> {
        self.publish_calls.lock().unwrap().push(PublishCall {
            identifiers: request.change.identifiers.clone(),
            title: request.change.title.clone(),
            source_project_id: request.source_project_id.to_string(),
            source_branch: request.source_branch.to_string(),
            target_branch: request.target_branch.to_string(),
            target_project_id: request.target_project_id.to_string(),
            update: request.update,
        });

        if let Some(msg) = self.error_on_publish.lock().unwrap().get(request.source_branch) {
            return Err(Error::HostingApi(msg.clone()));
        }

        let iid = self.next_iid.fetch_add(1, Ordering::SeqCst);
        Ok(MergeRequest {
            iid,
            web_url: format!("https://gitlab.example.com/group/project/-/merge_requests/{iid}"),
        })
    }
}
