//! GitLab hosting client implementation

use crate::error::{Error, Result};
use crate::hosting::{HostingClient, PublishRequest};
use crate::types::{ChangeField, ChangeFieldSet, MergeRequest};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size for paginated notes and label events
const PER_PAGE: &str = "100";

/// GitLab client using reqwest
pub struct GitLabClient {
    client: Client,
    token: String,
    base_url: Url,
    current_user: OnceCell<User>,
}

#[derive(Debug, Clone, Deserialize)]
struct User {
    id: u64,
}

#[derive(Deserialize)]
struct MergeRequestRecord {
    iid: u64,
    web_url: String,
    source_project_id: u64,
}

impl From<MergeRequestRecord> for MergeRequest {
    fn from(mr: MergeRequestRecord) -> Self {
        Self {
            iid: mr.iid,
            web_url: mr.web_url,
        }
    }
}

#[derive(Deserialize)]
struct Note {
    body: String,
    system: bool,
    author: User,
}

#[derive(Deserialize)]
struct LabelEvent {
    user: Option<User>,
}

#[derive(Serialize)]
struct CreateMrPayload<'a> {
    title: &'a str,
    description: String,
    labels: String,
    source_branch: &'a str,
    target_branch: &'a str,
    target_project_id: &'a str,
    remove_source_branch: bool,
    reviewer_ids: Vec<u64>,
}

#[derive(Serialize, Default)]
struct UpdateMrPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    add_labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reviewer_ids: Option<Vec<u64>>,
}

impl UpdateMrPayload<'_> {
    const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.add_labels.is_none()
            && self.reviewer_ids.is_none()
    }
}

/// Map a system note to the field it reports as changed
fn classify_system_note(body: &str) -> Option<ChangeField> {
    if body.starts_with("changed title from") {
        Some(ChangeField::Title)
    } else if body == "changed the description" {
        Some(ChangeField::Description)
    } else if is_added_commits_note(body) {
        Some(ChangeField::Code)
    } else if body.contains("requested review from") || body.contains("removed review request for")
    {
        Some(ChangeField::Reviewers)
    } else {
        None
    }
}

/// Matches "added 3 commits" / "added 1 commit" anywhere in the note
fn is_added_commits_note(body: &str) -> bool {
    static ADDED_COMMITS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"added \d+ commit").expect("added-commits pattern is valid")
    });
    ADDED_COMMITS_RE.is_match(body)
}

fn api_error(e: reqwest::Error) -> Error {
    Error::HostingApi(e.to_string())
}

impl GitLabClient {
    /// Create a new GitLab client for the instance at `base_url`
    pub fn new(token: String, base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::HostingApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            base_url,
            current_user: OnceCell::new(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn project_url(project_id: &str, path: &str) -> String {
        format!("/projects/{}{path}", urlencoding::encode(project_id))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let value = self
            .client
            .get(self.api_url(path))
            .header("PRIVATE-TOKEN", &self.token)
            .query(query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(api_error)?
            .json()
            .await
            .map_err(api_error)?;
        Ok(value)
    }

    /// Every item of a paginated list, following `x-next-page`
    async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = "1".to_string();
        loop {
            let response = self
                .client
                .get(self.api_url(path))
                .header("PRIVATE-TOKEN", &self.token)
                .query(&[("per_page", PER_PAGE), ("page", page.as_str())])
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(api_error)?;
            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(String::from);

            let batch: Vec<T> = response.json().await.map_err(api_error)?;
            let exhausted = batch.is_empty();
            items.extend(batch);

            match next_page {
                Some(next) if !exhausted => {
                    debug!(path, page = %next, "fetching next page");
                    page = next;
                }
                _ => return Ok(items),
            }
        }
    }

    /// The user the token belongs to (housekeeper's own identity)
    async fn current_user(&self) -> Result<&User> {
        self.current_user
            .get_or_try_init(|| async {
                let user: User = self.get_json("/user", &[]).await?;
                debug!(user_id = user.id, "resolved housekeeper user");
                Ok::<_, Error>(user)
            })
            .await
    }

    async fn find_merge_request(
        &self,
        source_project_id: &str,
        source_branch: &str,
        target_branch: &str,
        target_project_id: &str,
    ) -> Result<Option<MergeRequestRecord>> {
        debug!(source_branch, target_branch, "finding existing MR");
        let mrs: Vec<MergeRequestRecord> = self
            .get_json(
                &Self::project_url(target_project_id, "/merge_requests"),
                &[
                    ("state", "opened"),
                    ("source_branch", source_branch),
                    ("target_branch", target_branch),
                ],
            )
            .await?;

        let found = mrs
            .into_iter()
            .find(|mr| mr.source_project_id.to_string() == source_project_id);
        match &found {
            Some(mr) => debug!(mr_iid = mr.iid, "found existing MR"),
            None => debug!("no existing MR found"),
        }
        Ok(found)
    }

    async fn reviewer_ids(&self, usernames: &[String]) -> Result<Vec<u64>> {
        let mut ids = Vec::with_capacity(usernames.len());
        for username in usernames {
            let users: Vec<User> = self
                .get_json("/users", &[("username", username.as_str())])
                .await?;
            match users.first() {
                Some(user) => ids.push(user.id),
                None => warn!(username, "reviewer not found, skipping"),
            }
        }
        Ok(ids)
    }

    async fn create_merge_request(&self, request: &PublishRequest<'_>) -> Result<MergeRequest> {
        debug!(source_branch = request.source_branch, "creating MR");
        let change = request.change;
        let payload = CreateMrPayload {
            title: &change.title,
            description: change.mr_description(),
            labels: change.labels.join(","),
            source_branch: request.source_branch,
            target_branch: request.target_branch,
            target_project_id: request.target_project_id,
            remove_source_branch: true,
            reviewer_ids: self.reviewer_ids(&change.reviewers).await?,
        };

        let mr: MergeRequestRecord = self
            .client
            .post(self.api_url(&Self::project_url(
                request.source_project_id,
                "/merge_requests",
            )))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(api_error)?
            .json()
            .await
            .map_err(api_error)?;

        debug!(mr_iid = mr.iid, "created MR");
        Ok(mr.into())
    }

    async fn update_merge_request(
        &self,
        existing: MergeRequestRecord,
        request: &PublishRequest<'_>,
    ) -> Result<MergeRequest> {
        let change = request.change;
        let flags = request.update;
        let payload = UpdateMrPayload {
            title: flags.title.then_some(change.title.as_str()),
            description: flags.description.then(|| change.mr_description()),
            add_labels: (flags.labels && !change.labels.is_empty()).then(|| change.labels.join(",")),
            reviewer_ids: if flags.reviewers {
                Some(self.reviewer_ids(&change.reviewers).await?)
            } else {
                None
            },
        };

        if payload.is_empty() {
            debug!(mr_iid = existing.iid, "nothing to update on MR");
            return Ok(existing.into());
        }

        debug!(mr_iid = existing.iid, ?flags, "updating MR");
        let mr: MergeRequestRecord = self
            .client
            .put(self.api_url(&Self::project_url(
                request.target_project_id,
                &format!("/merge_requests/{}", existing.iid),
            )))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(api_error)?
            .json()
            .await
            .map_err(api_error)?;

        debug!(mr_iid = mr.iid, "updated MR");
        Ok(mr.into())
    }
}

#[async_trait]
impl HostingClient for GitLabClient {
    async fn non_housekeeper_changes(
        &self,
        source_project_id: &str,
        source_branch: &str,
        target_branch: &str,
        target_project_id: &str,
    ) -> Result<ChangeFieldSet> {
        let Some(mr) = self
            .find_merge_request(source_project_id, source_branch, target_branch, target_project_id)
            .await?
        else {
            return Ok(ChangeFieldSet::new());
        };
        let me = self.current_user().await?.id;

        let mr_path = format!("/merge_requests/{}", mr.iid);
        let notes: Vec<Note> = self
            .get_all_pages(&Self::project_url(target_project_id, &format!("{mr_path}/notes")))
            .await?;
        let label_events: Vec<LabelEvent> = self
            .get_all_pages(&Self::project_url(
                target_project_id,
                &format!("{mr_path}/resource_label_events"),
            ))
            .await?;

        let mut changes: ChangeFieldSet = notes
            .iter()
            .filter(|note| note.system && note.author.id != me)
            .filter_map(|note| classify_system_note(&note.body))
            .collect();
        if label_events
            .iter()
            .any(|event| event.user.as_ref().is_some_and(|user| user.id != me))
        {
            changes.insert(ChangeField::Labels);
        }

        debug!(mr_iid = mr.iid, %changes, "computed non-housekeeper changes");
        Ok(changes)
    }

    async fn create_or_update_merge_request(
        &self,
        request: &PublishRequest<'_>,
    ) -> Result<MergeRequest> {
        let existing = self
            .find_merge_request(
                request.source_project_id,
                request.source_branch,
                request.target_branch,
                request.target_project_id,
            )
            .await?;

        match existing {
            Some(mr) => self.update_merge_request(mr, request).await,
            None => self.create_merge_request(request).await,
        }
    }
}
