//! reqwest-backed Azure DevOps client.

use super::{
    BacklogLevel, BacklogWorkItemRef, RawWorkItem, WiqlResponse, WorkItemService,
    WorkItemsResponse,
};
use crate::config::Settings;
use crate::error::{ConfigError, Error, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_IDLE_PER_HOST: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BacklogsResponse {
    value: Vec<BacklogLevel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BacklogItemsResponse {
    work_items: Vec<BacklogWorkItemRef>,
}

/// Azure DevOps REST client.
///
/// One `reqwest::Client` (and with it one connection pool) is created on the
/// first request and shared by every later request until [`close`] drops it.
///
/// [`close`]: WorkItemService::close
pub struct AzureDevOpsClient {
    settings: Arc<Settings>,
    client: Mutex<Option<Client>>,
}

impl AzureDevOpsClient {
    /// Create a client. No connection is opened until the first request.
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
        }
    }

    /// Whether the shared connection is currently open.
    pub async fn is_open(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Build the URL of an API endpoint.
    ///
    /// Shape: `{base_url}/{organization}/{project}[/{team}]/_apis/{endpoint}`.
    #[must_use]
    pub fn endpoint_url(
        &self,
        project: Option<&str>,
        team: Option<&str>,
        endpoint: &str,
    ) -> String {
        let project = project
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.settings.project);
        let scope = match team.filter(|t| !t.is_empty()) {
            Some(team) => format!("{project}/{team}"),
            None => project.to_string(),
        };
        format!(
            "{}/{}/{scope}/_apis/{endpoint}",
            self.settings.base_url, self.settings.organization
        )
    }

    async fn client(&self) -> Result<Client> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = self.build_client()?;
        debug!(organization = %self.settings.organization, "Opened Azure DevOps connection");
        *guard = Some(client.clone());
        Ok(client)
    }

    fn build_client(&self) -> Result<Client> {
        let mut auth =
            HeaderValue::from_str(&self.settings.auth_header()).map_err(|_| {
                ConfigError::InvalidValue {
                    key: "AZURE_DEVOPS_PAT",
                    value: "<redacted>".to_string(),
                }
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()?;
        Ok(client)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .client()
            .await?
            .get(url)
            .query(&[("api-version", self.settings.api_version.as_str())])
            .query(query)
            .send()
            .await?;
        decode(response).await
    }
}

/// Check the status, then decode the body as JSON.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = check_response(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Map a non-2xx response to `Error::RemoteService`.
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut url = response.url().clone();
    url.set_query(None);
    let body = response.text().await.unwrap_or_default();
    Err(Error::RemoteService {
        status: status.as_u16(),
        url: url.to_string(),
        body,
    })
}

#[async_trait]
impl WorkItemService for AzureDevOpsClient {
    async fn get_work_items_batch(
        &self,
        ids: &[u32],
        project: Option<&str>,
    ) -> Result<Vec<RawWorkItem>> {
        let ids = ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = self.endpoint_url(project, None, "wit/workitems");
        let response: WorkItemsResponse = self
            .get_json(&url, &[("ids", ids.as_str()), ("$expand", "fields")])
            .await?;
        Ok(response.value)
    }

    async fn execute_wiql(&self, query: &str, project: Option<&str>) -> Result<WiqlResponse> {
        let url = self.endpoint_url(project, None, "wit/wiql");
        debug!(%url, %query, "POST WIQL");

        let response = self
            .client()
            .await?
            .post(&url)
            .query(&[("api-version", self.settings.api_version.as_str())])
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        decode(response).await
    }

    async fn list_backlogs(
        &self,
        project: Option<&str>,
        team: Option<&str>,
    ) -> Result<Vec<BacklogLevel>> {
        let url = self.endpoint_url(project, team, "work/backlogs");
        let response: BacklogsResponse = self.get_json(&url, &[]).await?;
        Ok(response.value)
    }

    async fn backlog_work_items(
        &self,
        backlog_id: &str,
        project: Option<&str>,
        team: Option<&str>,
    ) -> Result<Vec<BacklogWorkItemRef>> {
        let endpoint = format!("work/backlogs/{backlog_id}/workItems");
        let url = self.endpoint_url(project, team, &endpoint);
        let response: BacklogItemsResponse = self.get_json(&url, &[]).await?;
        Ok(response.work_items)
    }

    async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            info!("Closed Azure DevOps connection");
        }
    }
}
