//! HTTP client for the VCD API.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::VcdApi;
use crate::config::VcdConfig;
use crate::error::ApiError;
use crate::types::{
    CREATE_VDC_MEDIA_TYPE, CreateVdcParams, DISK_CREATE_MEDIA_TYPE, DISK_MEDIA_TYPE, Disk,
    DiskCreateParams, Locator, Org, OrgList, Reference, RemoteError, Task, TasksInProgress, Vdc,
};

/// Client for interacting with a VCD endpoint.
///
/// The session token is obtained elsewhere and passed in through the config.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(config: &VcdConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, href: &str) -> RequestBuilder {
        let mut req = self.http.request(method, href).header(
            ACCEPT,
            format!("application/*+json;version={}", self.api_version),
        );
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        req
    }

    fn with_body<B: Serialize>(
        &self,
        req: RequestBuilder,
        media_type: &str,
        body: &B,
    ) -> Result<RequestBuilder, ApiError> {
        let body = serde_json::to_vec(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(req
            .header(CONTENT_TYPE, format!("{};version={}", media_type, self.api_version))
            .body(body))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }
        response.json::<T>().await.map_err(ApiError::from)
    }

    async fn get_optional<T: DeserializeOwned>(&self, href: &str) -> Result<Option<T>, ApiError> {
        match self.send(self.request(Method::GET, href)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Build an `ApiError` from a failed response, keeping the remote message.
async fn error_from_response(status: StatusCode, response: reqwest::Response) -> ApiError {
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<RemoteError>(&text) {
        Ok(remote) => remote.message,
        Err(_) if text.is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => text,
    };
    ApiError::Http {
        status: status.as_u16(),
        message,
    }
}

/// First task attached to a freshly created entity, with the entity as owner.
fn spawned_task(
    tasks: Option<TasksInProgress>,
    owner_href: Option<String>,
    owner_name: &str,
) -> Result<Task, ApiError> {
    let mut task = tasks
        .and_then(|t| t.task.into_iter().next())
        .ok_or_else(|| ApiError::Decode(format!("no task returned for '{}'", owner_name)))?;

    if task.owner.is_none() {
        if let Some(href) = owner_href {
            task.owner = Some(Reference {
                name: Some(owner_name.to_string()),
                ..Reference::to_href(href)
            });
        }
    }
    Ok(task)
}

#[async_trait]
impl VcdApi for HttpClient {
    async fn get_org(&self, name: &str) -> Result<Option<Org>, ApiError> {
        debug!(org = %name, "Looking up org");
        let orgs: OrgList = self
            .send(self.request(Method::GET, &self.url("org")))
            .await?;

        let Some(reference) = orgs
            .org
            .into_iter()
            .find(|o| o.name.as_deref() == Some(name))
        else {
            return Ok(None);
        };
        self.get_optional(&reference.href).await
    }

    async fn create_disk(
        &self,
        vdc: &Locator,
        params: &DiskCreateParams,
    ) -> Result<Task, ApiError> {
        debug!(vdc = %vdc, disk = %params.disk.name, "Creating disk");
        let href = format!("{}/disk", vdc.as_str().trim_end_matches('/'));
        let req = self.with_body(
            self.request(Method::POST, &href),
            DISK_CREATE_MEDIA_TYPE,
            params,
        )?;
        let disk: Disk = self.send(req).await?;
        spawned_task(disk.tasks, disk.href, &disk.name)
    }

    async fn get_disk(&self, disk: &Locator) -> Result<Option<Disk>, ApiError> {
        debug!(disk = %disk, "Getting disk");
        self.get_optional(disk.as_str()).await
    }

    async fn update_disk(&self, disk: &Locator, update: &Disk) -> Result<Task, ApiError> {
        debug!(disk = %disk, "Updating disk");
        let req = self.with_body(
            self.request(Method::PUT, disk.as_str()),
            DISK_MEDIA_TYPE,
            update,
        )?;
        self.send(req).await
    }

    async fn delete_disk(&self, disk: &Locator) -> Result<Task, ApiError> {
        debug!(disk = %disk, "Deleting disk");
        self.send(self.request(Method::DELETE, disk.as_str())).await
    }

    async fn create_vdc(
        &self,
        admin_org: &Locator,
        params: &CreateVdcParams,
    ) -> Result<Task, ApiError> {
        debug!(org = %admin_org, vdc = %params.name, "Creating VDC");
        let href = format!("{}/vdcsparams", admin_org.as_str().trim_end_matches('/'));
        let req = self.with_body(
            self.request(Method::POST, &href),
            CREATE_VDC_MEDIA_TYPE,
            params,
        )?;
        let vdc: Vdc = self.send(req).await?;
        spawned_task(vdc.tasks, Some(vdc.href), &vdc.name)
    }

    async fn get_vdc(&self, vdc: &Locator) -> Result<Option<Vdc>, ApiError> {
        debug!(vdc = %vdc, "Getting VDC");
        self.get_optional(vdc.as_str()).await
    }

    async fn delete_vdc(
        &self,
        vdc: &Locator,
        force: bool,
        recursive: bool,
    ) -> Result<Task, ApiError> {
        debug!(vdc = %vdc, force, recursive, "Deleting VDC");
        let req = self
            .request(Method::DELETE, &admin_vdc_href(vdc))
            .query(&[("force", force), ("recursive", recursive)]);
        self.send(req).await
    }

    async fn get_task(&self, task: &Locator) -> Result<Task, ApiError> {
        self.send(self.request(Method::GET, task.as_str())).await
    }
}

/// VDC deletion is an admin operation (`/api/admin/vdc/..`).
fn admin_vdc_href(vdc: &Locator) -> String {
    vdc.as_str().replacen("/api/vdc/", "/api/admin/vdc/", 1)
}
