//! Dependency-Track consumer: uploads SBOMs over the tracker's REST API with
//! project lookup/create and an optional overwrite-skip policy.

use anyhow::bail;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::ports::Consumer;
use crate::project::{resolve_project, ProjectIdentity};
use crate::shared::{Result, TransferError};
use crate::transfer::context::{ProcessingMode, TransferContext};
use crate::transfer::record::SbomRecord;
use crate::transfer::stream::SbomStream;
use crate::transfer::summary::TransferSummary;

const HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Fixed worker-pool size for the parallel uploader.
const UPLOAD_WORKERS: usize = 5;

/// Configuration for the Dependency-Track consumer.
#[derive(Debug, Clone)]
pub struct DtrackConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub project_name: Option<String>,
    pub project_version: String,
    pub overwrite: bool,
    pub mode: ProcessingMode,
}

#[derive(Debug, Deserialize)]
struct DtrackProject {
    #[allow(dead_code)]
    uuid: String,
    #[serde(default, rename = "lastBomImport")]
    last_bom_import: u64,
    #[serde(default)]
    metrics: Option<DtrackMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct DtrackMetrics {
    #[serde(default)]
    components: u64,
}

impl DtrackProject {
    /// A project "has a BOM" when a previous import is recorded or its
    /// component count is positive.
    fn has_bom(&self) -> bool {
        self.last_bom_import != 0
            || self
                .metrics
                .as_ref()
                .map(|metrics| metrics.components > 0)
                .unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
struct CreateProjectBody<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct BomUploadBody<'a> {
    #[serde(rename = "projectName")]
    project_name: &'a str,
    #[serde(rename = "projectVersion")]
    project_version: &'a str,
    bom: String,
}

/// Shared pieces of the uploader, clonable into parallel workers.
#[derive(Clone)]
struct DtrackClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
    overwrite: bool,
    /// Project labels already checked-or-created this run.
    created: Arc<Mutex<HashSet<String>>>,
}

impl DtrackClient {
    async fn get_project(&self, identity: &ProjectIdentity) -> Result<Option<DtrackProject>> {
        let url = format!("{}/api/v1/project", self.base);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("name", identity.name.as_str()),
                ("version", identity.version.as_str()),
            ])
            .send()
            .await?;
        match response.status().as_u16() {
            200 => {
                // The endpoint answers with either one project or a list.
                let body = response.bytes().await?;
                if let Ok(project) = serde_json::from_slice::<DtrackProject>(&body) {
                    return Ok(Some(project));
                }
                let projects: Vec<DtrackProject> = serde_json::from_slice(&body).map_err(|e| {
                    TransferError::Decode {
                        origin: url,
                        details: e.to_string(),
                    }
                })?;
                Ok(projects.into_iter().next())
            }
            404 => Ok(None),
            401 | 403 => bail!(TransferError::Authentication {
                service: "dtrack".to_string(),
                details: "API key rejected".to_string(),
            }),
            status => bail!(TransferError::Network {
                endpoint: url,
                details: format!("unexpected status {}", status),
            }),
        }
    }

    async fn create_project(&self, identity: &ProjectIdentity) -> Result<()> {
        let url = format!("{}/api/v1/project", self.base);
        let body = CreateProjectBody {
            name: &identity.name,
            version: &identity.version,
        };
        let response = self
            .http
            .put(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!(TransferError::Network {
                endpoint: url,
                details: format!("project create returned {}", response.status()),
            });
        }
        info!(project = %identity.label(), "created project");
        Ok(())
    }

    async fn put_bom(&self, identity: &ProjectIdentity, record: &SbomRecord) -> Result<()> {
        let url = format!("{}/api/v1/bom", self.base);
        let body = BomUploadBody {
            project_name: &identity.name,
            project_version: &identity.version,
            bom: base64::engine::general_purpose::STANDARD.encode(&record.data),
        };
        let response = self
            .http
            .put(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if response.status().as_u16() != 200 {
            bail!(TransferError::Network {
                endpoint: url,
                details: format!("BOM upload returned {}", response.status()),
            });
        }
        Ok(())
    }

    /// Uploads one record. Returns `true` on success, which includes the
    /// overwrite-policy skip of projects that already carry a BOM.
    async fn process(&self, identity: &ProjectIdentity, record: &SbomRecord) -> Result<bool> {
        let label = identity.label();

        // Check-or-create is a critical section so two workers cannot race
        // a duplicate create for the same label.
        {
            let mut created = self.created.lock().await;
            if !created.contains(&label) {
                match self.get_project(identity).await? {
                    Some(existing) => {
                        if !self.overwrite && existing.has_bom() {
                            debug!(project = %label, "project already has a BOM, skipping upload");
                            created.insert(label);
                            return Ok(true);
                        }
                    }
                    None => self.create_project(identity).await?,
                }
                created.insert(label.clone());
            } else if !self.overwrite {
                // Re-check within the run only costs a lookup when the
                // overwrite policy might skip.
                if let Some(existing) = self.get_project(identity).await? {
                    if existing.has_bom() {
                        debug!(project = %label, "project already has a BOM, skipping upload");
                        return Ok(true);
                    }
                }
            }
        }

        self.put_bom(identity, record).await?;
        Ok(true)
    }
}

/// REST uploader for the vulnerability tracker.
pub struct DtrackConsumer {
    config: DtrackConfig,
    client: DtrackClient,
}

impl DtrackConsumer {
    pub fn new(config: DtrackConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .user_agent(format!("sbommv/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let client = DtrackClient {
            http,
            base: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            overwrite: config.overwrite,
            created: Arc::new(Mutex::new(HashSet::new())),
        };
        Ok(Self { config, client })
    }

    /// Health check: the service root and the API version endpoint must both
    /// answer successfully.
    async fn health_check(&self) -> Result<()> {
        for path in ["/health", "/api/version"] {
            let url = format!("{}{}", self.client.base, path);
            let response = self
                .client
                .http
                .get(&url)
                .header("X-Api-Key", &self.client.api_key)
                .send()
                .await
                .map_err(|e| TransferError::Network {
                    endpoint: url.clone(),
                    details: e.to_string(),
                })?;
            if !response.status().is_success() {
                bail!(TransferError::Network {
                    endpoint: url,
                    details: format!("health check returned {}", response.status()),
                });
            }
        }
        Ok(())
    }

    fn identity_for(&self, ctx: &TransferContext, record: &SbomRecord) -> ProjectIdentity {
        resolve_project(
            self.config.project_name.as_deref(),
            Some(self.config.project_version.as_str()),
            ctx.source == "folder",
            record,
        )
    }
}

#[async_trait]
impl Consumer for DtrackConsumer {
    fn name(&self) -> &'static str {
        "dtrack"
    }

    fn validate(&self) -> Result<()> {
        if self.config.url.is_empty() {
            bail!(TransferError::config("Dependency-Track URL must not be empty"));
        }
        if self.config.api_key.as_deref().unwrap_or("").is_empty() {
            bail!(TransferError::Authentication {
                service: "dtrack".to_string(),
                details: "DTRACK_API_KEY is not set".to_string(),
            });
        }
        Ok(())
    }

    async fn upload(
        &self,
        ctx: &TransferContext,
        mut stream: SbomStream,
    ) -> Result<TransferSummary> {
        self.health_check().await?;

        match self.config.mode {
            ProcessingMode::Sequential => {
                let mut summary = TransferSummary::default();
                while let Some(record) = stream.next().await {
                    if ctx.is_cancelled() {
                        break;
                    }
                    let identity = self.identity_for(ctx, &record);
                    match self.client.process(&identity, &record).await {
                        Ok(_) => {
                            debug!(path = %record.path, project = %identity.label(), "uploaded BOM");
                            summary.record_success();
                        }
                        Err(error) => {
                            warn!(path = %record.path, error = %error, "BOM upload failed");
                            summary.record_failure();
                        }
                    }
                }
                Ok(summary)
            }
            ProcessingMode::Parallel => {
                let semaphore = Arc::new(Semaphore::new(UPLOAD_WORKERS));
                let mut handles = Vec::new();
                while let Some(record) = stream.next().await {
                    if ctx.is_cancelled() {
                        break;
                    }
                    let permit = Arc::clone(&semaphore).acquire_owned().await?;
                    let client = self.client.clone();
                    let identity = self.identity_for(ctx, &record);
                    handles.push(tokio::spawn(async move {
                        let _permit = permit;
                        let mut partial = TransferSummary::default();
                        match client.process(&identity, &record).await {
                            Ok(_) => partial.record_success(),
                            Err(error) => {
                                warn!(path = %record.path, error = %error, "BOM upload failed");
                                partial.record_failure();
                            }
                        }
                        partial
                    }));
                }
                let mut summary = TransferSummary::default();
                for handle in handles {
                    summary.merge(handle.await?);
                }
                Ok(summary)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer(api_key: Option<&str>) -> DtrackConsumer {
        DtrackConsumer::new(DtrackConfig {
            url: "http://localhost:8081".to_string(),
            api_key: api_key.map(str::to_string),
            project_name: None,
            project_version: "latest".to_string(),
            overwrite: false,
            mode: ProcessingMode::Sequential,
        })
        .unwrap()
    }

    #[test]
    fn test_validate_requires_api_key() {
        assert!(consumer(None).validate().is_err());
        assert!(consumer(Some("odt_key")).validate().is_ok());
    }

    #[test]
    fn test_project_has_bom_from_last_import() {
        let project: DtrackProject = serde_json::from_str(
            r#"{"uuid": "u-1", "lastBomImport": 1700000000000}"#,
        )
        .unwrap();
        assert!(project.has_bom());
    }

    #[test]
    fn test_project_has_bom_from_component_count() {
        let project: DtrackProject = serde_json::from_str(
            r#"{"uuid": "u-1", "metrics": {"components": 12}}"#,
        )
        .unwrap();
        assert!(project.has_bom());
    }

    #[test]
    fn test_fresh_project_has_no_bom() {
        let project: DtrackProject = serde_json::from_str(r#"{"uuid": "u-1"}"#).unwrap();
        assert!(!project.has_bom());
    }

    #[test]
    fn test_bom_upload_body_is_base64() {
        let body = BomUploadBody {
            project_name: "test-project",
            project_version: "v1.0.1",
            bom: base64::engine::general_purpose::STANDARD.encode(b"{\"bomFormat\":\"CycloneDX\"}"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["projectName"], "test-project");
        assert_eq!(json["projectVersion"], "v1.0.1");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(json["bom"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, b"{\"bomFormat\":\"CycloneDX\"}");
    }
}
