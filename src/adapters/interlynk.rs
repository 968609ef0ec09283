//! Interlynk consumer: uploads SBOMs over the service's GraphQL API using
//! the multipart upload convention.

use anyhow::bail;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ports::Consumer;
use crate::project::{resolve_project, ProjectIdentity};
use crate::shared::{Result, TransferError};
use crate::transfer::context::TransferContext;
use crate::transfer::record::SbomRecord;
use crate::transfer::stream::SbomStream;
use crate::transfer::summary::TransferSummary;

/// Public API endpoint used when no URL is configured.
pub const DEFAULT_INTERLYNK_URL: &str = "https://api.interlynk.io/lynkapi";

const HTTP_TIMEOUT_SECONDS: u64 = 30;

const PROJECT_GROUP_CREATE: &str = "\
mutation projectGroupCreate($input: ProjectGroupCreateInput!) {
  projectGroupCreate(input: $input) {
    projectGroup { id name }
    errors
  }
}";

const SBOM_UPLOAD: &str = "\
mutation uploadSbom($doc: Upload!, $projectId: ID!) {
  sbomUpload(input: { doc: $doc, projectId: $projectId }) {
    errors
  }
}";

/// Configuration for the Interlynk consumer.
#[derive(Debug, Clone)]
pub struct InterlynkConfig {
    pub url: String,
    pub token: Option<String>,
    pub project_name: Option<String>,
    pub project_env: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

/// Sequential GraphQL uploader. Projects created during the run are cached so
/// a given `(name, version)` pair triggers at most one create mutation.
pub struct InterlynkConsumer {
    config: InterlynkConfig,
    http: reqwest::Client,
    /// project label -> project id, populated as the run proceeds.
    created: Mutex<HashMap<String, String>>,
}

impl InterlynkConsumer {
    pub fn new(config: InterlynkConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .user_agent(format!("sbommv/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config,
            http,
            created: Mutex::new(HashMap::new()),
        })
    }

    fn token(&self) -> Result<&str> {
        self.config.token.as_deref().ok_or_else(|| {
            TransferError::Authentication {
                service: "interlynk".to_string(),
                details: "INTERLYNK_SECURITY_TOKEN is not set".to_string(),
            }
            .into()
        })
    }

    fn base(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Pre-run health check: 200 proceeds, 401/403 is an auth failure,
    /// anything else is an unexpected status.
    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/healthz", self.base());
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(|e| TransferError::Network {
                endpoint: url.clone(),
                details: e.to_string(),
            })?;
        match response.status().as_u16() {
            200 => Ok(()),
            401 | 403 => bail!(TransferError::Authentication {
                service: "interlynk".to_string(),
                details: "invalid token".to_string(),
            }),
            status => bail!(TransferError::Network {
                endpoint: url,
                details: format!("unexpected status {}", status),
            }),
        }
    }

    /// Returns the project id for the identity, creating the project group
    /// the first time the label shows up in this run.
    async fn ensure_project(&self, identity: &ProjectIdentity) -> Result<String> {
        let label = identity.label();
        let mut created = self.created.lock().await;
        if let Some(id) = created.get(&label) {
            return Ok(id.clone());
        }

        let mut input = json!({ "name": label });
        if let Some(env) = &self.config.project_env {
            input["environment"] = json!(env);
        }
        let body = json!({
            "query": PROJECT_GROUP_CREATE,
            "variables": { "input": input },
        });
        let response = self
            .http
            .post(self.base())
            .bearer_auth(self.token()?)
            .json(&body)
            .send()
            .await?;
        let envelope: GraphQlEnvelope = response.json().await?;
        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            bail!(TransferError::Network {
                endpoint: self.base().to_string(),
                details: format!("projectGroupCreate failed: {:?}", errors),
            });
        }
        let id = envelope
            .data
            .as_ref()
            .and_then(|data| data["projectGroupCreate"]["projectGroup"]["id"].as_str())
            .ok_or_else(|| TransferError::Decode {
                origin: "interlynk projectGroupCreate".to_string(),
                details: "no project id in response".to_string(),
            })?
            .to_string();

        info!(project = %label, id = %id, "created project group");
        created.insert(label, id.clone());
        Ok(id)
    }

    /// GraphQL multipart upload: `operations` holds the mutation with a null
    /// `doc` variable, `map` binds form field `0` to `variables.doc`, and
    /// field `0` carries the SBOM bytes as `sbom.json`.
    async fn upload_record(&self, project_id: &str, record: &SbomRecord) -> Result<()> {
        let operations = json!({
            "query": SBOM_UPLOAD,
            "variables": { "doc": null, "projectId": project_id },
        })
        .to_string();
        let map = json!({ "0": ["variables.doc"] }).to_string();
        let file = reqwest::multipart::Part::bytes(record.data.clone())
            .file_name("sbom.json")
            .mime_str("application/json")?;
        let form = reqwest::multipart::Form::new()
            .text("operations", operations)
            .text("map", map)
            .part("0", file);

        let response = self
            .http
            .post(self.base())
            .bearer_auth(self.token()?)
            .multipart(form)
            .send()
            .await?;
        let envelope: GraphQlEnvelope = response.json().await?;
        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            bail!(TransferError::Network {
                endpoint: self.base().to_string(),
                details: format!("sbomUpload failed: {:?}", errors),
            });
        }
        let upload_errors = envelope
            .data
            .as_ref()
            .and_then(|data| data["sbomUpload"]["errors"].as_array())
            .map(|errors| !errors.is_empty())
            .unwrap_or(false);
        if upload_errors {
            bail!(TransferError::Network {
                endpoint: self.base().to_string(),
                details: "sbomUpload returned errors".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Consumer for InterlynkConsumer {
    fn name(&self) -> &'static str {
        "interlynk"
    }

    fn validate(&self) -> Result<()> {
        if self.config.url.is_empty() {
            bail!(TransferError::config("Interlynk URL must not be empty"));
        }
        self.token()?;
        Ok(())
    }

    async fn upload(
        &self,
        ctx: &TransferContext,
        mut stream: SbomStream,
    ) -> Result<TransferSummary> {
        self.health_check().await?;

        let source_is_folder = ctx.source == "folder";
        let mut summary = TransferSummary::default();
        while let Some(record) = stream.next().await {
            if ctx.is_cancelled() {
                break;
            }
            let identity = resolve_project(
                self.config.project_name.as_deref(),
                None,
                source_is_folder,
                &record,
            );
            let outcome = async {
                let project_id = self.ensure_project(&identity).await?;
                self.upload_record(&project_id, &record).await
            }
            .await;
            match outcome {
                Ok(()) => {
                    debug!(path = %record.path, project = %identity.label(), "uploaded SBOM");
                    summary.record_success();
                }
                Err(error) => {
                    warn!(path = %record.path, error = %error, "upload failed");
                    summary.record_failure();
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer(token: Option<&str>) -> InterlynkConsumer {
        InterlynkConsumer::new(InterlynkConfig {
            url: DEFAULT_INTERLYNK_URL.to_string(),
            token: token.map(str::to_string),
            project_name: None,
            project_env: None,
        })
        .unwrap()
    }

    #[test]
    fn test_validate_requires_token() {
        assert!(consumer(None).validate().is_err());
        assert!(consumer(Some("lynk_test")).validate().is_ok());
    }

    #[test]
    fn test_base_strips_trailing_slash() {
        let consumer = InterlynkConsumer::new(InterlynkConfig {
            url: "https://api.interlynk.io/lynkapi/".to_string(),
            token: Some("t".to_string()),
            project_name: None,
            project_env: None,
        })
        .unwrap();
        assert_eq!(consumer.base(), "https://api.interlynk.io/lynkapi");
    }

    #[test]
    fn test_envelope_decodes_top_level_errors() {
        let json = r#"{"errors": [{"message": "boom"}]}"#;
        let envelope: GraphQlEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.errors.is_some());
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_envelope_decodes_project_id() {
        let json = r#"{
            "data": {
                "projectGroupCreate": {
                    "projectGroup": {"id": "pg-123", "name": "test-latest"},
                    "errors": []
                }
            }
        }"#;
        let envelope: GraphQlEnvelope = serde_json::from_str(json).unwrap();
        let id = envelope.data.unwrap()["projectGroupCreate"]["projectGroup"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(id, "pg-123");
    }
}
