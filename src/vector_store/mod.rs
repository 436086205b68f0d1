// Vector store module
// Pinecone-style client split between the control plane (index lifecycle)
// and the data plane (upsert and similarity query against an index host).


use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::{Result, StaywiseError};

const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io/";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// A record persisted in the vector store.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordMetadata {
    #[serde(rename = "propertyId")]
    pub property_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub metadata: Option<RecordMetadata>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: u32,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

/// Deployment shape for a newly created index, parsed from the configured
/// environment string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentSpec {
    Serverless { cloud: String, region: String },
    Pod { environment: String, pod_type: String },
}

impl DeploymentSpec {
    /// Recognizes `aws-<region>`, `gcp-<region>` and `azure-<region>` as
    /// serverless deployments and environments containing `starter` as
    /// pod-based. Anything else is a fatal configuration error.
    #[inline]
    pub fn parse(environment: &str) -> Result<Self> {
        let lower = environment.to_lowercase();

        let serverless = [("aws-", "aws"), ("gcp-", "gcp"), ("azure-", "azure")]
            .iter()
            .find_map(|(prefix, cloud)| {
                let region = lower.strip_prefix(prefix)?;
                if region.is_empty() || (*cloud == "gcp" && lower.contains("starter")) {
                    return None;
                }
                Some(DeploymentSpec::Serverless {
                    cloud: (*cloud).to_string(),
                    region: region.to_string(),
                })
            });

        if let Some(spec) = serverless {
            return Ok(spec);
        }

        if lower.contains("starter") {
            return Ok(DeploymentSpec::Pod {
                environment: environment.to_string(),
                pod_type: "p1.x1".to_string(),
            });
        }

        Err(StaywiseError::Config(format!(
            "cannot determine deployment shape from environment '{environment}'; \
             expected 'aws-<region>', 'gcp-<region>' or 'azure-<region>' for serverless, \
             or an environment like 'gcp-starter' for pod-based"
        )))
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            DeploymentSpec::Serverless { cloud, region } => {
                json!({ "serverless": { "cloud": cloud, "region": region } })
            }
            DeploymentSpec::Pod {
                environment,
                pod_type,
            } => {
                json!({ "pod": { "environment": environment, "pod_type": pod_type } })
            }
        }
    }
}

fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn unavailable(reason: impl std::fmt::Display) -> StaywiseError {
    StaywiseError::ServiceUnavailable {
        service: "vector store".to_string(),
        reason: reason.to_string(),
    }
}

/// Control-plane client for index lifecycle operations.
#[derive(Debug, Clone)]
pub struct PineconeClient {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
}

impl PineconeClient {
    #[inline]
    pub fn new(api_key: &str) -> Self {
        Self {
            base_url: Url::parse(DEFAULT_CONTROL_PLANE_URL).expect("default URL is valid"),
            api_key: api_key.to_string(),
            agent: agent_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
        }
    }

    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = agent_with_timeout(timeout);
        self
    }

    #[inline]
    pub fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        let url = self.base_url.join("indexes").context("indexes URL")?;
        let response = self
            .agent
            .get(url.as_str())
            .header("Api-Key", &self.api_key)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(unavailable)?;

        let list: IndexList =
            serde_json::from_str(&response).context("Failed to parse index list response")?;
        Ok(list.indexes)
    }

    #[inline]
    pub fn create_index(
        &self,
        name: &str,
        dimension: u32,
        metric: &str,
        spec: &DeploymentSpec,
    ) -> Result<()> {
        let url = self.base_url.join("indexes").context("indexes URL")?;
        let body = json!({
            "name": name,
            "dimension": dimension,
            "metric": metric,
            "spec": spec.to_json(),
        });

        info!("Creating index '{}' with {} dimensions", name, dimension);
        self.agent
            .post(url.as_str())
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(body.to_string().as_str())
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(unavailable)?;
        Ok(())
    }

    #[inline]
    pub fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let url = self
            .base_url
            .join(&format!("indexes/{name}"))
            .context("describe URL")?;
        let response = self
            .agent
            .get(url.as_str())
            .header("Api-Key", &self.api_key)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(unavailable)?;

        let description =
            serde_json::from_str(&response).context("Failed to parse index description")?;
        Ok(description)
    }

    /// Resolve an index's data-plane host into a handle for upserts and
    /// queries.
    #[inline]
    pub fn index(&self, name: &str) -> Result<IndexHandle> {
        let description = self.describe_index(name)?;
        let host = description
            .host
            .ok_or_else(|| unavailable(format!("index '{name}' reported no host")))?;

        let base_url = host_url(&host)?;
        debug!("Resolved index '{}' to host {}", name, base_url);

        Ok(IndexHandle {
            base_url,
            api_key: self.api_key.clone(),
            agent: self.agent.clone(),
        })
    }
}

/// The control plane reports a bare host name; prefix a scheme unless the
/// host already carries one.
fn host_url(host: &str) -> Result<Url> {
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    Url::parse(&with_scheme)
        .with_context(|| format!("Invalid index host '{host}'"))
        .map_err(Into::into)
}

/// Data-plane handle bound to one index host.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
}

impl IndexHandle {
    /// Upsert a batch of records, returning the store-reported count.
    /// Re-upserting an existing id overwrites that record.
    #[inline]
    pub fn upsert(&self, records: &[VectorRecord]) -> Result<u64> {
        let url = self
            .base_url
            .join("vectors/upsert")
            .context("upsert URL")?;
        let body =
            serde_json::to_string(&json!({ "vectors": records })).context("upsert body")?;

        let response = self
            .agent
            .post(url.as_str())
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(body.as_str())
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| StaywiseError::UpsertBatch(e.to_string()))?;

        let parsed: UpsertResponse =
            serde_json::from_str(&response).context("Failed to parse upsert response")?;
        Ok(parsed.upserted_count)
    }

    /// Query for the `top_k` nearest records, optionally restricted to one
    /// property's records via metadata filter.
    #[inline]
    pub fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        property_filter: Option<&str>,
    ) -> Result<Vec<QueryMatch>> {
        let url = self.base_url.join("query").context("query URL")?;
        let body = build_query_body(vector, top_k, property_filter);

        let response = self
            .agent
            .post(url.as_str())
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(body.to_string().as_str())
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(unavailable)?;

        let parsed: QueryResponse =
            serde_json::from_str(&response).context("Failed to parse query response")?;
        Ok(parsed.matches)
    }

    #[inline]
    pub fn describe_stats(&self) -> Result<IndexStats> {
        let url = self
            .base_url
            .join("describe_index_stats")
            .context("stats URL")?;
        let response = self
            .agent
            .post(url.as_str())
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .send("{}")
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(unavailable)?;

        let stats =
            serde_json::from_str(&response).context("Failed to parse index stats response")?;
        Ok(stats)
    }
}

fn build_query_body(
    vector: &[f32],
    top_k: usize,
    property_filter: Option<&str>,
) -> serde_json::Value {
    let mut body = json!({
        "vector": vector,
        "topK": top_k,
        "includeMetadata": true,
    });
    if let Some(property_id) = property_filter {
        body["filter"] = json!({ "propertyId": property_id });
    }
    body
}
