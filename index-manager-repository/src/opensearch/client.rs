//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `IndexLifecycleClient`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesGetParts},
    BulkParts, IndexParts, OpenSearch,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::ConnectionConfig;
use crate::errors::IndexClientError;
use crate::interfaces::{BulkItemResult, IndexLifecycleClient};
use crate::opensearch::responses::{error_message, parse_bulk_response, parse_index_schema};
use index_manager_shared::{BulkRecord, IndexSchema};

/// OpenSearch client implementation.
///
/// One instance is built per run and shared behind an `Arc`; the underlying
/// transport pools its own connections.
///
/// # Example
///
/// ```ignore
/// use index_manager_repository::{ConnectionConfig, OpenSearchIndexClient};
///
/// let client = OpenSearchIndexClient::new(&ConnectionConfig::new("http://localhost:9200"))?;
/// if !client.exists("account").await? {
///     client.create("account", &schema).await?;
/// }
/// ```
pub struct OpenSearchIndexClient {
    client: OpenSearch,
}

impl OpenSearchIndexClient {
    /// Create a new OpenSearch client for the configured cluster.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchIndexClient)` - A new client instance
    /// * `Err(IndexClientError)` - If the URL is invalid or transport setup fails
    pub fn new(config: &ConnectionConfig) -> Result<Self, IndexClientError> {
        let parsed_url = Url::parse(&config.url)
            .map_err(|e| IndexClientError::config(format!("Invalid URL: {}", e)))?;
        let display_url = redact_url(&parsed_url);

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.request_timeout);

        if let Some(credentials) = config.credentials.clone() {
            builder = builder.auth(credentials.into());
        }

        let transport = builder
            .build()
            .map_err(|e| IndexClientError::config(e.to_string()))?;

        info!(
            url = %display_url,
            authenticated = config.credentials.is_some(),
            timeout_ms = config.request_timeout.as_millis() as u64,
            "Created OpenSearch client"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Turn a non-success response into an error, keeping the engine's
    /// reason.
    async fn status_error(response: Response) -> IndexClientError {
        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        IndexClientError::from_status(status, error_message(&body))
    }

    /// Build the NDJSON body for a `_bulk` request.
    fn bulk_body(name: &str, records: &[BulkRecord]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(records.len() * 2);

        for record in records {
            let action = match &record.id {
                Some(id) => json!({ "index": { "_index": name, "_id": id } }),
                None => json!({ "index": { "_index": name } }),
            };
            body.push(action.into());
            body.push(Value::Object(record.document.clone()).into());
        }

        body
    }
}

/// Errors raised before a response arrives are transport failures.
fn transport_error(error: opensearch::Error) -> IndexClientError {
    let message = error.to_string();
    if message.to_lowercase().contains("timed out") {
        IndexClientError::timeout(message)
    } else {
        IndexClientError::connection(message)
    }
}

/// Render a URL without any embedded username or password.
fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    // Both setters only fail for cannot-be-a-base URLs, which carry no
    // credentials anyway.
    let _ = redacted.set_username("");
    let _ = redacted.set_password(None);
    redacted.to_string()
}

#[async_trait]
impl IndexLifecycleClient for OpenSearchIndexClient {
    #[instrument(skip(self))]
    async fn exists(&self, name: &str) -> Result<bool, IndexClientError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(Self::status_error(response).await),
        }
    }

    #[instrument(skip(self))]
    async fn get_schema(&self, name: &str) -> Result<IndexSchema, IndexClientError> {
        let response = self
            .client
            .indices()
            .get(IndicesGetParts::Index(&[name]))
            .flat_settings(true)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexClientError::parse(e.to_string()))?;

        parse_index_schema(name, &body)
    }

    #[instrument(skip(self, schema), fields(fields = schema.field_count()))]
    async fn create(&self, name: &str, schema: &IndexSchema) -> Result<(), IndexClientError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(schema.to_create_body())
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            let err = Self::status_error(response).await;
            error!(error = %err, "Create index request failed");
            return Err(err);
        }

        debug!("Index created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<(), IndexClientError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[name]))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            let err = Self::status_error(response).await;
            error!(error = %err, "Delete index request failed");
            return Err(err);
        }

        debug!("Index deleted");
        Ok(())
    }

    async fn index_document(
        &self,
        name: &str,
        record: &BulkRecord,
    ) -> Result<(), IndexClientError> {
        let parts = match &record.id {
            Some(id) => IndexParts::IndexId(name, id),
            None => IndexParts::Index(name),
        };

        let response = self
            .client
            .index(parts)
            .body(Value::Object(record.document.clone()))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        Ok(())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn bulk_index(
        &self,
        name: &str,
        records: &[BulkRecord],
    ) -> Result<Vec<BulkItemResult>, IndexClientError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(name))
            .body(Self::bulk_body(name, records))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexClientError::parse(e.to_string()))?;

        parse_bulk_response(body, records.len())
    }

    async fn health_check(&self) -> Result<bool, IndexClientError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| IndexClientError::parse(e.to_string()))?;

        let status = body.get("status").and_then(Value::as_str).unwrap_or("red");
        debug!(status = %status, "Cluster health");
        Ok(status != "red")
    }
}
