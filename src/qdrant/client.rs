//! HTTP client implementing the search-index operations against Qdrant.

use crate::config::get_config;
use crate::processing::types::IndexRecord;
use crate::qdrant::SearchIndex;
use crate::qdrant::filters::file_path_filter;
use crate::qdrant::payload::{build_payload, current_timestamp_rfc3339};
use crate::qdrant::types::{CountResponse, QdrantError, UpsertReport};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for the Qdrant REST API, bound to one collection.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) vector_size: u64,
}

impl QdrantService {
    /// Build a client from the installed configuration.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        Self::with_connection(
            &config.qdrant_url,
            config.qdrant_api_key.clone(),
            config.qdrant_collection_name.clone(),
            config.embedding_dimension as u64,
        )
    }

    /// Construct a client for an explicit endpoint and collection.
    pub fn with_connection(
        qdrant_url: &str,
        api_key: Option<String>,
        collection: String,
        vector_size: u64,
    ) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("docdex/0.3").build()?;
        let base_url = normalize_base_url(qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %collection,
            has_api_key = %api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            collection,
            vector_size,
        })
    }

    /// Create the collection with the configured vector size.
    async fn create_collection(&self) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Collection ensured/created");
        })
        .await
    }

    /// Ensure payload indexes exist for the fields cleanup and grouping filter on.
    async fn ensure_payload_indexes(&self) -> Result<(), QdrantError> {
        let fields: [(&str, &str); 6] = [
            ("file_path", "keyword"),
            ("file_type", "keyword"),
            ("category", "keyword"),
            ("context", "keyword"),
            ("tags", "keyword"),
            ("chunk_index", "integer"),
        ];

        for (field, schema) in fields {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(
                    Method::PUT,
                    &format!("collections/{}/index", self.collection),
                )
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                tracing::debug!(collection = %self.collection, field, schema, "Payload index ensured");
            } else if response.status() == StatusCode::CONFLICT {
                tracing::debug!(collection = %self.collection, field, schema, "Payload index already exists");
            } else {
                let error = unexpected_status(response).await;
                tracing::warn!(collection = %self.collection, field, schema, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => {
                let error = unexpected_status(response).await;
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    /// Exact record count, optionally restricted by a filter.
    ///
    /// A missing collection counts as zero records rather than an error, which
    /// lets status and cleanup run before the first indexing pass.
    async fn count(&self, filter: Option<Value>) -> Result<usize, QdrantError> {
        let body = match filter {
            Some(filter_value) => json!({ "exact": true, "filter": filter_value }),
            None => json!({ "exact": true }),
        };

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/count", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(collection = %self.collection, error = %error, "Point count failed");
            return Err(error);
        }

        let payload: CountResponse = response.json().await?;
        Ok(payload.result.count)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format_endpoint(&self.base_url, path));
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            builder = builder.header("api-key", api_key);
        }
        builder
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            return Ok(());
        }
        let error = unexpected_status(response).await;
        tracing::error!(error = %error, "Qdrant request failed");
        Err(error)
    }
}

/// Drain an error response into the status-and-body error variant.
async fn unexpected_status(response: reqwest::Response) -> QdrantError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    QdrantError::UnexpectedStatus { status, body }
}

#[async_trait]
impl SearchIndex for QdrantService {
    async fn ensure_ready(&self) -> Result<(), QdrantError> {
        if !self.collection_exists().await? {
            tracing::debug!(
                collection = %self.collection,
                vector_size = self.vector_size,
                "Creating collection"
            );
            self.create_collection().await?;
        }
        self.ensure_payload_indexes().await?;
        Ok(())
    }

    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<UpsertReport, QdrantError> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }

        let now = current_timestamp_rfc3339();
        let points: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "vector": record.vector,
                    "payload": build_payload(record, &now),
                })
            })
            .collect();

        let point_count = points.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, points = point_count, "Points upserted");
        })
        .await?;

        Ok(UpsertReport {
            succeeded: point_count,
            failed: 0,
        })
    }

    async fn delete_by_file_path(&self, file_path: &str) -> Result<usize, QdrantError> {
        let filter = file_path_filter(file_path);
        let existing = self.count(Some(filter.clone())).await?;
        if existing == 0 {
            return Ok(0);
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/delete", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, file_path, records = existing, "Records deleted");
        })
        .await?;

        Ok(existing)
    }

    async fn delete_all(&self) -> Result<usize, QdrantError> {
        let prior = self.count(None).await?;

        let response = self
            .request(Method::DELETE, &format!("collections/{}", self.collection))
            .send()
            .await?;
        // Dropping a collection that never existed is still an empty collection.
        if response.status() != StatusCode::NOT_FOUND {
            self.ensure_success(response, || {
                tracing::debug!(collection = %self.collection, "Collection dropped");
            })
            .await?;
        }

        self.create_collection().await?;
        self.ensure_payload_indexes().await?;
        Ok(prior)
    }

    async fn document_count(&self) -> Result<usize, QdrantError> {
        self.count(None).await
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let trimmed = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&trimmed);
    Ok(parsed.into())
}

fn format_endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
