//! Record fetching.
//!
//! List endpoints answer in one of three shapes: a bare JSON array, an object
//! wrapping the array at some path (optionally with `maxPage`), or something
//! else entirely. [`ApiListResponse`] names the shapes and
//! [`ApiListResponse::into_page`] turns any of them into a [`RecordPage`].

use crate::auth::AuthContext;
use crate::config::{ApiConfig, Endpoint, RecordSchema};
use crate::error::{ConfigError, FetchError, Result};
use crate::filters::FilterState;
use crate::types::Record;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

/// Everything needed to issue one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Endpoint being queried.
    pub endpoint: Endpoint,
    /// Active filters as query parameters.
    pub filters: Vec<(&'static str, String)>,
    /// Requested page, for paginated endpoints.
    pub page: Option<u32>,
    /// Store scoping the request.
    pub store: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
}

impl ListQuery {
    /// Anonymous query for `endpoint` with `filters`.
    #[must_use]
    pub fn new(endpoint: &Endpoint, filters: &FilterState) -> Self {
        Self {
            endpoint: endpoint.clone(),
            filters: filters.query_pairs(),
            page: None,
            store: None,
            token: None,
        }
    }

    /// Request `page`. Ignored for endpoints without pagination.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        if self.endpoint.paginated {
            self.page = Some(page);
        }
        self
    }

    /// Scope and authenticate the request with a session.
    #[must_use]
    pub fn with_auth(mut self, auth: &AuthContext) -> Self {
        self.store.clone_from(&auth.store);
        self.token = Some(auth.login_token.clone());
        self
    }

    /// All query parameters in order: filters, `store`, `page`.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.filters.clone();
        if let Some(store) = &self.store {
            pairs.push(("store", store.clone()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        pairs
    }
}

/// One page of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    /// Normalized rows.
    pub records: Vec<Record>,
    /// Page count reported by the backend.
    pub total_pages: Option<u32>,
}

impl RecordPage {
    /// A page with no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A page holding `records`.
    #[must_use]
    pub const fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            total_pages: None,
        }
    }

    /// Set the page count.
    #[must_use]
    pub const fn with_total_pages(mut self, total_pages: u32) -> Self {
        self.total_pages = Some(total_pages);
        self
    }
}

/// Shape of a list response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiListResponse {
    /// A bare array of items.
    Flat(Vec<Value>),
    /// Items nested in an object.
    Wrapped {
        /// The items.
        items: Vec<Value>,
        /// `maxPage` found next to the items or at the root.
        max_page: Option<u32>,
    },
    /// Any other JSON value.
    Empty,
}

impl ApiListResponse {
    /// Classify a decoded body. `collection` is the dotted path of the item
    /// array inside wrapped responses.
    #[must_use]
    pub fn from_value(value: Value, collection: Option<&str>) -> Self {
        match value {
            Value::Array(items) => Self::Flat(items),
            Value::Object(root) => {
                let Some(path) = collection else {
                    return Self::Empty;
                };

                let mut parent = &root;
                let mut segments = path.split('.').peekable();
                while let Some(segment) = segments.next() {
                    match (parent.get(segment), segments.peek().is_some()) {
                        (Some(Value::Object(inner)), true) => parent = inner,
                        (Some(Value::Array(items)), false) => {
                            let max_page = max_page(parent).or_else(|| max_page(&root));
                            return Self::Wrapped {
                                items: items.clone(),
                                max_page,
                            };
                        },
                        _ => return Self::Empty,
                    }
                }
                Self::Empty
            },
            _ => Self::Empty,
        }
    }

    /// Normalize the items into records. Items without a usable id are
    /// skipped.
    #[must_use]
    pub fn into_page(self, schema: &RecordSchema) -> RecordPage {
        let (items, total_pages) = match self {
            Self::Flat(items) => (items, None),
            Self::Wrapped { items, max_page } => (items, max_page),
            Self::Empty => (Vec::new(), None),
        };

        let received = items.len();
        let records: Vec<Record> = items
            .into_iter()
            .filter_map(|item| record_from_json(item, schema))
            .collect();
        if records.len() < received {
            tracing::warn!(
                skipped = received - records.len(),
                "Skipped list items without a usable id"
            );
        }

        RecordPage {
            records,
            total_pages,
        }
    }
}

fn max_page(object: &Map<String, Value>) -> Option<u32> {
    match object.get("maxPage")? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn record_from_json(item: Value, schema: &RecordSchema) -> Option<Record> {
    let Value::Object(mut fields) = item else {
        return None;
    };

    let id = fields.remove(&schema.id).and_then(scalar_text)?;
    let group_key = schema
        .group_key
        .as_ref()
        .and_then(|column| fields.remove(column))
        .and_then(scalar_text);
    let occurred_at = fields
        .remove(&schema.occurred_at)
        .and_then(scalar_text)
        .unwrap_or_default();
    let status = schema
        .status
        .as_ref()
        .and_then(|column| fields.remove(column))
        .and_then(scalar_text);

    Some(Record {
        id,
        group_key,
        occurred_at,
        status,
        fields,
    })
}

/// Source of list pages.
pub trait RecordSource: Send + Sync {
    /// Fetch one page.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] when the endpoint's time budget runs
    /// out, [`FetchError::NetworkUnavailable`] on transport failures and
    /// [`FetchError::MalformedResponse`] for non-2xx or non-JSON answers.
    fn fetch(&self, query: &ListQuery) -> impl Future<Output = Result<RecordPage>> + Send;
}

/// [`RecordSource`] speaking HTTP to the storefront backend.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpRecordSource {
    /// Create a source for the backend in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> std::result::Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Backend configuration.
    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn send(&self, query: &ListQuery, timeout: Duration) -> Result<(u16, Vec<u8>)> {
        let url = self.config.endpoint_url(&query.endpoint.path);

        let mut request = self.client.get(&url).query(&query.query_pairs());
        if let Some(token) = &query.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_transport(&e, timeout))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_transport(&e, timeout))?;

        Ok((status, body.to_vec()))
    }
}

impl RecordSource for HttpRecordSource {
    #[tracing::instrument(skip(self, query), fields(endpoint = %query.endpoint.name, page = ?query.page))]
    async fn fetch(&self, query: &ListQuery) -> Result<RecordPage> {
        let timeout = query.endpoint.timeout;

        let (status, body) = tokio::time::timeout(timeout, self.send(query, timeout))
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;

        if !(200..300).contains(&status) {
            let snippet: String = String::from_utf8_lossy(&body).chars().take(200).collect();
            tracing::warn!(status, body = %snippet, "List request rejected");
            return Err(FetchError::MalformedResponse(format!("HTTP {status}")));
        }

        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| FetchError::MalformedResponse(format!("Invalid JSON: {e}")))?;

        let page = ApiListResponse::from_value(value, query.endpoint.collection.as_deref())
            .into_page(&query.endpoint.schema);

        tracing::debug!(
            records = page.records.len(),
            total_pages = ?page.total_pages,
            "Fetched list page"
        );
        Ok(page)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filters::FilterField;
    use serde_json::json;

    #[test]
    fn flat_arrays_normalize_directly() {
        let body = json!([
            {"id": 1, "created_at": "2024-05-01 08:00:00", "name": "Ao"},
            {"id": "2", "created_at": "2024-05-01 09:00:00"}
        ]);

        let page = ApiListResponse::from_value(body, None)
            .into_page(&RecordSchema::new("id", "created_at"));

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].id, "1");
        assert_eq!(page.records[0].field("name"), Some(&json!("Ao")));
        assert_eq!(page.total_pages, None);
    }

    #[test]
    fn wrapped_responses_read_items_and_max_page() {
        let body = json!({
            "data": {
                "orders": [
                    {"id": 10, "order_id": 5, "created_at": "2024-05-01", "status": 1}
                ],
                "maxPage": 3
            }
        });
        let endpoint = Endpoint::orders();

        let response = ApiListResponse::from_value(body, endpoint.collection.as_deref());
        assert!(matches!(
            response,
            ApiListResponse::Wrapped {
                max_page: Some(3),
                ..
            }
        ));

        let page = response.into_page(&endpoint.schema);
        let record = &page.records[0];
        assert_eq!(record.group_key.as_deref(), Some("5"));
        assert_eq!(record.status.as_deref(), Some("1"));
        assert!(record.field("order_id").is_none());
        assert_eq!(page.total_pages, Some(3));
    }

    #[test]
    fn root_level_max_page_is_found() {
        let body = json!({"product": [], "maxPage": "4"});

        let response = ApiListResponse::from_value(body, Some("product"));

        assert_eq!(
            response,
            ApiListResponse::Wrapped {
                items: Vec::new(),
                max_page: Some(4)
            }
        );
    }

    #[test]
    fn unexpected_shapes_are_empty() {
        assert_eq!(
            ApiListResponse::from_value(json!({"message": "ok"}), Some("data.orders")),
            ApiListResponse::Empty
        );
        assert_eq!(
            ApiListResponse::from_value(json!({"data": []}), Some("data.orders")),
            ApiListResponse::Empty
        );
        assert_eq!(
            ApiListResponse::from_value(json!("nothing"), None),
            ApiListResponse::Empty
        );
        assert_eq!(
            ApiListResponse::from_value(json!({"items": []}), None),
            ApiListResponse::Empty
        );
        assert_eq!(
            ApiListResponse::Empty.into_page(&RecordSchema::new("id", "at")),
            RecordPage::empty()
        );
    }

    #[test]
    fn items_without_id_are_skipped() {
        let body = json!([{"name": "no id"}, 7, {"id": 3, "at": "2024-05-01"}]);

        let page = ApiListResponse::from_value(body, None).into_page(&RecordSchema::new("id", "at"));

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, "3");
    }

    #[test]
    fn query_pairs_include_store_and_page() {
        let filters = FilterState::new().with(FilterField::Status, "paid");
        let query = ListQuery::new(&Endpoint::orders(), &filters)
            .with_page(2)
            .with_auth(&AuthContext::new("1", "tok").with_store("9"));

        assert_eq!(
            query.query_pairs(),
            vec![
                ("status", "paid".to_string()),
                ("store", "9".to_string()),
                ("page", "2".to_string()),
            ]
        );
        assert_eq!(query.token.as_deref(), Some("tok"));
    }

    #[test]
    fn page_is_dropped_for_unpaginated_endpoints() {
        let query = ListQuery::new(&Endpoint::inventory(), &FilterState::new()).with_page(3);
        assert_eq!(query.page, None);
    }
}
