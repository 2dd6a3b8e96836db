//! Data access against a managed backend's REST interface (PostgREST dialect).

use async_trait::async_trait;
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

use super::{DataAccess, DataError, Filter, Row, Select};

pub struct RestClient {
    client: Client,
    base_url: Url,
    service_key: String,
}

impl RestClient {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self, DataError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(RestClient {
            client: Client::new(),
            base_url: base_url.join("rest/v1/")?,
            service_key: service_key.to_string(),
        })
    }

    fn collection_url(&self, collection: &str) -> Result<Url, DataError> {
        Ok(self.base_url.join(collection)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    pub fn select_url(&self, query: &Select) -> Result<Url, DataError> {
        let mut url = self.collection_url(&query.collection)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", &select_clause(query));
            for filter in &query.filters {
                pairs.append_pair(&filter.column, &eq_operand(&filter.value));
            }
            if let Some(order) = &query.order {
                let direction = if order.ascending { "asc" } else { "desc" };
                pairs.append_pair("order", &format!("{}.{}", order.column, direction));
            }
        }
        Ok(url)
    }

    pub fn filtered_url(&self, collection: &str, filter: &Filter) -> Result<Url, DataError> {
        let mut url = self.collection_url(collection)?;
        url.query_pairs_mut()
            .append_pair(&filter.column, &eq_operand(&filter.value));
        Ok(url)
    }

    pub fn select_request(&self, query: &Select) -> Result<Request, DataError> {
        Ok(self.request(Method::GET, self.select_url(query)?).build()?)
    }

    pub fn insert_request(&self, collection: &str, record: Row) -> Result<Request, DataError> {
        Ok(self
            .request(Method::POST, self.collection_url(collection)?)
            .header("Prefer", "return=minimal")
            .json(&[record])
            .build()?)
    }

    pub fn update_request(&self, collection: &str, patch: Row, filter: &Filter) -> Result<Request, DataError> {
        Ok(self
            .request(Method::PATCH, self.filtered_url(collection, filter)?)
            .header("Prefer", "return=minimal")
            .json(&patch)
            .build()?)
    }

    pub fn delete_request(&self, collection: &str, filter: &Filter) -> Result<Request, DataError> {
        Ok(self
            .request(Method::DELETE, self.filtered_url(collection, filter)?)
            .build()?)
    }

    async fn send(&self, request: Request) -> Result<Response, DataError> {
        let response = self.client.execute(request).await?;
        check(response).await
    }
}

fn select_clause(query: &Select) -> String {
    let mut clause = query.columns.join(",");
    if let Some(join) = &query.join {
        clause.push_str(&format!(",{}({})", join.collection, join.columns.join(",")));
    }
    clause
}

fn eq_operand(value: &Value) -> String {
    match value {
        Value::String(s) => format!("eq.{}", s),
        other => format!("eq.{}", other),
    }
}

/// Turns a non-success response into a backend error carrying its message.
async fn check(response: Response) -> Result<Response, DataError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = error_body(status, response.text().await);
    Err(DataError::Backend(error_message(status.as_u16(), &body)))
}

fn error_body(status: StatusCode, read: Result<String, reqwest::Error>) -> String {
    match read {
        Ok(body) => body,
        Err(err) => {
            log::warn!("Failed to read backend error body ({}): {}", status, err);
            String::new()
        }
    }
}

fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("Backend responded with status {}", status)
            } else {
                body.to_string()
            }
        })
}

#[async_trait]
impl DataAccess for RestClient {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, DataError> {
        let response = self.send(self.select_request(query)?).await?;
        Ok(response.json::<Vec<Row>>().await?)
    }

    async fn insert(&self, collection: &str, record: Row) -> Result<(), DataError> {
        self.send(self.insert_request(collection, record)?).await?;
        Ok(())
    }

    async fn update(&self, collection: &str, patch: Row, filter: &Filter) -> Result<(), DataError> {
        self.send(self.update_request(collection, patch, filter)?).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<(), DataError> {
        self.send(self.delete_request(collection, filter)?).await?;
        Ok(())
    }
}
