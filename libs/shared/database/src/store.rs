use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// REST client for the clinic's relational store (PostgREST dialect).
///
/// All access goes through the service key; the engine is a trusted
/// backend component and never impersonates end users.
pub struct StoreClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl StoreClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.store_url.clone(),
            service_key: config.store_service_key.clone(),
        }
    }

    fn get_headers(&self, extra: Option<(&'static str, &str)>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key).unwrap());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key)).unwrap(),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some((name, value)) = extra {
            headers.insert(name, HeaderValue::from_str(value).unwrap());
        }

        headers
    }

    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_header: Option<(&'static str, &str)>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Store request {} {}", method, url);

        let headers = self.get_headers(extra_header);

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Store error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Store authentication error: {}", error_text),
                404 => anyhow!("Store resource not found: {}", error_text),
                409 => anyhow!("Store conflict: {}", error_text),
                _ => anyhow!("Store error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET on `/rest/v1/{table}?{query}`, deserialized into a row list.
    pub async fn select<T>(&self, table: &str, query: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let path = if query.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query)
        };
        self.request(Method::GET, &path, None, None).await
    }

    /// Convenience for queries expected to match at most one row.
    pub async fn select_one<T>(&self, table: &str, query: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self.select(table, &format!("{}&limit=1", query)).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// INSERT returning the created row.
    pub async fn insert_returning<T>(&self, table: &str, body: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}", table);
        let mut rows: Vec<T> = self
            .request(
                Method::POST,
                &path,
                Some(body),
                Some(("Prefer", "return=representation")),
            )
            .await?;

        if rows.is_empty() {
            return Err(anyhow!("Insert into {} returned no rows", table));
        }
        Ok(rows.remove(0))
    }

    /// UPSERT keyed on `on_conflict` columns, returning the merged row.
    pub async fn upsert_returning<T>(&self, table: &str, on_conflict: &str, body: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?on_conflict={}", table, on_conflict);
        let mut rows: Vec<T> = self
            .request(
                Method::POST,
                &path,
                Some(body),
                Some(("Prefer", "resolution=merge-duplicates,return=representation")),
            )
            .await?;

        if rows.is_empty() {
            return Err(anyhow!("Upsert into {} returned no rows", table));
        }
        Ok(rows.remove(0))
    }

    /// PATCH rows matched by `query`; returns updated rows.
    pub async fn update<T>(&self, table: &str, query: &str, body: Value) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?{}", table, query);
        self.request(
            Method::PATCH,
            &path,
            Some(body),
            Some(("Prefer", "return=representation")),
        )
        .await
    }

    /// DELETE rows matched by `query`.
    pub async fn delete(&self, table: &str, query: &str) -> Result<()> {
        let path = format!("/rest/v1/{}?{}", table, query);
        let _: Vec<Value> = self
            .request(
                Method::DELETE,
                &path,
                None,
                Some(("Prefer", "return=representation")),
            )
            .await?;
        Ok(())
    }
}
