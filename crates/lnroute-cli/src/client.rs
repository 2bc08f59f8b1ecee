//! JSON client for the node's HTTP API.

use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9737";

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct ApiClient {
    endpoint: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        self.get_query(path, &[] as &[(&str, &str)]).await
    }

    pub async fn get_query<T, Q>(&self, path: &str, query: &Q) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .with_context(|| self.unreachable())?;
        decode(resp).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| self.unreachable())?;
        decode(resp).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self
            .http
            .delete(self.url(path))
            .send()
            .await
            .with_context(|| self.unreachable())?;
        decode(resp).await
    }

    fn unreachable(&self) -> String {
        format!(
            "could not reach node at {} (is lnroute-node running?)",
            self.endpoint
        )
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    match resp.json::<ErrorResponse>().await {
        Ok(err) => anyhow::bail!("node returned HTTP {}: {}", status, err.error),
        Err(_) => anyhow::bail!("node returned HTTP {}", status),
    }
}
