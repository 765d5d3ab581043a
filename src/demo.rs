//! Example handler served by the binary.
//!
//! Answers `GET /` with a small JSON status document after calling the
//! configured upstreams: the first one alone, then the rest concurrently.
//! The outbound calls go through [`TracedClient`], so they show up as client
//! spans under the request span.

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::future::join_all;
use serde::Serialize;

use crate::http::context::current_span;
use crate::http::middleware::{BoxError, Handler, MiddlewareResult};
use crate::tracer::TracedClient;

#[derive(Debug, Serialize)]
pub struct ExampleResponse {
    pub service: String,
    pub status: u16,
    pub version: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone)]
pub struct ExampleHandler {
    service: String,
    upstreams: Vec<String>,
    client: reqwest::Client,
}

impl ExampleHandler {
    pub fn new(service: impl Into<String>, upstreams: Vec<String>) -> Self {
        Self {
            service: service.into(),
            upstreams,
            client: reqwest::Client::new(),
        }
    }

    async fn call_upstreams(&self) -> Result<(), BoxError> {
        let Some((first, rest)) = self.upstreams.split_first() else {
            return Ok(());
        };
        let span = current_span().ok_or("upstream calls need a request span")?;
        let client = TracedClient::with_client(self.client.clone(), span.tracer().clone());

        client.get(first).await?.error_for_status()?;
        for result in join_all(rest.iter().map(|url| client.get(url))).await {
            result?.error_for_status()?;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for ExampleHandler {
    fn name(&self) -> &str {
        "ExampleHandler"
    }

    async fn call(&self, req: Request) -> MiddlewareResult {
        if req.method() != Method::GET {
            return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }

        self.call_upstreams().await?;

        Ok(Json(ExampleResponse {
            service: self.service.clone(),
            status: 200,
            version: env!("CARGO_PKG_VERSION"),
            message: "ok",
        })
        .into_response())
    }
}
