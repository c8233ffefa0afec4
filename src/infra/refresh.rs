//! HTTP refresher: warms a target by requesting its URL.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use tracing::debug;

use crate::config::TargetSettings;
use crate::warming::{RefreshError, Refresher, TargetRegistry, WarmingTarget};

use super::error::InfraError;

pub fn user_agent() -> &'static str {
    concat!("prewarm/", env!("CARGO_PKG_VERSION"))
}

pub fn build_client() -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(user_agent())
        .build()
        .map_err(|err| InfraError::http_client(err.to_string()))
}

/// Issues one request per refresh. Any 2xx counts as warmed; the body is
/// drained so the upstream finishes rendering.
pub struct HttpRefresher {
    client: Client,
    method: Method,
    url: Url,
}

impl HttpRefresher {
    pub fn new(client: Client, method: Method, url: Url) -> Self {
        Self {
            client,
            method,
            url,
        }
    }
}

#[async_trait]
impl Refresher for HttpRefresher {
    async fn refresh(&self) -> Result<(), RefreshError> {
        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .send()
            .await
            .map_err(|err| RefreshError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| RefreshError::Request(err.to_string()))?;
        debug!(
            target = "prewarm::refresh",
            url = %self.url,
            status = status.as_u16(),
            bytes = body.len(),
            "refresh request completed"
        );
        Ok(())
    }
}

/// Build the registry from configured targets, sharing one HTTP client.
pub fn build_registry(
    targets: &[TargetSettings],
    client: &Client,
) -> Result<TargetRegistry, InfraError> {
    let targets = targets
        .iter()
        .map(|target| {
            WarmingTarget::new(
                target.id.clone(),
                target.kind,
                target.priority,
                Arc::new(HttpRefresher::new(
                    client.clone(),
                    target.method.clone(),
                    target.url.clone(),
                )),
            )
        })
        .collect();
    Ok(TargetRegistry::new(targets)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Priority, TargetKind};
    use axum::{Router, http::StatusCode, routing::get};
    use tokio::net::TcpListener;

    async fn upstream() -> Url {
        let router = Router::new()
            .route("/ok", get(|| async { "warm" }))
            .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        Url::parse(&format!("http://{addr}/")).expect("url")
    }

    fn refresher(url: Url) -> HttpRefresher {
        HttpRefresher::new(build_client().expect("client"), Method::GET, url)
    }

    fn target(id: &str) -> TargetSettings {
        TargetSettings {
            id: id.to_string(),
            kind: TargetKind::Page,
            priority: Priority::High,
            url: Url::parse("http://127.0.0.1:9/").expect("url"),
            method: Method::GET,
        }
    }

    #[test]
    fn duplicate_configured_ids_are_rejected() {
        let client = build_client().expect("client");
        let err = build_registry(&[target("/"), target("/")], &client)
            .expect_err("duplicate ids");
        assert!(matches!(err, InfraError::Registry(_)));
    }

    #[test]
    fn registry_keeps_configured_order() {
        let client = build_client().expect("client");
        let registry =
            build_registry(&[target("/b"), target("/a")], &client).expect("registry");
        let ids: Vec<&str> = registry.list().iter().map(WarmingTarget::id).collect();
        assert_eq!(ids, vec!["/b", "/a"]);
    }

    #[tokio::test]
    async fn success_status_counts_as_warmed() {
        let base = upstream().await;
        refresher(base.join("ok").expect("url"))
            .refresh()
            .await
            .expect("2xx is warmed");
    }

    #[tokio::test]
    async fn error_status_is_reported_with_its_code() {
        let base = upstream().await;
        let err = refresher(base.join("down").expect("url"))
            .refresh()
            .await
            .expect_err("503 fails");
        assert!(matches!(err, RefreshError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/")).expect("url");
        let err = refresher(url).refresh().await.expect_err("closed port");
        assert!(matches!(err, RefreshError::Request(_)));
    }
}
