//! HTTP client for the fleet cluster API.
//!
//! The endpoint URL scheme selects the transport:
//! - `unix` / `file`: HTTP framed over a local domain socket
//! - `http` / `https`: standard HTTP transport
//!
//! Any other scheme is a configuration error.

use std::time::Duration;

use async_trait::async_trait;
use hyper::{body::Buf, Body, Client, Method, Request};
use hyperlocal::{UnixClientExt, UnixConnector, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::api::FleetApi;
use crate::error::FleetError;
use crate::schema::{TargetState, Unit, UnitStatesPage, UnitStatus};

const API_PREFIX: &str = "/fleet/v1";

/// Fleet API client over a scheme-selected transport.
#[derive(Debug)]
pub struct HttpFleetClient {
    transport: Transport,
}

#[derive(Debug)]
enum Transport {
    /// Standard HTTP(S) transport.
    Remote {
        client: reqwest::Client,
        base_url: String,
    },
    /// HTTP over a local domain socket.
    Local {
        client: Client<UnixConnector>,
        socket_path: String,
    },
}

impl HttpFleetClient {
    /// Create a client for the given endpoint URL.
    pub fn new(endpoint: &str) -> Result<Self, FleetError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| FleetError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        let transport = match url.scheme() {
            "unix" | "file" => {
                if url.host_str().is_some_and(|h| !h.is_empty()) {
                    return Err(FleetError::InvalidEndpoint(format!(
                        "cannot connect to host {:?} with scheme {:?}",
                        url.host_str().unwrap_or_default(),
                        url.scheme()
                    )));
                }
                Transport::Local {
                    client: Client::unix(),
                    socket_path: url.path().to_string(),
                }
            }
            "http" | "https" => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()
                    .expect("Failed to build HTTP client");
                Transport::Remote {
                    client,
                    base_url: endpoint.trim_end_matches('/').to_string(),
                }
            }
            other => {
                return Err(FleetError::InvalidEndpoint(format!(
                    "unknown scheme in fleet endpoint: {other}"
                )))
            }
        };

        Ok(Self { transport })
    }

    /// Perform a GET request and decode the JSON response.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FleetError> {
        debug!(path = path, "GET request to fleet API");
        match &self.transport {
            Transport::Remote { client, base_url } => {
                let response = client.get(format!("{base_url}{path}")).send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok(response.json().await?)
                } else {
                    let message = response.text().await.unwrap_or_default();
                    Err(FleetError::Http {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
            Transport::Local {
                client,
                socket_path,
            } => {
                let request = Request::builder()
                    .method(Method::GET)
                    .uri(Uri::new(socket_path, path))
                    .header("Accept", "application/json")
                    .body(Body::empty())?;

                let response = client.request(request).await?;
                let status = response.status();
                let body = hyper::body::aggregate(response.into_body()).await?;

                if status.is_success() {
                    Ok(serde_json::from_reader(body.reader())?)
                } else {
                    Err(FleetError::Http {
                        status: status.as_u16(),
                        message: String::from_utf8_lossy(body.chunk()).to_string(),
                    })
                }
            }
        }
    }

    /// Perform a PUT request with a JSON body; the response body is discarded.
    async fn put_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), FleetError> {
        debug!(path = path, "PUT request to fleet API");
        match &self.transport {
            Transport::Remote { client, base_url } => {
                let response = client
                    .put(format!("{base_url}{path}"))
                    .json(body)
                    .send()
                    .await?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    let message = response.text().await.unwrap_or_default();
                    Err(FleetError::Http {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
            Transport::Local {
                client,
                socket_path,
            } => {
                let body_bytes = serde_json::to_vec(body)?;
                let request = Request::builder()
                    .method(Method::PUT)
                    .uri(Uri::new(socket_path, path))
                    .header("Content-Type", "application/json")
                    .header("Accept", "application/json")
                    .body(Body::from(body_bytes))?;

                let response = client.request(request).await?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    let buf = hyper::body::aggregate(response.into_body()).await?;
                    Err(FleetError::Http {
                        status: status.as_u16(),
                        message: String::from_utf8_lossy(buf.chunk()).to_string(),
                    })
                }
            }
        }
    }

    fn map_not_found(err: FleetError, name: &str) -> FleetError {
        match err {
            FleetError::Http { status: 404, .. } => FleetError::NotFound(name.to_string()),
            other => other,
        }
    }
}

/// Percent-encode a path segment or query value.
///
/// Unit names can carry characters with URL meaning (template units contain
/// `@`, and `#`/`?` are representable), so everything outside the RFC 3986
/// unreserved set is encoded.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[async_trait]
impl FleetApi for HttpFleetClient {
    async fn list_unit_states(&self) -> Result<Vec<UnitStatus>, FleetError> {
        let mut states = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let path = match &page_token {
                Some(token) => {
                    format!("{API_PREFIX}/state?nextPageToken={}", encode_component(token))
                }
                None => format!("{API_PREFIX}/state"),
            };
            let page: UnitStatesPage = self.get_json(&path).await?;
            states.extend(page.states);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(states)
    }

    async fn get_unit(&self, name: &str) -> Result<Unit, FleetError> {
        self.get_json(&format!("{API_PREFIX}/units/{}", encode_component(name)))
            .await
            .map_err(|e| Self::map_not_found(e, name))
    }

    async fn set_unit_target_state(
        &self,
        name: &str,
        target: TargetState,
    ) -> Result<(), FleetError> {
        #[derive(Serialize)]
        struct SetDesiredState<'a> {
            #[serde(rename = "desiredState")]
            desired_state: &'a str,
        }

        self.put_json(
            &format!("{API_PREFIX}/units/{}", encode_component(name)),
            &SetDesiredState {
                desired_state: target.as_str(),
            },
        )
        .await
        .map_err(|e| Self::map_not_found(e, name))
    }
}
