use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use http::{
    header::{ALLOW, CONTENT_TYPE},
    HeaderMap, HeaderValue, Method, Response, StatusCode,
};
use reqwest::Url;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::{
    config::{RelayConfig, SecondarySink},
    cors,
    error::{excerpt, RelayError},
    multipart::{build_form, decode, DecodedForm},
};

/// Relays multipart uploads to the configured webhook.
///
/// Cheap to clone: the config and the HTTP client are shared.
#[derive(Clone)]
pub struct UploadRelay {
    config: Arc<RelayConfig>,
    client: reqwest::Client,
}

impl UploadRelay {
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    /// Handles one inbound request. Never fails: every error becomes a JSON error response.
    pub async fn handle<S, O, E>(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: S,
    ) -> Response<Bytes>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let span = info_span!("relay", request_id = %Uuid::new_v4(), %method);
        async move {
            let mut response = match self.dispatch(method, headers, body).await {
                Ok(response) => {
                    info!(status = %response.status(), "Responded");
                    response
                }
                Err(err) => self.error_response(&err),
            };
            cors::apply(response.headers_mut());
            response
        }
        .instrument(span)
        .await
    }

    async fn dispatch<S, O, E>(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: S,
    ) -> Result<Response<Bytes>, RelayError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        if method == Method::OPTIONS {
            let mut response = Response::new(Bytes::new());
            *response.status_mut() = StatusCode::OK;
            return Ok(response);
        }
        if method != Method::POST {
            return Err(RelayError::MethodNotAllowed(method.clone()));
        }

        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        info!("Parsing upload");
        let form = decode(content_type, body, &self.config).await?;
        info!(
            filename = %form.upload.filename,
            mime = %form.upload.mime_type,
            size = form.upload.content.len(),
            "Upload parsed"
        );

        let payload = self.forward(form).await?;
        Ok(json_response(StatusCode::OK, payload))
    }

    /// Sends the upload to the webhook and, if configured, to the secondary sink.
    async fn forward(&self, form: DecodedForm) -> Result<Bytes, RelayError> {
        match &self.config.secondary {
            None => self.send_primary(&form).await,
            Some(sink) if sink.wait_for_result => {
                let (result, ()) =
                    tokio::join!(self.send_primary(&form), self.send_secondary(sink, &form));
                result
            }
            Some(sink) => {
                let relay = self.clone();
                let sink = sink.clone();
                let copy = form.clone();
                tokio::spawn(
                    async move { relay.send_secondary(&sink, &copy).await }
                        .instrument(Span::current()),
                );
                self.send_primary(&form).await
            }
        }
    }

    async fn send_primary(&self, form: &DecodedForm) -> Result<Bytes, RelayError> {
        let url = &self.config.upstream_url;
        let limit = self.config.excerpt_limit;

        info!(%url, "Forwarding upload to webhook");
        let response = self.post(url, form).await?;
        let status = response.status();
        debug!(%status, headers = ?response.headers(), "Awaiting webhook body");

        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            error!(%status, body = %excerpt(&text, limit), "Webhook error");
            return Err(RelayError::UpstreamHttpError {
                status,
                details: excerpt(&text, limit),
            });
        }

        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(_) => {
                debug!(len = text.len(), "Webhook returned valid JSON");
                Ok(Bytes::from(text))
            }
            Err(e) => Err(RelayError::UpstreamInvalidJson {
                reason: e.to_string(),
                details: excerpt(&text, limit),
            }),
        }
    }

    /// Outcome is only logged; it never affects the primary response.
    async fn send_secondary(&self, sink: &SecondarySink, form: &DecodedForm) {
        match self.post(&sink.url, form).await {
            Ok(response) if response.status().is_success() => {
                debug!(
                    url = %sink.url,
                    status = %response.status(),
                    "Secondary sink accepted upload"
                );
            }
            Ok(response) => {
                warn!(
                    url = %sink.url,
                    status = %response.status(),
                    "Secondary sink rejected upload"
                );
            }
            Err(err) => {
                warn!(url = %sink.url, error = %err, "Secondary sink dispatch failed");
            }
        }
    }

    async fn post(&self, url: &Url, form: &DecodedForm) -> Result<reqwest::Response, RelayError> {
        let body = build_form(form).await?;
        self.client
            .post(url.clone())
            .multipart(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::UpstreamTimeout(self.config.upstream_timeout)
        } else {
            RelayError::UpstreamUnreachable(err.to_string())
        }
    }

    fn error_response(&self, err: &RelayError) -> Response<Bytes> {
        let status = err.status_code(self.config.passthrough_upstream_status);
        if err.is_client_error() {
            warn!(%status, kind = %err.kind(), "Rejected request: {err}");
        } else {
            error!(%status, kind = %err.kind(), "Relay failed: {err}");
        }

        let body = serde_json::to_vec(&err.to_body()).unwrap_or_default();
        let mut response = json_response(status, Bytes::from(body));
        if let RelayError::MethodNotAllowed(_) = err {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(cors::ALLOWED_METHODS));
        }
        response
    }
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Bytes> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
