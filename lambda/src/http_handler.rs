use std::convert::Infallible;

use bytes::Bytes;
use factcheck_relay::UploadRelay;
use futures::{future, stream};
use lambda_http::{Body, Error, Request, Response};

/// API Gateway hands over the whole body at once, so it reaches the decoder as a single chunk.
pub(crate) async fn function_handler(
    relay: &UploadRelay,
    event: Request,
) -> Result<Response<Body>, Error> {
    let (parts, body) = event.into_parts();
    let bytes = match body {
        Body::Empty => Bytes::new(),
        Body::Text(text) => Bytes::from(text),
        Body::Binary(data) => Bytes::from(data),
    };
    let body = stream::once(future::ready(Ok::<_, Infallible>(bytes)));

    let response = relay.handle(&parts.method, &parts.headers, body).await;

    let (parts, bytes) = response.into_parts();
    let body = if bytes.is_empty() {
        Body::Empty
    } else {
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Body::Text(text),
            Err(e) => Body::Binary(e.into_bytes()),
        }
    };
    Ok(Response::from_parts(parts, body))
}
