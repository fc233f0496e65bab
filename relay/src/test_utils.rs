//! Helpers for building inbound multipart requests in tests.

use std::convert::Infallible;

use bytes::Bytes;
use futures::{stream, Stream};
use reqwest::Url;

use crate::config::RelayConfig;

pub const BOUNDARY: &str = "----relayTestBoundary7MA4YWxk";

pub enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: Option<&'a str>,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

impl<'a> Part<'a> {
    pub fn pdf(data: &'a [u8]) -> Self {
        Part::File {
            name: "file",
            filename: "claim.pdf",
            content_type: Some("application/pdf"),
            data,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                    )
                    .as_bytes(),
                );
                if let Some(ct) = content_type {
                    out.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
                }
                out.extend_from_slice(b"\r\n");
                out.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    out
}

pub fn content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

pub fn chunked(body: Vec<u8>, size: usize) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let chunks: Vec<_> = body
        .chunks(size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(chunks)
}

pub fn config(upstream: &str) -> RelayConfig {
    RelayConfig::new(Url::parse(upstream).unwrap())
}
