use std::collections::{btree_map::Entry, BTreeMap};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use multer::{Constraints, Field, Multipart, SizeLimit};
use tracing::{debug, warn};

use super::{DecodedForm, ExtractedUpload};
use crate::{
    config::{OversizePolicy, RelayConfig},
    error::RelayError,
    staging::StagingWriter,
};

/// Extracts the boundary token from a `Content-Type` header value.
pub fn boundary_from(content_type: Option<&str>) -> Result<String, RelayError> {
    let unsupported = || RelayError::UnsupportedContentType {
        content_type: content_type.map(str::to_string),
    };
    let raw = content_type.ok_or_else(unsupported)?;

    let mime: mime::Mime = match raw.parse() {
        Ok(mime) => mime,
        // `multipart/form-data; boundary=` does not parse as a mime type
        Err(_) if raw.trim().to_ascii_lowercase().starts_with("multipart/form-data") => {
            return Err(RelayError::MissingBoundary);
        }
        Err(_) => return Err(unsupported()),
    };
    if mime.type_() != mime::MULTIPART || mime.subtype() != mime::FORM_DATA {
        return Err(unsupported());
    }

    mime.get_param(mime::BOUNDARY)
        .map(|b| b.as_str().to_string())
        .filter(|b| !b.is_empty())
        .ok_or(RelayError::MissingBoundary)
}

/// Decodes a `multipart/form-data` body into one file upload plus its text fields.
///
/// The file part named `config.file_field` wins; otherwise the first part carrying a
/// `filename` is taken. Other file parts are drained and ignored.
pub async fn decode<S, O, E>(
    content_type: Option<&str>,
    body: S,
    config: &RelayConfig,
) -> Result<DecodedForm, RelayError>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let boundary = boundary_from(content_type)?;
    let constraints =
        Constraints::new().size_limit(SizeLimit::new().whole_stream(config.max_request_bytes));
    let mut multipart = Multipart::with_constraints(body, boundary, constraints);

    let mut preferred: Option<ExtractedUpload> = None;
    let mut fallback: Option<ExtractedUpload> = None;
    let mut fields = BTreeMap::new();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);

        if field.file_name().is_some() {
            let is_preferred = name.as_deref() == Some(config.file_field.as_str());
            if preferred.is_some() || (!is_preferred && fallback.is_some()) {
                debug!(field = ?name, "Ignoring additional file part");
                drain(&mut field).await?;
                continue;
            }

            let upload = read_file_part(field, config).await?;
            if is_preferred {
                // Dropping the fallback releases its staging file.
                fallback = None;
                preferred = Some(upload);
            } else {
                fallback = Some(upload);
            }
        } else if let Some(name) = name {
            let value = read_text_field(&mut field, &name, config.max_field_bytes).await?;
            match fields.entry(name) {
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
                Entry::Occupied(entry) => {
                    debug!(field = %entry.key(), "Ignoring repeated text field");
                }
            }
        } else {
            drain(&mut field).await?;
        }
    }

    let upload = preferred.or(fallback).ok_or(RelayError::NoFilePart)?;
    debug!(
        field = %upload.field_name,
        filename = %upload.filename,
        mime = %upload.mime_type,
        size = upload.content.len(),
        fields = ?fields.keys().collect::<Vec<_>>(),
        "Multipart body decoded"
    );

    Ok(DecodedForm { upload, fields })
}

async fn read_file_part(
    mut field: Field<'static>,
    config: &RelayConfig,
) -> Result<ExtractedUpload, RelayError> {
    let field_name = field.name().unwrap_or_default().to_string();
    let filename = field
        .file_name()
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| config.default_filename.clone());
    let mime_type = field
        .content_type()
        .cloned()
        .unwrap_or_else(|| config.default_mime.clone());

    let limit = config.max_upload_bytes;
    let mut writer = StagingWriter::open(&config.staging)?;
    let mut written = 0u64;
    let mut truncated = false;

    while let Some(chunk) = field.chunk().await? {
        let remaining = limit - written;
        if chunk.len() as u64 > remaining {
            if config.oversize == OversizePolicy::Reject {
                return Err(RelayError::PayloadTooLarge {
                    message: format!(
                        "File exceeds maximum allowed size of {} bytes ({} MB)",
                        limit,
                        limit / (1024 * 1024)
                    ),
                });
            }
            if remaining > 0 {
                writer.write(&chunk[..remaining as usize]).await?;
                written = limit;
            }
            truncated = true;
            continue;
        }
        writer.write(&chunk).await?;
        written += chunk.len() as u64;
    }

    if truncated {
        warn!(filename = %filename, limit, "File exceeded size limit and was truncated");
    }

    Ok(ExtractedUpload {
        field_name,
        filename,
        mime_type,
        content: writer.finish().await?,
        truncated,
    })
}

async fn read_text_field(
    field: &mut Field<'static>,
    name: &str,
    limit: u64,
) -> Result<String, RelayError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(RelayError::PayloadTooLarge {
                message: format!("Field {name} exceeds {limit} bytes"),
            });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn drain(field: &mut Field<'static>) -> Result<(), RelayError> {
    while field.chunk().await?.is_some() {}
    Ok(())
}
