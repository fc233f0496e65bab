use std::io;

use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::DecodedForm;

/// Field name the webhook expects the document under.
pub const OUTBOUND_FILE_FIELD: &str = "file";

/// Re-encodes a decoded upload as a fresh multipart form.
///
/// Every call produces a new random boundary. A text field sharing the file's
/// outbound name is dropped so the document is the only `file` part.
pub async fn build_form(decoded: &DecodedForm) -> io::Result<Form> {
    let upload = &decoded.upload;
    let body = upload.content.to_body().await?;

    let part = Part::stream_with_length(body, upload.content.len())
        .file_name(upload.filename.clone())
        .mime_str(upload.mime_type.as_ref())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut form = Form::new().part(OUTBOUND_FILE_FIELD, part);
    for (name, value) in &decoded.fields {
        if name == OUTBOUND_FILE_FIELD {
            debug!(field = %name, "Ignoring text field that collides with the file part");
            continue;
        }
        form = form.text(name.clone(), value.clone());
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bytes::Bytes;

    use super::*;
    use crate::{multipart::ExtractedUpload, staging::UploadContent};

    fn decoded() -> DecodedForm {
        DecodedForm {
            upload: ExtractedUpload {
                field_name: "pdf".into(),
                filename: "claim.pdf".into(),
                mime_type: mime::APPLICATION_PDF,
                content: UploadContent::Memory(Bytes::from_static(b"%PDF-1.7")),
                truncated: false,
            },
            fields: BTreeMap::from([("sourceUrls".to_string(), "https://example.com".to_string())]),
        }
    }

    #[tokio::test]
    async fn each_form_gets_a_fresh_boundary() {
        let decoded = decoded();
        let a = build_form(&decoded).await.unwrap();
        let b = build_form(&decoded).await.unwrap();
        assert!(!a.boundary().is_empty());
        assert_ne!(a.boundary(), b.boundary());
    }
}
