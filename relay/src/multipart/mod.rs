//! Inbound multipart decoding and outbound re-encoding.

mod decode;
mod encode;

use std::collections::BTreeMap;

pub use decode::{boundary_from, decode};
pub use encode::build_form;

use crate::staging::UploadContent;

/// The single file part chosen from an inbound request.
#[derive(Debug, Clone)]
pub struct ExtractedUpload {
    /// Form field name the file arrived under.
    pub field_name: String,
    pub filename: String,
    pub mime_type: mime::Mime,
    pub content: UploadContent,
    /// Set when the part exceeded the size ceiling and was cut short.
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct DecodedForm {
    pub upload: ExtractedUpload,
    /// Auxiliary text fields, first value per name.
    pub fields: BTreeMap<String, String>,
}
