//! Evidence photo payloads. Photos arrive as data URLs, are validated and
//! stripped here, and leave as bare base64 upload payloads named after the
//! item they document.

use std::collections::BTreeMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::limits::MAX_IMAGE_KB;
use crate::model::ReturnedCondition;

/// One photo ready for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub file_name: String,
    pub mime_type: String,
    /// Bare base64, no data-URL prefix.
    pub base64: String,
}

/// Strip an optional `data:<mime>;base64,` prefix, returning the mime type
/// (default image/jpeg) and the bare payload.
fn split_data_url(photo: &str) -> (String, &str) {
    if let Some(rest) = photo.strip_prefix("data:") {
        if let Some((mime, payload)) = rest.split_once(";base64,") {
            return (mime.to_owned(), payload);
        }
    }
    ("image/jpeg".to_owned(), photo)
}

/// Decode-check one photo string: valid base64 under the size bound.
pub fn validate_photo(photo: &str) -> Result<(), EngineError> {
    let (_, payload) = split_data_url(photo);
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| EngineError::BadImage(e.to_string()))?;
    if bytes.len() > MAX_IMAGE_KB * 1024 {
        return Err(EngineError::BadImage(format!(
            "image exceeds {MAX_IMAGE_KB} KB"
        )));
    }
    Ok(())
}

/// Upload payloads for every photo of a return event, named
/// `{item}_{n}.{ext}` so the remote can file them per item.
pub fn evidence_images(details: &BTreeMap<String, ReturnedCondition>) -> Vec<ImagePayload> {
    let mut images = Vec::new();
    for (item_id, condition) in details {
        for (idx, photo) in condition.photos.iter().enumerate() {
            let (mime_type, payload) = split_data_url(photo);
            let ext = match mime_type.as_str() {
                "image/png" => "png",
                "image/webp" => "webp",
                _ => "jpg",
            };
            images.push(ImagePayload {
                file_name: format!("{item_id}_{n}.{ext}", n = idx + 1),
                mime_type,
                base64: payload.trim().to_owned(),
            });
        }
    }
    images
}
