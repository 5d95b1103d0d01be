use crate::collect::ResultBundle;
use crate::error::{CollectError, CollectResult};

/// Indented JSON document with a trailing newline
pub fn to_document(bundle: &ResultBundle) -> CollectResult<Vec<u8>> {
    let mut out = serde_json::to_vec_pretty(bundle)
        .map_err(|e| CollectError::serialization("result bundle", e))?;
    out.push(b'\n');
    Ok(out)
}
