//! Output filename derivation.

use crate::error::NamingError;
use crate::pipeline::ConversionKind;

const SOURCE_SUFFIX: &str = ".png";

/// Derive the artifact filename for an uploaded file.
///
/// Only the last path segment of `original` is used. A trailing `.png`
/// (any case) is swapped for the target extension; any other name gets the
/// extension appended, so `photo.jpg` becomes `photo.jpg.svg` and can never
/// collide with the output of `photo.png`.
pub fn derive_output_name(original: &str, kind: ConversionKind) -> Result<String, NamingError> {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(NamingError::Empty);
    }

    let ext = kind.extension();
    let split = base.len().saturating_sub(SOURCE_SUFFIX.len());
    match base.split_at_checked(split) {
        Some((stem, suffix)) if !stem.is_empty() && suffix.eq_ignore_ascii_case(SOURCE_SUFFIX) => {
            Ok(format!("{stem}.{ext}"))
        }
        _ => Ok(format!("{base}.{ext}")),
    }
}
