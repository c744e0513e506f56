use chrono::{DateTime, Utc};
use image::ImageFormat;
use uuid::Uuid;

use super::error::StorageError;

/// Top-level prefix every object path starts with.
pub const TENANT_ROOT: &str = "tenants";

/// Build a fresh object path for a tenant's image.
///
/// Layout: `tenants/{team_id}/images/{YYYY}/{MM}/{uuid}_{YYYYmmddHHMMSS}.{ext}`.
/// The year/month buckets allow lifecycle rules by prefix.
pub fn object_path(team_id: i64, extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "{TENANT_ROOT}/{team_id}/images/{}/{}",
        now.format("%Y/%m"),
        object_filename(extension, now)
    )
}

/// The unique filename component of an object path.
pub fn object_filename(extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}.{extension}",
        Uuid::new_v4(),
        now.format("%Y%m%d%H%M%S")
    )
}

/// Final path component of a storage path.
pub fn filename_of(storage_path: &str) -> &str {
    storage_path.rsplit('/').next().unwrap_or(storage_path)
}

/// Pick the stored file extension.
///
/// The caller's filename wins when its extension belongs to the sniffed
/// format, otherwise the format's primary extension is used.
pub fn resolve_extension(filename: Option<&str>, format: ImageFormat) -> String {
    let declared = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match declared {
        Some(ext) if format.extensions_str().contains(&ext.as_str()) => ext,
        _ => format
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("bin")
            .to_string(),
    }
}

/// Alternative spellings clients send for a format's MIME type.
fn mime_aliases(format: ImageFormat) -> &'static [&'static str] {
    match format {
        ImageFormat::Jpeg => &["image/jpg", "image/pjpeg"],
        ImageFormat::Png => &["image/x-png"],
        _ => &[],
    }
}

/// Pick the stored media type.
///
/// A declared content type is kept only when it names the sniffed format,
/// otherwise the sniffed format's MIME type is used.
pub fn resolve_media_type(content_type: Option<&str>, format: ImageFormat) -> String {
    let sniffed = format.to_mime_type();
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match declared {
        Some(ct) if ct == sniffed || mime_aliases(format).contains(&ct.as_str()) => ct,
        _ => sniffed.to_string(),
    }
}

/// Validates a storage path handed back by a caller before it touches a backend.
pub fn validate_storage_path(path: &str) -> Result<&str, StorageError> {
    let invalid = || StorageError::InvalidPath(path.to_string());

    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return Err(invalid());
    }

    // Reject NUL and other control characters, and Windows separators.
    if path.chars().any(|c| c.is_ascii_control() || c == '\\') {
        return Err(invalid());
    }

    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid());
    }

    if !path.starts_with(&format!("{TENANT_ROOT}/")) {
        return Err(invalid());
    }

    Ok(path)
}
