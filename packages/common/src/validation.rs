use std::fmt;
use std::io::Cursor;

use image::{ImageFormat, ImageReader};

/// Why an uploaded byte stream was not accepted as an image.
///
/// The `Display` output is the user-facing reason and is safe to return to
/// clients verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRejection {
    /// The payload is larger than the configured upload limit.
    TooLarge { size: u64, limit: u64 },
    /// The leading bytes do not match any known image signature.
    UnrecognizedFormat,
    /// The sniffed format is not in the allow-list.
    FormatNotAllowed {
        format: &'static str,
        allowed: Vec<String>,
    },
    /// The signature matched but the image could not be decoded.
    Corrupt(String),
}

impl fmt::Display for ImageRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { limit, .. } => write!(
                f,
                "File too large. Maximum size is {} MB",
                *limit as f64 / 1024.0 / 1024.0
            ),
            Self::UnrecognizedFormat => write!(f, "Invalid image format"),
            Self::FormatNotAllowed { format, allowed } => write!(
                f,
                "Invalid image format '{format}'. Allowed formats: {}",
                allowed.join(", ")
            ),
            Self::Corrupt(detail) => write!(f, "Error processing image: {detail}"),
        }
    }
}

impl std::error::Error for ImageRejection {}

/// Intrinsic properties of an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProperties {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size_bytes: u64,
}

impl ImageProperties {
    /// Canonical lowercase name of the sniffed format (`"png"`, `"jpeg"`, ...).
    pub fn format_name(&self) -> &'static str {
        format_name(self.format)
    }

    /// MIME type of the sniffed format.
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Canonical lowercase name for an image format.
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Ico => "ico",
        ImageFormat::Avif => "avif",
        other => other.extensions_str().first().copied().unwrap_or("unknown"),
    }
}

/// Checks raw upload bytes against the size limit and format allow-list.
///
/// Formats are sniffed from content, never from the filename.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    max_size: u64,
    allowed_formats: Vec<String>,
}

impl ImageValidator {
    pub fn new<I, S>(max_size: u64, allowed_formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_formats = allowed_formats
            .into_iter()
            .map(|s| s.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            max_size,
            allowed_formats,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn allowed_formats(&self) -> &[String] {
        &self.allowed_formats
    }

    /// Whether `format` is covered by the allow-list, by canonical name or
    /// any of its file extensions (`jpg` admits JPEG).
    pub fn is_allowed(&self, format: ImageFormat) -> bool {
        let name = format_name(format);
        self.allowed_formats.iter().any(|allowed| {
            allowed == name || format.extensions_str().iter().any(|ext| allowed == ext)
        })
    }

    /// Validate `data` and decode its dimensions.
    pub fn validate(&self, data: &[u8]) -> Result<ImageProperties, ImageRejection> {
        let size = data.len() as u64;
        if size > self.max_size {
            return Err(ImageRejection::TooLarge {
                size,
                limit: self.max_size,
            });
        }

        let format = image::guess_format(data).map_err(|_| ImageRejection::UnrecognizedFormat)?;
        if !self.is_allowed(format) {
            return Err(ImageRejection::FormatNotAllowed {
                format: format_name(format),
                allowed: self.allowed_formats.clone(),
            });
        }

        let decoded = ImageReader::with_format(Cursor::new(data), format)
            .decode()
            .map_err(|e| ImageRejection::Corrupt(e.to_string()))?;

        Ok(ImageProperties {
            width: decoded.width(),
            height: decoded.height(),
            format,
            size_bytes: size,
        })
    }
}
