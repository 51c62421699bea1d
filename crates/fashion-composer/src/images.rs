//! Embedded image handling.
//!
//! Finds `<img src=...>` references in body markup and turns remote ones into
//! `data:` URLs so the submitted document is self-contained.

use std::future::Future;
use std::ops::Range;
use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use mime_sniffer::MimeTypeSniffer;
use regex_lite::Regex;

use crate::error::ApiError;

/// Prefix that marks an image as already inline.
pub const INLINE_PREFIX: &str = "data:image";

const FALLBACK_MIME: &str = "application/octet-stream";

static IMG_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());

/// Captures: 1=double-quoted value, 2=single-quoted value, 3=unquoted value
static SRC_ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

/// An image reference found in body markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// The reference with HTML entities decoded.
    pub src: String,
    /// Byte range of the raw attribute value within the markup.
    pub span: Range<usize>,
}

impl EmbeddedImage {
    /// Inline payloads need no conversion.
    pub fn is_inline(&self) -> bool {
        self.src.starts_with(INLINE_PREFIX)
    }
}

/// Bytes returned by an image fetch.
#[derive(Clone, Debug)]
pub struct FetchedImage {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Anything that can download an image by URL.
pub trait ImageFetcher {
    fn fetch_image(&self, url: &str) -> impl Future<Output = Result<FetchedImage, ApiError>>;
}

/// A single image could not be converted.
#[derive(thiserror::Error, Debug)]
#[error("failed to inline image {url}: {reason}")]
pub struct ImageError {
    pub url: String,
    pub reason: String,
}

/// Markup after inlining.
#[derive(Clone, Debug, PartialEq)]
pub struct Inlined {
    pub body: String,
    /// Number of remote references that were replaced.
    pub converted: usize,
}

/// Find all image references in `markup`, in document order.
pub fn scan_images(markup: &str) -> Vec<EmbeddedImage> {
    IMG_TAG_REGEX
        .find_iter(markup)
        .filter_map(|tag| {
            let caps = SRC_ATTR_REGEX.captures(tag.as_str())?;
            let value = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
            Some(EmbeddedImage {
                src: unescape_attr(value.as_str()),
                span: tag.start() + value.start()..tag.start() + value.end(),
            })
        })
        .collect()
}

/// Build a `data:` URL for `data`.
pub fn data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// MIME type from the bytes themselves.
pub fn sniff_mime(data: &[u8]) -> String {
    data.sniff_mime_type().unwrap_or(FALLBACK_MIME).to_string()
}

/// Prefer the server's declared type; sniff when it is absent or unusable.
pub fn resolve_mime(content_type: Option<&str>, data: &[u8]) -> String {
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| {
            !ct.is_empty()
                && ct.contains('/')
                && ct
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "/+-.".contains(c))
        });
    match declared {
        Some(mime) => mime.to_ascii_lowercase(),
        None => sniff_mime(data),
    }
}

/// Replace every remote image reference in `markup` with a `data:` URL.
///
/// All fetches run concurrently and are joined before any rewriting happens.
/// The first failure (in document order) fails the whole call and the markup
/// is left untouched.
pub async fn inline_images<F: ImageFetcher>(
    markup: &str,
    fetcher: &F,
) -> Result<Inlined, ImageError> {
    let remote: Vec<EmbeddedImage> = scan_images(markup)
        .into_iter()
        .filter(|image| !image.is_inline())
        .collect();

    if remote.is_empty() {
        return Ok(Inlined {
            body: markup.to_string(),
            converted: 0,
        });
    }

    tracing::debug!(count = remote.len(), "inlining remote images");

    let conversions = remote.iter().map(|image| async move {
        let fetched = fetcher
            .fetch_image(&image.src)
            .await
            .map_err(|e| ImageError {
                url: image.src.clone(),
                reason: e.to_string(),
            })?;
        let mime = resolve_mime(fetched.content_type.as_deref(), &fetched.data);
        tracing::debug!(url = %image.src, %mime, bytes = fetched.data.len(), "image fetched");
        Ok::<_, ImageError>(data_url(&mime, &fetched.data))
    });
    let results = n0_future::join_all(conversions).await;

    let mut body = String::with_capacity(markup.len());
    let mut last = 0;
    for (image, result) in remote.iter().zip(results.into_iter()) {
        let encoded = result?;
        body.push_str(&markup[last..image.span.start]);
        body.push_str(&encoded);
        last = image.span.end;
    }
    body.push_str(&markup[last..]);

    Ok(Inlined {
        body,
        converted: remote.len(),
    })
}

/// Decode the character references that can appear in an attribute value.
///
/// Unknown or malformed references are kept as written.
fn unescape_attr(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_reference(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "lt" => Some('<'),
        "gt" => Some('>'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
