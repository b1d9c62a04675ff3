//! URL utilities shared by seeding, extraction and the transport.

use url::Url;

/// Query parameter carrying the page number on review listings.
pub const PAGE_PARAM: &str = "f";

pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

pub fn convert_to_absolute_url(link: &str, base_url: &str) -> Result<String, String> {
    let base = Url::parse(base_url).map_err(|e| e.to_string())?;
    let absolute_url = base.join(link).map_err(|e| e.to_string())?;
    Ok(absolute_url.to_string())
}

/// HTTP(S) URLs with a host only.
pub fn is_valid_seed(url: &str) -> bool {
    match Url::parse(url) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Stable identity of the shop a listing URL belongs to: lower-cased host
/// (plus non-default port) and path without trailing slash. Query and fragment
/// are ignored so every page of one listing maps to the same key.
pub fn entity_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };
    let path = parsed.path().trim_end_matches('/');
    Some(format!("{}{}", authority, path))
}

pub fn strip_fragment(url: &str) -> String {
    match url.find('#') {
        Some(pos) => url[..pos].to_string(),
        None => url.to_string(),
    }
}

/// Page number from the `f` query parameter.
pub fn page_number(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == PAGE_PARAM)
        .and_then(|(_, v)| v.parse::<u32>().ok())
        .filter(|n| *n >= 1)
}

/// Whether `link` is a pagination link of the listing rooted at `shop_url`,
/// i.e. matches `{shop_url}?f=*`.
pub fn is_pagination_of(link: &str, shop_url: &str) -> bool {
    let (Some(link_key), Some(shop_key)) = (entity_key(link), entity_key(shop_url)) else {
        return false;
    };
    link_key == shop_key && page_number(link).is_some()
}

/// Add https:// prefix for bare domains (CLI convenience). URLs that already
/// carry a scheme are left alone, even unsupported ones.
pub fn normalize_url_for_cli(url: &str) -> String {
    let trimmed = url.trim();

    if trimmed.contains("://") {
        return trimmed.to_string();
    }

    format!("https://{}", trimmed)
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.starts_with("text/html") || lower.starts_with("application/xhtml+xml")
}
