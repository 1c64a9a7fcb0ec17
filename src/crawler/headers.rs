//! Request headers for the listing API and the detail pages

use reqwest::header::{
    HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT,
};

/// Accept header a mobile browser sends for a page navigation
pub const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Build browser-like headers for detail page requests
///
/// The detail endpoint serves the in-app web view, so requests mimic the
/// mobile browser that view runs in.
///
/// # Arguments
///
/// * `user_agent` - User agent string (a mobile browser UA)
/// * `accept_language` - Accept-Language header value
///
/// # Errors
///
/// Returns an error if either value contains characters not allowed in a header
///
/// # Examples
///
/// ```
/// use notice_watch::crawler::headers::build_browser_headers;
///
/// let headers = build_browser_headers(
///     "Mozilla/5.0 (Linux; Android 5.0) Mobile Safari/537.36",
///     "zh-CN,zh;q=0.9",
/// )
/// .unwrap();
/// assert!(headers.contains_key("user-agent"));
/// ```
pub fn build_browser_headers(
    user_agent: &str,
    accept_language: &str,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(accept_language)?);
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    Ok(headers)
}

/// Build headers for the JSON listing API
pub fn build_api_headers(user_agent: &str) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_browser_headers() {
        let headers = build_browser_headers("Mozilla/5.0", "zh-CN,zh;q=0.9").unwrap();

        assert_eq!(
            headers.get(USER_AGENT).unwrap(),
            HeaderValue::from_static("Mozilla/5.0")
        );
        assert_eq!(
            headers.get(ACCEPT).unwrap(),
            HeaderValue::from_static(BROWSER_ACCEPT)
        );
        assert_eq!(
            headers.get(ACCEPT_LANGUAGE).unwrap(),
            HeaderValue::from_static("zh-CN,zh;q=0.9")
        );
        assert_eq!(
            headers.get(CONNECTION).unwrap(),
            HeaderValue::from_static("keep-alive")
        );
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        assert!(build_browser_headers("bad\nagent", "zh-CN").is_err());
        assert!(build_api_headers("bad\r\nagent").is_err());
    }

    #[test]
    fn test_build_api_headers() {
        let headers = build_api_headers("Mozilla/5.0").unwrap();
        assert!(headers.contains_key(USER_AGENT));
        assert!(headers
            .get(ACCEPT)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("application/json"));
    }
}
