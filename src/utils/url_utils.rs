// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 解析并校验一个可抓取的URL（仅允许 http/https 且必须带主机名）
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

/// 规范化URL，用于唯一性判断
///
/// 小写主机名、去掉片段标识符、去掉 `www.` 前缀和末尾斜杠
pub fn normalize_url(raw: &str) -> String {
    match parse_http_url(raw) {
        Some(mut url) => {
            url.set_fragment(None);
            let host = url
                .host_str()
                .map(|h| h.trim_start_matches("www.").to_lowercase())
                .unwrap_or_default();
            let path = url.path().trim_end_matches('/');
            let mut normalized = format!("{}://{}", url.scheme(), host);
            if let Some(port) = url.port() {
                normalized.push_str(&format!(":{}", port));
            }
            normalized.push_str(path);
            if let Some(query) = url.query() {
                normalized.push('?');
                normalized.push_str(query);
            }
            normalized
        }
        None => raw.trim().trim_end_matches('/').to_lowercase(),
    }
}

/// 提取URL的域名（不含 `www.` 前缀）
pub fn domain_of(raw: &str) -> Option<String> {
    parse_http_url(raw)
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
}

/// 提取URL的站点根地址，例如 `https://example.com`
pub fn origin_of(raw: &str) -> Option<String> {
    let url = parse_http_url(raw)?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root_relative_url() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        assert_eq!(
            resolve_url(&base, "/c").unwrap().as_str(),
            "http://example.com/c"
        );
    }

    #[test]
    fn test_parse_http_url_rejects_other_schemes() {
        assert!(parse_http_url("https://example.com").is_some());
        assert!(parse_http_url("ftp://example.com").is_none());
        assert!(parse_http_url("mailto:someone@example.com").is_none());
        assert!(parse_http_url("").is_none());
        assert!(parse_http_url("not a url").is_none());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://WWW.Example.com/Events/#top"),
            "https://example.com/Events"
        );
        assert_eq!(
            normalize_url("https://example.com/"),
            normalize_url("https://www.example.com")
        );
        assert_eq!(
            normalize_url("http://example.com:8080/a?b=1"),
            "http://example.com:8080/a?b=1"
        );
    }

    #[test]
    fn test_domain_and_origin() {
        assert_eq!(
            domain_of("https://www.parks.example.org/calendar").as_deref(),
            Some("parks.example.org")
        );
        assert_eq!(
            origin_of("https://parks.example.org/calendar?x=1").as_deref(),
            Some("https://parks.example.org")
        );
        assert_eq!(domain_of("garbage"), None);
    }
}
