// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Ability, AbilityCall, AbilityContext, AbilityResult};

const DEFAULT_MAX_CHARS: usize = 50_000;

pub struct WebFetchAbility;

#[async_trait]
impl Ability for WebFetchAbility {
    fn name(&self) -> &str { "web_fetch" }

    fn description(&self) -> &str {
        "Fetch content from a URL and convert to readable text format.\n\n\
         ## Usage\n\
         - Fetch webpage content for analysis\n\
         - Extract text from HTML pages\n\
         - Retrieve documentation or reference material\n\
         - URL must be fully-formed and valid\n\n\
         ## Supported\n\
         - HTTP and HTTPS URLs\n\
         - HTML content conversion to markdown\n\
         - Text-based content\n\
         - Maximum 50,000 characters per request\n\n\
         ## Limitations\n\
         - No authentication support\n\
         - No binary content fetching\n\
         - No localhost or private IP access\n\
         - Read-only (no requests with side effects)\n\n\
         ## When to Use\n\
         - Retrieve webpage content for analysis\n\
         - Extract information from documentation\n\
         - Get latest information from URLs\n\
         - Analyze web-based resources\n\n\
         ## When NOT to Use\n\
         - Private/authenticated content → not supported\n\
         - Binary files → use appropriate tool\n\
         - Localhost/internal IPs → use file system instead\n\n\
         ## Examples\n\
         <example>\n\
         Fetch documentation:\n\
         web_fetch: url=\"https://docs.example.com/api\"\n\
         </example>\n\
         <example>\n\
         Fetch with size limit:\n\
         web_fetch: url=\"https://example.com\", max_chars=10000\n\
         </example>\n\n\
         ## IMPORTANT\n\
         - Valid http/https URLs only\n\
         - Converts HTML to markdown automatically\n\
         - Content limited to 50,000 chars (configurable)\n\
         - No authentication or side effects\n\
         - Read-only operation"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch (http or https)"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "Maximum characters to return (default 50000)"
                }
            },
            "required": ["url"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &AbilityCall, _ctx: &AbilityContext) -> AbilityResult {
        let url = match call.args.get("url").and_then(|v| v.as_str()) {
            Some(u) => u.to_string(),
            None => return AbilityResult::err(&call.id, "missing 'url'"),
        };
        let max_chars = call.args.get("max_chars")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_CHARS as u64) as usize;

        debug!(url = %url, "web_fetch ability");

        match fetch_url(&url, max_chars).await {
            Ok(content) => AbilityResult::ok(&call.id, content),
            Err(e) => AbilityResult::err(&call.id, format!("fetch error: {e}")),
        }
    }
}

async fn fetch_url(url: &str, max_chars: usize) -> anyhow::Result<String> {
    let parsed = reqwest::Url::parse(url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("unsupported URL scheme: {}", parsed.scheme());
    }
    if is_blocked_host(&parsed) {
        anyhow::bail!("refusing to fetch localhost or private-network host");
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent("wisp-agent/0.1")
        .build()?;

    let response = client.get(parsed).send().await?;
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    let body = response.text().await?;

    let content = if content_type.contains("html") {
        html_to_text(&body)
    } else if content_type.contains("json") {
        match serde_json::from_str::<Value>(&body) {
            Ok(v) => serde_json::to_string_pretty(&v).unwrap_or(body),
            Err(_) => body,
        }
    } else {
        body
    };

    let total_chars = content.chars().count();
    if total_chars > max_chars {
        let head: String = content.chars().take(max_chars).collect();
        Ok(format!(
            "{head}...[truncated at {max_chars} chars; total {total_chars} chars]"
        ))
    } else {
        Ok(content)
    }
}

/// Rejects localhost and private-network hosts (spec'd in this ability's own
/// description as unsupported). IP literals are checked directly; hostnames
/// are checked against the well-known local suffixes, not resolved - DNS
/// rebinding past this point is out of scope.
fn is_blocked_host(url: &reqwest::Url) -> bool {
    let Some(host) = url.host_str() else {
        return true;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local") {
        return true;
    }
    match host.parse::<std::net::IpAddr>() {
        Ok(std::net::IpAddr::V4(ip)) => {
            ip.is_private()
                || ip.is_loopback()
                || ip.is_link_local()
                || ip.is_unspecified()
                || ip.is_broadcast()
                || ip.is_documentation()
        }
        Ok(std::net::IpAddr::V6(ip)) => {
            if ip.is_loopback() || ip.is_unspecified() {
                return true;
            }
            let segs = ip.segments();
            (segs[0] & 0xfe00) == 0xfc00 || (segs[0] & 0xffc0) == 0xfe80
        }
        Err(_) => false,
    }
}

/// Convert HTML to plain text using html2text.
fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_strips_tags() {
        let html = "<html><body><h1>Hello</h1><p>World</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("<h1>"));
    }

    #[test]
    fn schema_requires_url() {
        let t = WebFetchAbility;
        let schema = t.parameters_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v.as_str() == Some("url")));
    }

    #[test]
    fn blocks_localhost_and_private_hosts() {
        for u in [
            "http://localhost/",
            "http://127.0.0.1/",
            "http://127.0.0.1:8080/admin",
            "http://[::1]/",
            "http://10.0.0.5/",
            "http://192.168.1.1/",
            "http://169.254.169.254/latest/meta-data",
            "http://service.local/",
        ] {
            let parsed = reqwest::Url::parse(u).unwrap();
            assert!(is_blocked_host(&parsed), "{u} should be blocked");
        }
    }

    #[test]
    fn allows_public_hosts() {
        for u in ["https://example.com/", "https://93.184.216.34/"] {
            let parsed = reqwest::Url::parse(u).unwrap();
            assert!(!is_blocked_host(&parsed), "{u} should not be blocked");
        }
    }

    #[test]
    fn truncation_is_char_boundary_safe() {
        let content = "é".repeat(10);
        let truncated = if content.chars().count() > 3 {
            let head: String = content.chars().take(3).collect();
            format!("{head}...[truncated at 3 chars; total 10 chars]")
        } else {
            content
        };
        assert!(truncated.starts_with("ééé"));
    }
}
