//! Handle over one rendered page: a DOM snapshot plus an evaluator for
//! follow-up in-page scripts. Selector reads parse the snapshot locally;
//! `evaluate` re-renders the same URL on the service and runs the given
//! expression in page context.

use scraper::{Html, Selector};
use tracing::warn;

use crate::error::{BrowserlessError, Result};
use crate::PageOptions;

/// An anchor extracted from the page: resolved href plus visible text.
#[derive(Debug, Clone)]
pub struct PageLink {
    pub href: String,
    pub text: String,
}

pub struct Page {
    final_url: String,
    title: String,
    html: String,
    client: reqwest::Client,
    function_endpoint: String,
    opts: PageOptions,
}

impl Page {
    pub(crate) fn new(
        final_url: String,
        title: String,
        html: String,
        client: reqwest::Client,
        function_endpoint: String,
        opts: PageOptions,
    ) -> Self {
        Self {
            final_url,
            title,
            html,
            client,
            function_endpoint,
            opts,
        }
    }

    /// URL the navigation actually resolved to (after redirects).
    pub fn final_url(&self) -> &str {
        &self.final_url
    }

    /// Document title as reported by the renderer. Empty when the page
    /// carries none.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Content of a `<meta property="...">` tag, e.g. `og:title`.
    pub fn meta_content(&self, property: &str) -> Option<String> {
        let document = Html::parse_document(&self.html);
        let selector = Selector::parse(&format!(r#"meta[property="{property}"]"#)).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Visible text of every element matching the CSS selector, in
    /// document order. An unparseable selector yields no matches.
    pub fn select_texts(&self, css: &str) -> Vec<String> {
        let selector = match Selector::parse(css) {
            Ok(s) => s,
            Err(_) => {
                warn!(css, "Unparseable selector, skipping");
                return Vec::new();
            }
        };
        let document = Html::parse_document(&self.html);
        document
            .select(&selector)
            .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Anchors matching the CSS selector, hrefs resolved against the
    /// page URL. Non-http(s) targets are dropped.
    pub fn select_links(&self, css: &str) -> Vec<PageLink> {
        let selector = match Selector::parse(css) {
            Ok(s) => s,
            Err(_) => {
                warn!(css, "Unparseable selector, skipping");
                return Vec::new();
            }
        };
        let base = url::Url::parse(&self.final_url).ok();
        let document = Html::parse_document(&self.html);
        document
            .select(&selector)
            .filter_map(|el| {
                let href = el.value().attr("href")?.trim();
                if href.is_empty() {
                    return None;
                }
                let resolved = match &base {
                    Some(b) => b.join(href).ok()?,
                    None => url::Url::parse(href).ok()?,
                };
                if resolved.scheme() != "http" && resolved.scheme() != "https" {
                    return None;
                }
                let text = el.text().collect::<Vec<_>>().join(" ").trim().to_string();
                Some(PageLink {
                    href: resolved.to_string(),
                    text,
                })
            })
            .collect()
    }

    /// Run a JS expression in page context (the page is re-rendered for
    /// the call) and return its JSON result.
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let code = format!(
            r#"export default async ({{ page }}) => {{
  await page.setUserAgent({ua});
  await page.goto({url}, {{ waitUntil: "domcontentloaded", timeout: {timeout_ms} }});
  await new Promise((r) => setTimeout(r, {settle_ms}));
  const value = await page.evaluate({expr});
  return {{ data: {{ value }}, type: "application/json" }};
}}"#,
            ua = serde_json::to_string(&self.opts.user_agent).unwrap_or_default(),
            url = serde_json::to_string(&self.final_url).unwrap_or_default(),
            timeout_ms = self.opts.timeout.as_millis(),
            settle_ms = self.opts.settle.as_millis(),
            expr = serde_json::to_string(expression)
                .map_err(|e| BrowserlessError::Network(e.to_string()))?,
        );

        #[derive(serde::Deserialize)]
        struct Evaluated {
            value: serde_json::Value,
        }

        let out: Evaluated =
            crate::run_function(&self.client, &self.function_endpoint, &code, &self.opts).await?;
        Ok(out.value)
    }

    /// Release the handle. The remote renderer session is already gone
    /// (it is scoped to each service call); this consumes the snapshot.
    pub fn close(self) {}
}
