pub mod error;
pub mod page;

pub use error::{BrowserlessError, Result};
pub use page::{Page, PageLink};

use std::time::Duration;

use tracing::debug;

/// Rendering options for one page load. Defaults are a realistic desktop
/// fingerprint: real Chrome user agent, 1920x1080 viewport, stealth
/// launch flags, 30s navigation timeout and a short settle delay so
/// client-side markup has a chance to render.
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timeout: Duration,
    pub settle: Duration,
    pub stealth: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            timeout: Duration::from_secs(30),
            settle: Duration::from_secs(3),
            stealth: true,
        }
    }
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}{path}", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    /// Render a page via the Browserless /function endpoint and return a
    /// handle over the captured DOM. The renderer session lives only for
    /// the duration of the service call; the returned `Page` owns the
    /// snapshot plus an evaluator for follow-up in-page scripts.
    pub async fn open(&self, url: &str, opts: &PageOptions) -> Result<Page> {
        debug!(url, "Rendering page via Browserless");

        let code = format!(
            r#"export default async ({{ page }}) => {{
  await page.setUserAgent({ua});
  await page.setViewport({{ width: {w}, height: {h} }});
  await page.goto({url}, {{ waitUntil: "domcontentloaded", timeout: {timeout_ms} }});
  await new Promise((r) => setTimeout(r, {settle_ms}));
  return {{
    data: {{ url: page.url(), title: await page.title(), html: await page.content() }},
    type: "application/json",
  }};
}}"#,
            ua = serde_json::to_string(&opts.user_agent).unwrap_or_default(),
            w = opts.viewport_width,
            h = opts.viewport_height,
            url = serde_json::to_string(url).unwrap_or_default(),
            timeout_ms = opts.timeout.as_millis(),
            settle_ms = opts.settle.as_millis(),
        );

        let rendered: RenderedPage = self.run_function(&code, opts).await?;

        Ok(Page::new(
            rendered.url,
            rendered.title,
            rendered.html,
            self.client.clone(),
            self.endpoint("/function"),
            opts.clone(),
        ))
    }

    /// Execute a /function script and deserialize its JSON return value.
    pub(crate) async fn run_function<T: serde::de::DeserializeOwned>(
        &self,
        code: &str,
        opts: &PageOptions,
    ) -> Result<T> {
        run_function(&self.client, &self.endpoint("/function"), code, opts).await
    }
}

#[derive(serde::Deserialize)]
struct RenderedPage {
    url: String,
    title: String,
    html: String,
}

pub(crate) async fn run_function<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    endpoint: &str,
    code: &str,
    opts: &PageOptions,
) -> Result<T> {
    let body = serde_json::json!({
        "code": code,
        "context": {},
        "stealth": opts.stealth,
    });

    // Request budget: navigation timeout + settle delay + service margin.
    let budget = opts.timeout + opts.settle + Duration::from_secs(10);

    let resp = client
        .post(endpoint)
        .header("Content-Type", "application/json")
        .timeout(budget)
        .json(&body)
        .send()
        .await
        .map_err(|e| BrowserlessError::from_reqwest(e, opts.timeout.as_secs()))?;

    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(BrowserlessError::Api {
            status: status.as_u16(),
            message,
        });
    }

    resp.json::<T>()
        .await
        .map_err(|e| BrowserlessError::Network(e.to_string()))
}
