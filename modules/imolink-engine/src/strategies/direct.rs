//! Direct construction: build the platform's listing URL from the
//! normalized locality name, render it, and validate the page actually
//! carries listings before accepting.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use imolink_common::types::{Discovery, DiscoveryTarget};
use imolink_common::urls::{normalize_listing_url, platform_domain, url_on_domain};

use crate::matchers::cascade;
use crate::selectors::{COUNT_SCAN_EXPRESSION, COUNT_SELECTORS, COUNT_WORDS};
use crate::strategies::{DiscoveryStrategy, StrategyFailure};
use crate::traits::{PageFetcher, PageHandle};

pub struct DirectStrategy {
    fetcher: Arc<dyn PageFetcher>,
}

impl DirectStrategy {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Title cascade: document title, then og:title, then the first
    /// heading, then a synthesized default. First non-empty wins.
    fn extract_title(page: &dyn PageHandle, target: &DiscoveryTarget) -> String {
        let title = page.title().trim();
        if !title.is_empty() {
            return title.to_string();
        }
        if let Some(og) = page.meta_content("og:title") {
            return og;
        }
        if let Some(h1) = page.select_texts("h1").into_iter().next() {
            return h1;
        }
        format!(
            "Imóveis {} em {} - {}",
            target.operation.slug(),
            target.locality.locality_name,
            target.platform.name,
        )
    }

    /// Count cascade: the selector list first, accepting only elements
    /// whose text carries a count word, then a client-side full-text
    /// regex scan.
    async fn extract_count(page: &dyn PageHandle) -> Option<String> {
        let from_selectors = cascade(COUNT_SELECTORS, |css| {
            page.select_texts(css)
                .into_iter()
                .filter(|text| {
                    let lower = text.to_lowercase();
                    COUNT_WORDS.iter().any(|word| lower.contains(word))
                })
                .collect::<Vec<_>>()
        });
        if let Some((_, mut texts)) = from_selectors {
            return Some(texts.remove(0));
        }

        match page.evaluate(COUNT_SCAN_EXPRESSION).await {
            Ok(value) => value.as_str().map(str::to_string),
            Err(err) => {
                debug!(error = %err, "Count scan evaluation failed");
                None
            }
        }
    }

    async fn extract(
        &self,
        page: &dyn PageHandle,
        target: &DiscoveryTarget,
    ) -> Result<Discovery, StrategyFailure> {
        let url = normalize_listing_url(page.final_url())
            .map_err(|e| StrategyFailure::Mismatch(format!("unparseable final URL: {e}")))?;

        let domain = platform_domain(&target.platform.base_url);
        if !url_on_domain(&url, &domain) {
            return Err(StrategyFailure::Mismatch(format!(
                "navigation left the platform domain: {url}"
            )));
        }

        let title = Self::extract_title(page, target);
        // The count is best-effort context for the audit log; a page
        // without one is still a valid capture.
        let item_count = Self::extract_count(page).await;

        Ok(Discovery {
            url,
            title,
            item_count,
            search_term: format!(
                "{} {} {}",
                target.operation.slug(),
                target.locality.locality_name,
                target.locality.state_abbr,
            ),
            result_position: 1,
        })
    }
}

#[async_trait]
impl DiscoveryStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn discover(&self, target: &DiscoveryTarget) -> Result<Discovery, StrategyFailure> {
        let url = target.default_url();
        debug!(target = %target, url, "Trying constructed URL");

        let page = self.fetcher.open(&url).await?;
        let outcome = self.extract(page.as_ref(), target).await;

        if let Ok(discovery) = &outcome {
            info!(target = %target, url = %discovery.url, "Direct construction succeeded");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{target, MockFetcher, MockPage};

    fn fetcher_with(url: &str, page: MockPage) -> Arc<MockFetcher> {
        let fetcher = MockFetcher::default();
        fetcher.on_open(url, page);
        Arc::new(fetcher)
    }

    #[tokio::test]
    async fn accepts_page_with_title_and_count() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let page = MockPage::new("https://www.vivareal.com.br/venda/pr/araucaria/?recentes=1")
            .title("Imóveis à venda em Araucária")
            .texts("[data-testid=\"results-title\"]", &["1.234 imóveis à venda"]);
        let fetcher = fetcher_with("https://www.vivareal.com.br/venda/pr/araucaria/", page);

        let discovery = DirectStrategy::new(fetcher).discover(&t).await.unwrap();
        assert_eq!(discovery.url, "https://www.vivareal.com.br/venda/pr/araucaria/");
        assert_eq!(discovery.title, "Imóveis à venda em Araucária");
        assert_eq!(discovery.item_count.as_deref(), Some("1.234 imóveis à venda"));
    }

    #[tokio::test]
    async fn title_falls_back_to_og_meta() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let page = MockPage::new("https://www.vivareal.com.br/venda/pr/araucaria/")
            .meta("og:title", "Apartamentos em Araucária")
            .texts(".js-total-records", &["567 resultados"]);
        let fetcher = fetcher_with("https://www.vivareal.com.br/venda/pr/araucaria/", page);

        let discovery = DirectStrategy::new(fetcher).discover(&t).await.unwrap();
        assert_eq!(discovery.title, "Apartamentos em Araucária");
    }

    #[tokio::test]
    async fn count_falls_back_to_full_text_scan() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let page = MockPage::new("https://www.vivareal.com.br/venda/pr/araucaria/")
            .title("VivaReal")
            .eval_result(serde_json::json!("89 imóveis"));
        let fetcher = fetcher_with("https://www.vivareal.com.br/venda/pr/araucaria/", page);

        let discovery = DirectStrategy::new(fetcher).discover(&t).await.unwrap();
        assert_eq!(discovery.item_count.as_deref(), Some("89 imóveis"));
    }

    #[tokio::test]
    async fn off_domain_redirect_is_a_mismatch() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let page = MockPage::new("https://www.parked-domain.com/").title("For sale");
        let fetcher = fetcher_with("https://www.vivareal.com.br/venda/pr/araucaria/", page);

        let err = DirectStrategy::new(fetcher).discover(&t).await.unwrap_err();
        assert!(matches!(err, StrategyFailure::Mismatch(_)));
    }

    #[tokio::test]
    async fn page_without_a_count_is_still_a_capture() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let page = MockPage::new("https://www.vivareal.com.br/venda/pr/araucaria/")
            .title("Imóveis à venda em Araucária");
        let fetcher = fetcher_with("https://www.vivareal.com.br/venda/pr/araucaria/", page);

        let discovery = DirectStrategy::new(fetcher).discover(&t).await.unwrap();
        assert_eq!(discovery.url, "https://www.vivareal.com.br/venda/pr/araucaria/");
        assert_eq!(discovery.item_count, None);
    }

    #[tokio::test]
    async fn navigation_timeout_maps_to_timeout_failure() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let fetcher = Arc::new(MockFetcher::default());

        let err = DirectStrategy::new(fetcher).discover(&t).await.unwrap_err();
        assert!(matches!(err, StrategyFailure::Timeout(_)));
    }
}
