//! Search-engine discovery against the Bing front-end. Site-scoped
//! query first; an unscoped variant keyed on the platform's bare name
//! when the scoped one comes up empty after the retry budget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browserless_client::PageLink;
use tracing::{debug, info, warn};

use imolink_common::types::{Discovery, DiscoveryTarget};
use imolink_common::urls::{normalize_listing_url, platform_domain, url_on_domain};
use imolink_common::Tuning;

use crate::matchers::cascade_min;
use crate::rate_limit::DomainRateLimiter;
use crate::selectors::{
    qualifies, search_keywords, LinkSource, SourceKind, SEARCH_RESULT_SOURCES,
};
use crate::strategies::{DiscoveryStrategy, StrategyFailure};
use crate::traits::{PageFetcher, PageHandle};

const SEARCH_DOMAIN: &str = "www.bing.com";

pub struct SearchStrategy {
    fetcher: Arc<dyn PageFetcher>,
    limiter: DomainRateLimiter,
    max_retries: u32,
    min_links: usize,
    max_links: usize,
}

/// One candidate pulled from a result page, in scan order.
#[derive(Debug, Clone)]
struct Candidate {
    url: String,
    text: String,
}

impl SearchStrategy {
    pub fn new(fetcher: Arc<dyn PageFetcher>, tuning: &Tuning) -> Self {
        Self {
            fetcher,
            limiter: DomainRateLimiter::new(tuning.rate_limit_min, tuning.rate_limit_max),
            max_retries: tuning.search_max_retries,
            min_links: tuning.search_min_links,
            max_links: tuning.search_max_links,
        }
    }

    fn query_variants(target: &DiscoveryTarget) -> (String, String) {
        let domain = platform_domain(&target.platform.base_url);
        let keywords = search_keywords(&target.operation.name);
        let place = format!(
            "{} {}",
            target.locality.locality_name, target.locality.state_abbr
        );
        let scoped = format!("site:{domain} {keywords} {place}");
        let unscoped = format!(
            "{} {keywords} {place}",
            Self::bare_platform_name(&target.platform.name)
        );
        (scoped, unscoped)
    }

    /// Platform names like "ZAP Imóveis" already carry the listing
    /// keyword; dropping it keeps the unscoped query from repeating it.
    fn bare_platform_name(name: &str) -> String {
        let bare: Vec<&str> = name
            .split_whitespace()
            .filter(|word| {
                let lower = word.to_lowercase();
                lower != "imóveis" && lower != "imoveis"
            })
            .collect();
        if bare.is_empty() {
            name.trim().to_string()
        } else {
            bare.join(" ")
        }
    }

    fn search_url(query: &str) -> String {
        let mut url = url::Url::parse("https://www.bing.com/search").expect("static URL");
        url.query_pairs_mut().append_pair("q", query);
        url.to_string()
    }

    /// Displayed-URL attributions come as "www.example.com › venda › pr";
    /// keep the host part and make it fetchable.
    fn cite_to_url(text: &str) -> Option<String> {
        let head = text.split(['›', ' ']).next()?.trim();
        if head.is_empty() || !head.contains('.') {
            return None;
        }
        if head.starts_with("http://") || head.starts_with("https://") {
            Some(head.to_string())
        } else {
            Some(format!("https://{head}/"))
        }
    }

    fn candidates_from_source(
        page: &dyn PageHandle,
        source: &LinkSource,
        max_links: usize,
    ) -> Vec<Candidate> {
        let raw: Vec<Candidate> = match source.kind {
            SourceKind::Anchor => page
                .select_links(source.css)
                .into_iter()
                .filter(|link| link.text.len() >= source.min_text)
                .map(|PageLink { href, text }| Candidate { url: href, text })
                .collect(),
            SourceKind::Cite => page
                .select_texts(source.css)
                .into_iter()
                .filter_map(|text| {
                    Self::cite_to_url(&text).map(|url| Candidate { url, text })
                })
                .collect(),
        };

        let mut seen = std::collections::HashSet::new();
        raw.into_iter()
            .filter(|c| qualifies(&c.url))
            .filter(|c| seen.insert(c.url.clone()))
            .take(max_links)
            .collect()
    }

    /// Fixed-priority source cascade over one rendered result page. The
    /// last-resort any-anchor scan only counts when it clears the
    /// minimum-links bar; in ones and twos it is navigation chrome.
    fn extract_candidates(&self, page: &dyn PageHandle) -> Vec<Candidate> {
        let min_links = self.min_links;
        cascade_min(
            SEARCH_RESULT_SOURCES,
            |source| if source.min_text > 0 { min_links } else { 1 },
            |source| Self::candidates_from_source(page, source, self.max_links),
        )
        .map(|(idx, candidates)| {
            debug!(
                source = SEARCH_RESULT_SOURCES[idx].css,
                count = candidates.len(),
                "Result source matched"
            );
            candidates
        })
        .unwrap_or_default()
    }

    /// Render the query with retries; empty result pages retry with a
    /// short exponential pause, navigation failures too.
    async fn run_query(&self, query: &str) -> Result<Vec<Candidate>, StrategyFailure> {
        let mut last_failure = StrategyFailure::Mismatch("no results".into());

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
            self.limiter.wait(SEARCH_DOMAIN).await;

            debug!(query, attempt, "Search request");
            match self.fetcher.open(&Self::search_url(query)).await {
                Ok(page) => {
                    let candidates = self.extract_candidates(page.as_ref());
                    if !candidates.is_empty() {
                        return Ok(candidates);
                    }
                    last_failure =
                        StrategyFailure::Mismatch(format!("zero result links for '{query}'"));
                }
                Err(err) => {
                    warn!(query, attempt, error = %err, "Search navigation failed");
                    last_failure = err.into();
                }
            }
        }

        Err(last_failure)
    }

    fn pick_platform_candidate(
        target: &DiscoveryTarget,
        candidates: &[Candidate],
    ) -> Option<(Discovery, usize)> {
        let domain = platform_domain(&target.platform.base_url);
        candidates.iter().enumerate().find_map(|(idx, candidate)| {
            if !url_on_domain(&candidate.url, &domain) {
                return None;
            }
            let url = normalize_listing_url(&candidate.url).ok()?;
            let title = if candidate.text.trim().is_empty() {
                format!("{} - {}", target.platform.name, target.locality.locality_name)
            } else {
                candidate.text.trim().to_string()
            };
            Some((
                Discovery {
                    url,
                    title,
                    item_count: None,
                    search_term: String::new(),
                    result_position: idx as i32 + 1,
                },
                idx,
            ))
        })
    }
}

#[async_trait]
impl DiscoveryStrategy for SearchStrategy {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn discover(&self, target: &DiscoveryTarget) -> Result<Discovery, StrategyFailure> {
        let (scoped, unscoped) = Self::query_variants(target);
        let mut links_seen = 0usize;

        for query in [&scoped, &unscoped] {
            let candidates = match self.run_query(query).await {
                Ok(candidates) => candidates,
                Err(failure) => {
                    debug!(query, %failure, "Query variant exhausted");
                    continue;
                }
            };
            links_seen = links_seen.max(candidates.len());

            if let Some((mut discovery, idx)) = Self::pick_platform_candidate(target, &candidates)
            {
                discovery.search_term = query.clone();
                info!(
                    target = %target,
                    url = %discovery.url,
                    position = idx + 1,
                    "Search discovery succeeded"
                );
                return Ok(discovery);
            }
        }

        Err(StrategyFailure::Mismatch(format!(
            "no candidate on the platform domain ({links_seen} links scanned)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imolink_common::StrategyKind;
    use crate::testing::{target, MockFetcher, MockPage};

    fn tuning_fast() -> Tuning {
        Tuning {
            search_max_retries: 1,
            rate_limit_min: Duration::from_millis(1),
            rate_limit_max: Duration::from_millis(2),
            strategy_order: vec![StrategyKind::Search],
            ..Tuning::default()
        }
    }

    fn result_page(url: &str, links: &[(&str, &str)]) -> MockPage {
        MockPage::new(url).links("li.b_algo h2 a", links)
    }

    #[tokio::test]
    async fn scoped_query_result_wins() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let fetcher = Arc::new(MockFetcher::default());
        let scoped_url = SearchStrategy::search_url(
            "site:www.vivareal.com.br apartamento venda Araucária PR",
        );
        fetcher.on_open(
            &scoped_url,
            result_page(
                &scoped_url,
                &[
                    ("https://www.bing.com/maps?q=araucaria", "Mapa"),
                    ("https://www.vivareal.com.br/venda/pr/araucaria/?from=serp", "Imóveis à venda em Araucária"),
                ],
            ),
        );

        let strategy = SearchStrategy::new(fetcher, &tuning_fast());
        let discovery = strategy.discover(&t).await.unwrap();
        assert_eq!(discovery.url, "https://www.vivareal.com.br/venda/pr/araucaria/");
        // The deny-listed maps link is filtered before positions are assigned.
        assert_eq!(discovery.result_position, 1);
        assert!(discovery.search_term.starts_with("site:www.vivareal.com.br"));
    }

    #[tokio::test]
    async fn empty_scoped_query_falls_back_to_unscoped() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let fetcher = Arc::new(MockFetcher::default());
        let scoped_url = SearchStrategy::search_url(
            "site:www.vivareal.com.br apartamento venda Araucária PR",
        );
        let unscoped_url =
            SearchStrategy::search_url("VivaReal apartamento venda Araucária PR");
        fetcher.on_open(&scoped_url, result_page(&scoped_url, &[]));
        fetcher.on_open(
            &unscoped_url,
            result_page(
                &unscoped_url,
                &[("https://www.vivareal.com.br/venda/pr/araucaria/", "VivaReal")],
            ),
        );

        let strategy = SearchStrategy::new(fetcher.clone(), &tuning_fast());
        let discovery = strategy.discover(&t).await.unwrap();
        assert!(discovery.search_term.starts_with("VivaReal "));
        assert_eq!(fetcher.opened(), vec![scoped_url, unscoped_url]);
    }

    #[tokio::test]
    async fn cite_source_used_when_anchors_missing() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let fetcher = Arc::new(MockFetcher::default());
        let scoped_url = SearchStrategy::search_url(
            "site:www.vivareal.com.br apartamento venda Araucária PR",
        );
        fetcher.on_open(
            &scoped_url,
            MockPage::new(&scoped_url)
                .texts("li.b_algo cite", &["www.vivareal.com.br › venda › pr › araucaria"]),
        );

        let strategy = SearchStrategy::new(fetcher, &tuning_fast());
        let discovery = strategy.discover(&t).await.unwrap();
        assert_eq!(discovery.url, "https://www.vivareal.com.br/");
    }

    #[tokio::test]
    async fn no_platform_candidate_is_a_mismatch() {
        let t = target("Araucária", "PR", "VivaReal", "VENDA");
        let fetcher = Arc::new(MockFetcher::default());
        let scoped_url = SearchStrategy::search_url(
            "site:www.vivareal.com.br apartamento venda Araucária PR",
        );
        let unscoped_url =
            SearchStrategy::search_url("VivaReal apartamento venda Araucária PR");
        for url in [&scoped_url, &unscoped_url] {
            fetcher.on_open(
                url,
                result_page(url, &[("https://www.zapimoveis.com.br/venda/", "ZAP")]),
            );
        }

        let strategy = SearchStrategy::new(fetcher, &tuning_fast());
        let err = strategy.discover(&t).await.unwrap_err();
        assert!(matches!(err, StrategyFailure::Mismatch(_)));
    }

    #[test]
    fn branded_platform_name_loses_the_listing_keyword() {
        let mut t = target("Curitiba", "PR", "ZAP", "VENDA");
        t.platform.name = "ZAP Imóveis".to_string();

        let (scoped, unscoped) = SearchStrategy::query_variants(&t);
        assert_eq!(scoped, "site:www.zapimoveis.com.br apartamento venda Curitiba PR");
        assert_eq!(unscoped, "ZAP apartamento venda Curitiba PR");
    }

    #[test]
    fn cite_text_parsing() {
        assert_eq!(
            SearchStrategy::cite_to_url("www.vivareal.com.br › venda › pr").as_deref(),
            Some("https://www.vivareal.com.br/")
        );
        assert_eq!(
            SearchStrategy::cite_to_url("https://example.com/x").as_deref(),
            Some("https://example.com/x")
        );
        assert_eq!(SearchStrategy::cite_to_url("Anúncios"), None);
    }
}
