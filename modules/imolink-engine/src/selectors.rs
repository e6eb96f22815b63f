//! Selector cascades and filter lists, kept as configuration data so the
//! cascade executor in `matchers.rs` stays identical across strategies.
//! Markup on the listing platforms and the search front-end drifts every
//! few months; this file is where the tuning happens.

/// Listing-count elements on the platform pages, highest confidence
/// first. A match only counts when its text carries a count word.
pub const COUNT_SELECTORS: &[&str] = &[
    "[data-testid=\"results-title\"]",
    "h1.results-summary__title",
    ".results-summary__count",
    ".js-total-records",
    "h1.result-count",
    ".results-title",
];

/// Portuguese count words a listing total is phrased with. Matched
/// case-insensitively against lowercased element text; the accented and
/// plain spellings are both listed because platforms are inconsistent.
pub const COUNT_WORDS: &[&str] = &["imóve", "imove", "resultado", "anúncio", "anuncio"];

/// Client-side fallback when no count selector matches: scan the whole
/// rendered text for a "<number> <count-word>" pattern.
pub const COUNT_SCAN_EXPRESSION: &str =
    r"(document.body.innerText.match(/\d[\d.,]*\s*(im[óo]ve(l|is)|resultados?|an[úu]ncios?)/i) || [null])[0]";

/// How anchors are pulled out of one search-result source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `<a href>` elements; href is the candidate.
    Anchor,
    /// Attribution elements whose *text* is the displayed URL.
    Cite,
}

/// One source in the search-result cascade.
#[derive(Debug, Clone, Copy)]
pub struct LinkSource {
    pub css: &'static str,
    pub kind: SourceKind,
    /// Minimum anchor-text length for a candidate to qualify. Nonzero
    /// only on the last-resort scans, which otherwise drown in chrome
    /// links.
    pub min_text: usize,
}

/// Bing result extraction, highest confidence first: organic result
/// headings, then displayed-URL attributions, then any anchor with
/// substantial text.
pub const SEARCH_RESULT_SOURCES: &[LinkSource] = &[
    LinkSource { css: "li.b_algo h2 a", kind: SourceKind::Anchor, min_text: 0 },
    LinkSource { css: "li.b_algo .b_title a", kind: SourceKind::Anchor, min_text: 0 },
    LinkSource { css: "#b_results h2 a", kind: SourceKind::Anchor, min_text: 0 },
    LinkSource { css: "li.b_algo cite", kind: SourceKind::Cite, min_text: 0 },
    LinkSource { css: "a[href]", kind: SourceKind::Anchor, min_text: 11 },
];

/// Hosts never accepted as a discovery candidate: the search engine
/// itself plus ad/tracking redirectors.
pub const DENYLIST: &[&str] = &[
    "bing.com",
    "bing.net",
    "microsoft.com",
    "microsofttranslator.com",
    "msn.com",
    "live.com",
    "doubleclick.net",
    "googleadservices.com",
    "googletagmanager.com",
];

/// Candidate URLs longer than this are assumed to be tracking wrappers.
pub const MAX_CANDIDATE_URL_LEN: usize = 500;

/// Search keywords per operation type.
pub fn search_keywords(operation_name: &str) -> &'static str {
    match operation_name.trim().to_uppercase().as_str() {
        "VENDA" => "apartamento venda",
        "ALUGUEL" | "LOCACAO" | "LOCAÇÃO" => "apartamento aluguel",
        "TEMPORADA" => "imóveis temporada",
        _ => "imóveis",
    }
}

/// True iff a candidate href qualifies: http(s), not a pseudo-link, not
/// deny-listed, and short enough to not be a tracking wrapper.
pub fn qualifies(href: &str) -> bool {
    if !href.starts_with("http://") && !href.starts_with("https://") {
        return false;
    }
    if href.len() > MAX_CANDIDATE_URL_LEN {
        return false;
    }
    let host = match url::Url::parse(href).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
        Some(h) => h,
        None => return false,
    };
    !DENYLIST
        .iter()
        .any(|deny| host == *deny || host.ends_with(&format!(".{deny}")))
}
