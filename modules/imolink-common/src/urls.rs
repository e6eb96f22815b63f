use anyhow::Result;
use url::Url;

/// Normalize a canonical listing URL: decode percent-escapes, strip the
/// query string and fragment, and guarantee exactly one trailing slash.
pub fn normalize_listing_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)?;

    let mut result = format!(
        "{}://{}{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default(),
        percent_decode(parsed.path()),
    );

    while result.ends_with('/') {
        result.pop();
    }
    result.push('/');

    Ok(result)
}

/// URL path slug for a locality name: lowercase, diacritics folded to
/// ASCII, spaces collapsed to hyphens ("São José" -> "sao-jose").
pub fn locality_slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(fold_diacritic)
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

/// Bare domain of a platform base URL ("https://www.vivareal.com.br/"
/// -> "www.vivareal.com.br"), the form used in site-scoped queries.
pub fn platform_domain(base_url: &str) -> String {
    base_url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// True iff `url` resolves to a host on the platform's domain (exact or
/// subdomain match, "www." prefix ignored on both sides).
pub fn url_on_domain(url: &str, domain: &str) -> bool {
    let host = match Url::parse(url) {
        Ok(u) => match u.host_str() {
            Some(h) => h.to_lowercase(),
            None => return false,
        },
        Err(_) => return false,
    };
    let host = host.trim_start_matches("www.");
    let domain = domain.to_lowercase();
    let domain = domain.trim_start_matches("www.");
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Resolve a requested platform name against the stored reference set,
/// tolerating naming variants. Priority: exact match, then a
/// hyphenated-uppercase alias ("VivaReal" -> "VIVA-REAL"), then a loose
/// case/hyphen-insensitive substring match.
pub fn match_platform<'a>(
    platforms: &'a [crate::types::Platform],
    requested: &str,
) -> Option<&'a crate::types::Platform> {
    if let Some(p) = platforms.iter().find(|p| p.name == requested) {
        return Some(p);
    }

    let hyphenated = hyphenate_camel(requested).to_uppercase();
    if let Some(p) = platforms.iter().find(|p| p.name == hyphenated) {
        return Some(p);
    }

    let loose = loose_name(requested);
    platforms.iter().find(|p| {
        let stored = loose_name(&p.name);
        stored.contains(&loose) || loose.contains(&stored)
    })
}

fn loose_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != ' ')
        .collect::<String>()
        .to_lowercase()
}

/// "VivaReal" -> "Viva-Real". Names without an internal case change pass
/// through unchanged.
fn hyphenate_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() && prev_lower {
            out.push('-');
        }
        prev_lower = c.is_lowercase();
        out.push(c);
    }
    out
}

/// Decode %XX escapes; invalid escapes pass through untouched.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(byte) = hex_pair(bytes[i + 1], bytes[i + 2]) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Fold Latin diacritics to their ASCII base letter. Covers the range
/// that appears in Brazilian locality names.
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    fn platform(name: &str) -> Platform {
        Platform {
            id: 1,
            name: name.to_string(),
            base_url: "https://www.vivareal.com.br".to_string(),
            active: true,
        }
    }

    #[test]
    fn normalize_strips_query_and_adds_slash() {
        assert_eq!(
            normalize_listing_url("https://www.vivareal.com.br/venda/pr/curitiba?utm=1").unwrap(),
            "https://www.vivareal.com.br/venda/pr/curitiba/"
        );
        assert_eq!(
            normalize_listing_url("https://www.vivareal.com.br/venda/pr/curitiba").unwrap(),
            "https://www.vivareal.com.br/venda/pr/curitiba/"
        );
    }

    #[test]
    fn normalize_collapses_duplicate_trailing_slashes() {
        assert_eq!(
            normalize_listing_url("https://www.vivareal.com.br/venda/pr/curitiba//").unwrap(),
            "https://www.vivareal.com.br/venda/pr/curitiba/"
        );
    }

    #[test]
    fn normalize_decodes_percent_escapes() {
        assert_eq!(
            normalize_listing_url("https://www.vivareal.com.br/venda/pr/s%C3%A3o-jos%C3%A9/")
                .unwrap(),
            "https://www.vivareal.com.br/venda/pr/são-josé/"
        );
    }

    #[test]
    fn slug_folds_diacritics_and_spaces() {
        assert_eq!(locality_slug("Araucária"), "araucaria");
        assert_eq!(locality_slug("São José dos Pinhais"), "sao-jose-dos-pinhais");
        assert_eq!(locality_slug("Curitiba"), "curitiba");
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(
            platform_domain("https://www.vivareal.com.br/"),
            "www.vivareal.com.br"
        );
        assert_eq!(platform_domain("http://zapimoveis.com.br"), "zapimoveis.com.br");
    }

    #[test]
    fn domain_membership_ignores_www() {
        assert!(url_on_domain(
            "https://vivareal.com.br/venda/",
            "www.vivareal.com.br"
        ));
        assert!(url_on_domain(
            "https://www.vivareal.com.br/venda/",
            "vivareal.com.br"
        ));
        assert!(!url_on_domain("https://www.bing.com/x", "vivareal.com.br"));
    }

    #[test]
    fn platform_variant_matching() {
        let stored = vec![platform("VIVA-REAL")];
        // "VivaReal" must resolve to the stored "VIVA-REAL" row
        assert_eq!(match_platform(&stored, "VivaReal").unwrap().name, "VIVA-REAL");

        let stored = vec![platform("VivaReal")];
        assert_eq!(match_platform(&stored, "VivaReal").unwrap().name, "VivaReal");
        // Loose substring fallback
        assert_eq!(match_platform(&stored, "viva-real").unwrap().name, "VivaReal");

        assert!(match_platform(&stored, "ZapImoveis").is_none());
    }
}
