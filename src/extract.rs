//! Selector-based extraction: given raw HTML and a retailer's fallback
//! selector lists, pull out one `ProductRecord`. Field resolution tries each
//! selector in order and keeps the first non-empty match, per the ordered
//! fallback convention the retailer catalog documents.

use crate::models::{ProductRecord, RetailerConfig};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d,]+\.?\d*").unwrap());
static RATING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d(?:\.\d)?)\s*(?:out of|/)\s*5").unwrap());

/// Runs every selector in `candidates` against `doc`, in order, returning
/// the first non-empty matched text.
fn first_match(doc: &Html, candidates: &[String]) -> Option<String> {
    for selector_str in candidates {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let text: String = el.text().collect::<Vec<_>>().join(" ").trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
            if let Some(src) = el.value().attr("src") {
                return Some(src.to_string());
            }
            if let Some(href) = el.value().attr("href") {
                return Some(href.to_string());
            }
        }
    }
    None
}

const MAX_IMAGE_URLS: usize = 5;

/// Collects up to `MAX_IMAGE_URLS` absolute `src` URLs from the first
/// selector in `candidates` that yields any, skipping `data:` URIs.
fn all_matches(doc: &Html, candidates: &[String]) -> Vec<String> {
    for selector_str in candidates {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let urls: Vec<String> = doc
            .select(&selector)
            .filter_map(|el| el.value().attr("src"))
            .filter(|src| !src.starts_with("data:"))
            .take(MAX_IMAGE_URLS)
            .map(|s| s.to_string())
            .collect();
        if !urls.is_empty() {
            return urls;
        }
    }
    Vec::new()
}

/// Parses the first `\d[,\d]*\.?\d*` run out of a price string, e.g.
/// `"$1,299.00"` -> `1299.0`.
fn parse_price(raw: &str) -> Option<f64> {
    let m = PRICE_RE.find(raw)?;
    m.as_str().replace(',', "").parse::<f64>().ok()
}

/// Parses a `"4.5 out of 5"` / `"4.5/5"` style rating string, clamped to
/// `[0, 5]`.
fn parse_rating(raw: &str) -> Option<f32> {
    RATING_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .map(|r: f32| r.clamp(0.0, 5.0))
}

fn resolve_image_url(base: &str, src: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(src)) {
        Ok(joined) => joined.to_string(),
        Err(_) => src.to_string(),
    }
}

/// Extracts a single `ProductRecord` from `html`, using `retailer`'s
/// selector fallback lists. Returns `None` only when both `title` and
/// `price` are absent — any other single missing field still yields a
/// partial record, since those fields are genuinely optional.
pub fn extract_product(html: &str, retailer: &RetailerConfig, source_url: &str) -> Option<ProductRecord> {
    let doc = Html::parse_document(html);

    let title = retailer.selectors.get("title").and_then(|sel| first_match(&doc, sel));

    let price_raw = retailer.selectors.get("price").and_then(|sel| first_match(&doc, sel));
    let price = price_raw.as_deref().and_then(parse_price);

    if title.is_none() && price.is_none() {
        return None;
    }
    let title = title.unwrap_or_default();

    let rating = retailer
        .selectors
        .get("rating")
        .and_then(|sel| first_match(&doc, sel))
        .as_deref()
        .and_then(parse_rating);

    let availability = retailer
        .selectors
        .get("availability")
        .and_then(|sel| first_match(&doc, sel));

    let image_urls = retailer
        .selectors
        .get("image")
        .map(|sel| all_matches(&doc, sel))
        .unwrap_or_default()
        .into_iter()
        .map(|src| resolve_image_url(&retailer.base_url, &src))
        .collect();

    let hash = format!("{:016x}", xxhash_rust::xxh3::xxh3_64(html.as_bytes()));

    Some(ProductRecord {
        title,
        price,
        currency: price.map(|_| retailer.currency.clone()),
        rating,
        availability,
        description: None,
        image_urls,
        source_url: source_url.to_string(),
        retailer_key: retailer.key.clone(),
        extracted_at: Utc::now(),
        currency_conversion_usd: None,
        raw_html_hash: Some(hash),
    })
}

/// Returns the first `indicators` entry that appears in `html`
/// (case-insensitive substring match), or `None` if none matched.
pub fn find_anti_bot_indicator<'a>(html: &str, indicators: &'a [String]) -> Option<&'a str> {
    let lower = html.to_lowercase();
    indicators
        .iter()
        .find(|ind| lower.contains(&ind.to_lowercase()))
        .map(String::as_str)
}

/// True if `html` contains any of `indicators`, the same check the
/// orchestrator uses to short-circuit retries.
pub fn contains_anti_bot_indicator(html: &str, indicators: &[String]) -> bool {
    find_anti_bot_indicator(html, indicators).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retailer::catalog::seed_catalog;

    fn amazon() -> RetailerConfig {
        seed_catalog().into_iter().find(|r| r.key == "amazon").unwrap()
    }

    #[test]
    fn extracts_title_price_and_rating() {
        let html = r#"
            <html><body>
                <h2><a><span>Wireless Mouse</span></a></h2>
                <span class="a-price"><span class="a-offscreen">$24.99</span></span>
                <span class="a-icon-alt">4.5 out of 5 stars</span>
            </body></html>
        "#;
        let record = extract_product(html, &amazon(), "https://www.amazon.com/dp/X").unwrap();
        assert_eq!(record.title, "Wireless Mouse");
        assert_eq!(record.price, Some(24.99));
        assert_eq!(record.rating, Some(4.5));
    }

    #[test]
    fn falls_back_through_selector_list() {
        let html = r#"<html><body><div data-cy="title-recipe-title">Fallback Title</div></body></html>"#;
        let record = extract_product(html, &amazon(), "https://www.amazon.com/dp/X").unwrap();
        assert_eq!(record.title, "Fallback Title");
    }

    #[test]
    fn missing_title_and_price_yields_none() {
        let html = "<html><body><p>no product here</p></body></html>";
        assert!(extract_product(html, &amazon(), "https://www.amazon.com/dp/X").is_none());
    }

    #[test]
    fn missing_title_but_present_price_still_yields_a_record() {
        let html = r#"<html><body><span class="a-price"><span class="a-offscreen">$24.99</span></span></body></html>"#;
        let record = extract_product(html, &amazon(), "https://www.amazon.com/dp/X").unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.price, Some(24.99));
    }

    #[test]
    fn detects_anti_bot_indicator_case_insensitively() {
        let html = "<html><body>Sorry, we just need to make sure you're not a ROBOT CHECK</body></html>";
        assert!(contains_anti_bot_indicator(html, &["robot check".to_string()]));
    }

    #[test]
    fn parse_price_strips_thousands_separator() {
        assert_eq!(parse_price("$1,299.00"), Some(1299.0));
    }
}
