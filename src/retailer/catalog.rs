//! Built-in retailer catalog: the ~15 retailers shipped by default, spanning
//! three priority tiers. Selector lists are ordered fallbacks — the
//! extractor tries each until one yields a non-empty match.

use crate::models::{RetailerCategory, RetailerConfig, RetailerPriority, RetailerStatus};
use std::collections::HashMap;

fn selectors(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(field, values)| {
            (
                field.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            )
        })
        .collect()
}

fn base(
    key: &str,
    name: &str,
    domain: &str,
    category: RetailerCategory,
    priority: RetailerPriority,
    sel: HashMap<String, Vec<String>>,
    rate_limit_secs: f64,
    search_url_template: &str,
    base_url: &str,
) -> RetailerConfig {
    RetailerConfig {
        key: key.to_string(),
        name: name.to_string(),
        domain: domain.to_string(),
        category,
        priority,
        selectors: sel,
        search_url_template: search_url_template.to_string(),
        base_url: base_url.to_string(),
        rate_limit_secs,
        timeout_secs: 30,
        max_retries: 3,
        requires_js: false,
        anti_bot_measures: false,
        anti_bot_indicators: Vec::new(),
        required_strategy: None,
        currency: "USD".to_string(),
        country: "US".to_string(),
        status: RetailerStatus::Active,
    }
}

/// The built-in seed catalog, used when no `retailer_catalog_path` override
/// is configured.
pub fn seed_catalog() -> Vec<RetailerConfig> {
    use RetailerCategory::*;
    use RetailerPriority::*;

    vec![
        {
            let mut c = base(
                "amazon",
                "Amazon",
                "amazon.com",
                General,
                High,
                selectors(&[
                    (
                        "product_container",
                        &["[data-component-type=\"s-search-result\"]", ".s-result-item"],
                    ),
                    (
                        "title",
                        &["h2 a span", ".a-link-normal .a-text-normal", "[data-cy=\"title-recipe-title\"]"],
                    ),
                    ("price", &[".a-price .a-offscreen", ".a-price-whole", ".a-price-fraction"]),
                    ("rating", &[".a-icon-alt", ".cr-widget-FocalReviews", ".a-link-normal .a-icon-alt"]),
                    ("availability", &["#availability span", ".a-color-success", ".a-color-state"]),
                    ("image", &[".imgTagWrapper img", "#landingImage", ".s-image"]),
                    ("link", &["h2 a", ".a-link-normal"]),
                ]),
                2.0,
                "https://www.amazon.com/s?k={query}&ref=sr_pg_{page}",
                "https://www.amazon.com",
            );
            c.requires_js = true;
            c.anti_bot_measures = true;
            c.anti_bot_indicators = vec![
                "robot check".to_string(),
                "captcha".to_string(),
                "automated queries".to_string(),
            ];
            c.required_strategy = Some("stealth_browser".to_string());
            c
        },
        base(
            "walmart",
            "Walmart",
            "walmart.com",
            General,
            High,
            selectors(&[
                ("product_container", &["[data-automation-id=\"product-title\"]", "[data-item-id]"]),
                ("title", &["[data-automation-id=\"product-title\"]", "h1", ".f4"]),
                ("price", &["[data-automation-id=\"product-price\"]", "[itemprop=\"price\"]", ".price-current"]),
                ("rating", &[".average-rating", ".star-rating", ".stars-reviews-count"]),
                ("availability", &["[data-automation-id=\"fulfillment-summary\"]", ".availability"]),
                ("image", &[".prod-hero-image img", ".slider-list img", "img"]),
                ("link", &["a"]),
            ]),
            2.5,
            "https://www.walmart.com/search?q={query}&page={page}",
            "https://www.walmart.com",
        ),
        base(
            "target",
            "Target",
            "target.com",
            General,
            High,
            selectors(&[
                ("product_container", &["[data-test=\"product-card\"]", ".ProductCard"]),
                ("title", &["[data-test=\"product-title\"]", ".ProductCard__title", "h3"]),
                ("price", &["[data-test=\"product-price\"]", ".Price", ".price"]),
                ("rating", &["[data-test=\"ratings\"]", ".Ratings", ".rating"]),
                ("availability", &["[data-test=\"fulfillment-summary\"]", ".fulfillment"]),
                ("image", &["[data-test=\"product-image\"]", ".ProductCard__image img"]),
                ("link", &["a"]),
            ]),
            2.0,
            "https://www.target.com/s?searchTerm={query}&page={page}",
            "https://www.target.com",
        ),
        base(
            "bestbuy",
            "Best Buy",
            "bestbuy.com",
            Electronics,
            High,
            selectors(&[
                ("product_container", &[".sku-item", ".product-item"]),
                ("title", &[".sku-title h1", ".v-fw-regular", ".sku-title"]),
                ("price", &[".priceView-hero-price span", ".priceView-customer-price span", ".sr-only"]),
                ("rating", &[".ugc-ratings-reviews", ".c-ratings-reviews-v2", ".sr-only"]),
                ("availability", &[".fulfillment-fulfillment-summary", ".availability"]),
                ("image", &[".primary-image", ".media-wrapper img"]),
                ("link", &["a"]),
            ]),
            2.0,
            "https://www.bestbuy.com/site/searchpage.jsp?st={query}&page={page}",
            "https://www.bestbuy.com",
        ),
        {
            let mut c = base(
                "ebay",
                "eBay",
                "ebay.com",
                General,
                High,
                selectors(&[
                    ("product_container", &[".s-item", ".srp-item"]),
                    ("title", &[".s-item__title", ".it-ttl", "#x-title-label-lbl"]),
                    ("price", &[".s-item__price", ".u-flL.condText", ".u-flL.u-bold"]),
                    ("rating", &[".ebay-review-star-rating", ".reviews", ".x-star-rating"]),
                    ("availability", &[".u-flL.vi-acc-del-range", ".availability"]),
                    ("image", &[".s-item__image img", ".ux-image-carousel-item img"]),
                    ("link", &[".s-item__link", "a"]),
                ]),
                1.5,
                "https://www.ebay.com/sch/i.html?_nkw={query}&_pgn={page}",
                "https://www.ebay.com",
            );
            c.anti_bot_measures = true;
            c.anti_bot_indicators = vec![
                "security challenge".to_string(),
                "verify you are human".to_string(),
            ];
            c
        },
        base(
            "costco",
            "Costco",
            "costco.com",
            Wholesale,
            Medium,
            selectors(&[
                ("product_container", &[".product-tile", ".product"]),
                ("title", &[".description", ".product-title", "h1"]),
                ("price", &[".price", ".product-price"]),
                ("rating", &[".ratings", ".stars"]),
                ("availability", &[".availability", ".stock"]),
                ("image", &["img.product-image", ".product-img"]),
                ("link", &["a"]),
            ]),
            3.0,
            "https://www.costco.com/CatalogSearch?keyword={query}&pageSize=24&currentPage={page}",
            "https://www.costco.com",
        ),
        base(
            "homedepot",
            "Home Depot",
            "homedepot.com",
            HomeImprovement,
            Medium,
            selectors(&[
                ("product_container", &[".plp-pod", ".product-pod"]),
                ("title", &[".product-title", ".pod-plp__title"]),
                ("price", &[".price", ".price-format__main-price"]),
                ("rating", &[".stars", ".average-rating"]),
                ("availability", &[".fulfillment-method", ".availability"]),
                ("image", &[".product-image", ".product-pod__image img"]),
                ("link", &["a"]),
            ]),
            2.5,
            "https://www.homedepot.com/s/{query}?page={page}",
            "https://www.homedepot.com",
        ),
        base(
            "lowes",
            "Lowe's",
            "lowes.com",
            HomeImprovement,
            Medium,
            selectors(&[
                ("product_container", &[".plp-tile", ".product-tile"]),
                ("title", &[".product-title", ".art-pd-title"]),
                ("price", &[".price", ".price-current"]),
                ("rating", &[".rating", ".stars"]),
                ("availability", &[".fulfillment", ".availability"]),
                ("image", &[".product-image img", ".art-pd-image img"]),
                ("link", &["a"]),
            ]),
            2.5,
            "https://www.lowes.com/search?searchTerm={query}&page={page}",
            "https://www.lowes.com",
        ),
        base(
            "newegg",
            "Newegg",
            "newegg.com",
            Electronics,
            Medium,
            selectors(&[
                ("product_container", &[".item-cell", ".item-container"]),
                ("title", &[".item-title", ".item-brand"]),
                ("price", &[".price-current", ".price-current-num"]),
                ("rating", &[".item-rating", ".rating"]),
                ("availability", &[".item-stock", ".availability"]),
                ("image", &[".item-img img", ".product-image"]),
                ("link", &[".item-title a", "a"]),
            ]),
            2.0,
            "https://www.newegg.com/p/pl?d={query}&page={page}",
            "https://www.newegg.com",
        ),
        base(
            "macys",
            "Macy's",
            "macys.com",
            Fashion,
            Medium,
            selectors(&[
                ("product_container", &[".productThumbnail", ".product-thumbnail"]),
                ("title", &[".product-title", ".productDescription"]),
                ("price", &[".price", ".product-price"]),
                ("rating", &[".rating", ".ratings"]),
                ("availability", &[".availability", ".stock"]),
                ("image", &[".product-image img", ".productThumbnailImage"]),
                ("link", &["a"]),
            ]),
            2.5,
            "https://www.macys.com/shop/search?keyword={query}&page={page}",
            "https://www.macys.com",
        ),
        base(
            "overstock",
            "Overstock",
            "overstock.com",
            HomeImprovement,
            Medium,
            selectors(&[
                ("product_container", &[".product-item", ".product"]),
                ("title", &[".product-title", ".product-name"]),
                ("price", &[".price", ".product-price"]),
                ("rating", &[".rating", ".stars"]),
                ("availability", &[".availability", ".stock"]),
                ("image", &[".product-image img"]),
                ("link", &["a"]),
            ]),
            3.0,
            "https://www.overstock.com/search?keywords={query}&page={page}",
            "https://www.overstock.com",
        ),
        base(
            "wayfair",
            "Wayfair",
            "wayfair.com",
            HomeImprovement,
            Medium,
            selectors(&[
                ("product_container", &["[data-testid=\"ProductCard\"]", ".ProductCard"]),
                ("title", &["[data-testid=\"ProductName\"]", ".ProductCard__name"]),
                ("price", &["[data-testid=\"PrimaryPrice\"]", ".ProductCard__price"]),
                ("rating", &["[data-testid=\"StarsContainer\"]", ".Stars"]),
                ("availability", &[".fulfillment", ".availability"]),
                ("image", &["[data-testid=\"ProductCardImage\"]", ".ProductCard__image img"]),
                ("link", &["a"]),
            ]),
            2.5,
            "https://www.wayfair.com/keyword.php?keyword={query}&page={page}",
            "https://www.wayfair.com",
        ),
        base(
            "zappos",
            "Zappos",
            "zappos.com",
            Fashion,
            Medium,
            selectors(&[
                ("product_container", &["[data-testid=\"product-grid-item\"]", ".product"]),
                ("title", &["[data-testid=\"product-name\"]", ".product-name"]),
                ("price", &["[data-testid=\"product-price\"]", ".product-price"]),
                ("rating", &["[data-testid=\"product-rating\"]", ".rating"]),
                ("availability", &[".availability", ".stock"]),
                ("image", &["[data-testid=\"product-image\"]", ".product-image img"]),
                ("link", &["a"]),
            ]),
            2.0,
            "https://www.zappos.com/search?term={query}&page={page}",
            "https://www.zappos.com",
        ),
        base(
            "bhphotovideo",
            "B&H Photo",
            "bhphotovideo.com",
            Electronics,
            Medium,
            selectors(&[
                ("product_container", &["[data-selenium=\"itemInner\"]", ".js-item-container"]),
                ("title", &["[data-selenium=\"itemTitle\"]", ".item-title"]),
                ("price", &["[data-selenium=\"itemPrice\"]", ".price"]),
                ("rating", &["[data-selenium=\"itemRating\"]", ".rating"]),
                ("availability", &["[data-selenium=\"itemAvailability\"]", ".availability"]),
                ("image", &["[data-selenium=\"itemImage\"]", ".item-image img"]),
                ("link", &["a"]),
            ]),
            2.0,
            "https://www.bhphotovideo.com/c/search?Ntt={query}&page={page}",
            "https://www.bhphotovideo.com",
        ),
        base(
            "nordstrom",
            "Nordstrom",
            "nordstrom.com",
            Fashion,
            Low,
            selectors(&[
                ("product_container", &["[data-testid=\"product-module\"]", ".product-module"]),
                ("title", &["[data-testid=\"product-title\"]", ".product-title"]),
                ("price", &["[data-testid=\"product-price\"]", ".product-price"]),
                ("rating", &["[data-testid=\"product-rating\"]", ".rating"]),
                ("availability", &[".availability", ".stock"]),
                ("image", &["[data-testid=\"product-image\"]", ".product-image img"]),
                ("link", &["a"]),
            ]),
            3.0,
            "https://www.nordstrom.com/sr?keyword={query}&page={page}",
            "https://www.nordstrom.com",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_catalog_has_fifteen_retailers() {
        assert_eq!(seed_catalog().len(), 15);
    }

    #[test]
    fn amazon_requires_stealth_browser() {
        let amazon = seed_catalog().into_iter().find(|r| r.key == "amazon").unwrap();
        assert_eq!(amazon.required_strategy.as_deref(), Some("stealth_browser"));
        assert!(amazon.anti_bot_indicators.contains(&"captcha".to_string()));
    }

    #[test]
    fn every_retailer_has_a_link_selector() {
        for retailer in seed_catalog() {
            assert!(
                retailer.selectors.contains_key("link"),
                "{} missing link selector",
                retailer.key
            );
        }
    }
}
