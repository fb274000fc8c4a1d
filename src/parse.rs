//! Page Parser: extracts `(domain, price, next_token)` from one
//! response body. Grounded on
//! `original_source/backend/scraper_service.py::parse_html_and_next`.

use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;

use crate::model::Domain;

/// One listing extracted from a page, before it has been deduplicated or
/// staged.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedListing {
    pub name: String,
    pub price: Option<Decimal>,
    pub length: i32,
}

/// `parse(body) -> (rows, next_token?)`.
pub fn parse_page(body: &str) -> (Vec<ParsedListing>, Option<String>) {
    let document = Html::parse_document(body);

    // `domain-row` blocks each carry one listing's name and price.
    let row_selector = Selector::parse("div.domain-row").expect("static selector");
    let name_selector = Selector::parse("span.domain > a.link").expect("static selector");
    let price_selector = Selector::parse("span.domain > span.price").expect("static selector");

    let mut rows = Vec::new();
    for row in document.select(&row_selector) {
        let Some(name_el) = row.select(&name_selector).next() else {
            continue; // missing selector: drop this listing, keep the page
        };
        let Some(price_el) = row.select(&price_selector).next() else {
            continue;
        };

        let name = Domain::normalize_name(&name_el.text().collect::<String>());
        if name.is_empty() {
            continue;
        }
        let price_text: String = price_el.text().collect();
        let price = parse_price(&price_text);
        let length = Domain::label_length(&name);

        rows.push(ParsedListing { name, price, length });
    }

    let next_token = extract_next_token(&document);
    (rows, next_token)
}

/// Strip everything but ASCII digits and `.`, then parse as `Decimal`.
/// Empty or unparseable input yields `None`, never zero.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// The continuation token lives in the `href` of the first `a.next-link` or
/// `a.next-serch-link` (misspelling intentionally preserved, matching the
/// upstream markup), under query parameter `n=`.
fn extract_next_token(document: &Html) -> Option<String> {
    let link_selector = Selector::parse("a.next-link, a.next-serch-link").expect("static selector");
    let href = document.select(&link_selector).next()?.value().attr("href")?;
    extract_n_param(href)
}

fn extract_n_param(href: &str) -> Option<String> {
    let query = href.split_once('?').map(|(_, q)| q).unwrap_or(href);
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if key == "n" {
                return Some(value.trim_matches('"').to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows_html: &str, next_link: &str) -> String {
        format!(
            r#"<html><body>{rows_html}{next_link}</body></html>"#
        )
    }

    fn row(name: &str, price: &str) -> String {
        format!(
            r#"<div class="domain-row"><span class="domain"><a class="link">{name}</a><span class="price">{price}</span></span></div>"#
        )
    }

    #[test]
    fn parses_domain_price_and_length() {
        let html = page(&row("Foo.COM", "$4,995.00"), "");
        let (rows, next) = parse_page(&html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "foo.com");
        assert_eq!(rows[0].price, Some(Decimal::from_str("4995.00").unwrap()));
        assert_eq!(rows[0].length, 3);
        assert_eq!(next, None);
    }

    #[test]
    fn empty_price_is_null_not_zero() {
        let html = page(&row("bar.net", ""), "");
        let (rows, _) = parse_page(&html);
        assert_eq!(rows[0].price, None);
    }

    #[test]
    fn zero_dollar_price_is_zero_not_null() {
        assert_eq!(parse_price("$0.00"), Some(Decimal::from_str("0.00").unwrap()));
    }

    #[test]
    fn dollar_with_thousands_separator() {
        assert_eq!(
            parse_price("$1,234.56"),
            Some(Decimal::from_str("1234.56").unwrap())
        );
    }

    #[test]
    fn empty_string_price_is_null() {
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn extracts_next_link_token() {
        let html = page(
            &row("foo.com", "$1.00"),
            r#"<a class="next-link" href="/domain_search.cfm?start=500&n=abc123">Next</a>"#,
        );
        let (_, next) = parse_page(&html);
        assert_eq!(next.as_deref(), Some("abc123"));
    }

    #[test]
    fn accepts_misspelled_next_serch_link() {
        let html = page(
            &row("foo.com", "$1.00"),
            r#"<a class="next-serch-link" href="/domain_search.cfm?n=xyz789">Next</a>"#,
        );
        let (_, next) = parse_page(&html);
        assert_eq!(next.as_deref(), Some("xyz789"));
    }

    #[test]
    fn missing_next_link_yields_none() {
        let html = page(&row("foo.com", "$1.00"), "");
        let (_, next) = parse_page(&html);
        assert_eq!(next, None);
    }

    #[test]
    fn row_missing_price_span_is_dropped_not_fatal() {
        let html = r#"<html><body><div class="domain-row"><span class="domain"><a class="link">foo.com</a></span></div></body></html>"#;
        let (rows, _) = parse_page(html);
        assert!(rows.is_empty());
    }
}
