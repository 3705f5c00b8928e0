//! Scraping of GitHub's trending page.

use crate::facts::raw_signal::TrendingEntry;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article.Box-row, article.box-row").expect("invalid selector"));
static HEADING_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2 a[href], h1 a[href]").expect("invalid selector"));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").expect("invalid selector"));
static LANGUAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[itemprop=programmingLanguage]").expect("invalid selector"));
static STARS: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"a[href$="/stargazers"]"#).expect("invalid selector"));
static FORKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href$="/forks"], a[href$="/network/members"]"#).expect("invalid selector"));
static GAINED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d,.]+k?)\s+stars?\s+(?:today|this\s+week|this\s+month)").expect("invalid regex"));

/// Extract one entry per repository row. Rows without a repository link are skipped.
#[must_use]
pub fn parse_trending_page(html: &str) -> Vec<TrendingEntry> {
    let document = Html::parse_document(html);
    document.select(&ROW).filter_map(parse_row).collect()
}

fn parse_row(row: ElementRef<'_>) -> Option<TrendingEntry> {
    let repo_path = row.select(&HEADING_LINK).next()?.value().attr("href")?.trim().to_string();

    let row_text = text_of(row);
    let gained_text = GAINED
        .captures(&row_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    Some(TrendingEntry {
        repo_path,
        description: row.select(&DESCRIPTION).next().map(text_of).filter(|s| !s.is_empty()),
        language: row.select(&LANGUAGE).next().map(text_of).filter(|s| !s.is_empty()),
        stars_text: row.select(&STARS).next().map(text_of).unwrap_or_default(),
        forks_text: row.select(&FORKS).next().map(text_of),
        gained_text,
    })
}

/// All text below `element`, with runs of whitespace collapsed to single spaces.
fn text_of(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}
