// src/ingest/providers/rss.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use quick_xml::events::Event;
use quick_xml::Reader;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::ingest::clean_title;
use crate::ingest::types::{Headline, HeadlineSource};

#[derive(Debug, Default)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    PubDate,
}

impl Field {
    /// Only unprefixed names count; `media:title` or `atom:link` are skipped.
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }
}

impl Item {
    /// First occurrence wins.
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::PubDate => &mut self.pub_date,
        };
        if slot.is_none() {
            *slot = Some(text);
        }
    }
}

/// Walk the document and collect up to `limit` `<item>` elements in document
/// order, wherever they sit. Only direct children of an item are read.
fn read_items(xml: &str, limit: usize) -> Result<Vec<Item>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut saw_channel = false;
    // (depth of the open <item>, fields so far)
    let mut item: Option<(usize, Item)> = None;
    let mut field: Option<(Field, String)> = None;

    while out.len() < limit {
        match reader.read_event().context("malformed xml")? {
            Event::Start(e) => {
                depth += 1;
                let name = e.name();
                let name = name.as_ref();
                if name == b"channel" {
                    saw_channel = true;
                }
                match item.as_ref().map(|(d, _)| *d) {
                    None if name == b"item" => item = Some((depth, Item::default())),
                    Some(d) if depth == d + 1 => {
                        field = Field::from_name(name).map(|f| (f, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                if name.as_ref() == b"channel" {
                    saw_channel = true;
                } else if item.is_none() && name.as_ref() == b"item" {
                    out.push(Item::default());
                }
            }
            Event::Text(t) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::CData(t) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                let open_at = item.as_ref().map(|(d, _)| *d);
                match open_at {
                    Some(d) if depth == d + 1 => {
                        if let (Some((f, text)), Some((_, it))) = (field.take(), item.as_mut()) {
                            it.set(f, text);
                        }
                    }
                    Some(d) if depth == d => {
                        if let Some((_, it)) = item.take() {
                            out.push(it);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => {
                if depth != 0 {
                    bail!("unexpected end of document ({depth} element(s) left open)");
                }
                break;
            }
            _ => {}
        }
    }

    if !saw_channel {
        bail!("no <channel> element");
    }
    Ok(out)
}

fn parse_rfc2822_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

/// RSS 2.0 feed: takes the first `limit` items in document order.
pub struct RssProvider {
    name: String,
    limit: usize,
    title_max_chars: usize,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssProvider {
    pub fn from_url(
        name: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
        limit: usize,
        title_max_chars: usize,
    ) -> Self {
        Self {
            name: name.into(),
            limit,
            title_max_chars,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    pub fn from_fixture(
        name: impl Into<String>,
        xml: &str,
        limit: usize,
        title_max_chars: usize,
    ) -> Self {
        Self {
            name: name.into(),
            limit,
            title_max_chars,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<Headline>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let items = read_items(&xml_clean, self.limit)
            .with_context(|| format!("parsing {} rss xml", self.name))?;

        let out: Vec<Headline> = items
            .into_iter()
            .filter_map(|it| {
                let title = clean_title(it.title.as_deref()?, self.title_max_chars)?;
                Some(Headline {
                    source: self.name.clone(),
                    title,
                    url: it
                        .link
                        .map(|l| html_escape::decode_html_entities(l.trim()).into_owned())
                        .filter(|l| !l.is_empty()),
                    published_at: it
                        .pub_date
                        .as_deref()
                        .map(parse_rfc2822_to_unix)
                        .unwrap_or(0),
                })
            })
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl HeadlineSource for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<Headline>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.name))?
                    .error_for_status()
                    .with_context(|| format!("{} non-2xx", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// XML only knows five named entities; feeds routinely leak HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Test feed</title>
    <atom:link href="https://example.com/rss" rel="self"/>
    <item>
      <title><![CDATA[ First &amp; foremost ]]></title>
      <link>https://example.com/1</link>
      <pubDate>Tue, 10 Jun 2025 12:00:00 +0000</pubDate>
    </item>
    <item>
      <title></title>
      <link>https://example.com/2</link>
    </item>
    <item><title>Third&nbsp;item</title></item>
    <item><title>Fourth item</title></item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn takes_first_n_and_skips_blank_titles() {
        let p = RssProvider::from_fixture("Test", FEED, 3, 100);
        let items = p.fetch_latest().await.unwrap();
        let titles: Vec<&str> = items.iter().map(|h| h.title.as_str()).collect();
        // item 2 is blank, item 4 is past the limit
        assert_eq!(titles, vec!["First & foremost", "Third item"]);
        assert_eq!(items[0].source, "Test");
        assert_eq!(items[0].url.as_deref(), Some("https://example.com/1"));
        assert_eq!(items[0].published_at, 1_749_556_800);
        assert_eq!(items[1].published_at, 0);
    }

    #[tokio::test]
    async fn long_titles_are_truncated() {
        let xml = format!(
            "<rss><channel><item><title>{}</title></item></channel></rss>",
            "x".repeat(150)
        );
        let p = RssProvider::from_fixture("T", &xml, 3, 100);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items[0].title.len(), 103);
    }

    #[tokio::test]
    async fn garbage_is_an_error() {
        let p = RssProvider::from_fixture("Broken", "<html>nope", 3, 100);
        assert!(p.fetch_latest().await.is_err());
    }

    #[tokio::test]
    async fn namespaced_children_do_not_shadow_item_fields() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
  <item>
    <media:title>Media caption</media:title>
    <title>Real title</title>
    <atom:link href="https://example.com/self" rel="self"/>
    <link>https://example.com/a?x=1&amp;y=2</link>
    <atom:link>https://example.com/atom</atom:link>
    <dc:pubDate xmlns:dc="urn:dc">Mon, 01 Jan 2024 00:00:00 +0000</dc:pubDate>
    <pubDate>Tue, 10 Jun 2025 12:00:00 +0000</pubDate>
  </item>
</channel>
</rss>"#;
        let p = RssProvider::from_fixture("NS", xml, 3, 100);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Real title");
        assert_eq!(items[0].url.as_deref(), Some("https://example.com/a?x=1&y=2"));
        assert_eq!(items[0].published_at, 1_749_556_800);
    }

    #[tokio::test]
    async fn interleaved_items_keep_document_order() {
        let xml = "<rss><channel>\
            <item><title>one</title></item>\
            <image><title>logo</title><url>https://example.com/l.png</url></image>\
            <item><title>two</title></item>\
            <foo/>\
            <item><title>three</title></item>\
            </channel></rss>";
        let p = RssProvider::from_fixture("Mixed", xml, 5, 100);
        let titles: Vec<String> = p
            .fetch_latest()
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.title)
            .collect();
        assert_eq!(titles, vec!["one", "two", "three"]);

        let p = RssProvider::from_fixture("Mixed", xml, 2, 100);
        assert_eq!(p.fetch_latest().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unclosed_document_is_an_error() {
        let p = RssProvider::from_fixture("Cut", "<rss><channel><item><title>x</title>", 3, 100);
        assert!(p.fetch_latest().await.is_err());
        let p = RssProvider::from_fixture("Text", "not xml", 3, 100);
        assert!(p.fetch_latest().await.is_err());
    }

    #[tokio::test]
    async fn empty_channel_yields_nothing() {
        let p = RssProvider::from_fixture("Empty", "<rss><channel><title>x</title></channel></rss>", 3, 100);
        assert!(p.fetch_latest().await.unwrap().is_empty());
    }
}
