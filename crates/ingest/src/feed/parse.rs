//! RSS 2.0 / RSS 1.0 / Atom parsing into [`RawItem`]s.

use chrono::{DateTime, Utc};
use intel_core::RawItem;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::IngestError;
use crate::settings::FeedSource;

/// Max characters kept from an item's summary.
const MAX_SUMMARY_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Summary,
    Published,
    Category,
}

#[derive(Debug, Default)]
struct Entry {
    title: String,
    link: String,
    summary: String,
    published: String,
    category: String,
}

impl Entry {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::Category => &mut self.category,
        }
    }
}

/// Parse one feed document. Fails on malformed XML or when the document is
/// not a feed at all (an HTML error page, say).
pub fn parse_feed(xml: &str, feed: &FeedSource) -> Result<Vec<RawItem>, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut saw_feed_root = false;
    let mut current: Option<Entry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"rss" | b"feed" | b"RDF" | b"channel" => saw_feed_root = true,
                    b"item" | b"entry" => {
                        current = Some(Entry::default());
                        field = None;
                    }
                    other => {
                        if let Some(entry) = current.as_mut() {
                            if other == b"link" && take_link_href(&e, entry) {
                                field = None;
                            } else {
                                field = field_for(other, entry);
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = current.as_mut() {
                    match e.local_name().as_ref() {
                        b"link" => {
                            take_link_href(&e, entry);
                        }
                        b"category" if entry.category.is_empty() => {
                            if let Some(term) = attr(&e, "term") {
                                entry.category = term;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|e| IngestError::Parse(format!("{}: {e}", feed.name)))?;
                    entry.slot(f).push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    entry.slot(f).push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(entry) = current.take() {
                        if let Some(item) = into_raw_item(entry, feed) {
                            items.push(item);
                        }
                    }
                    field = None;
                }
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::Parse(format!(
                    "{} at byte {}: {e}",
                    feed.name,
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if !saw_feed_root {
        return Err(IngestError::Parse(format!(
            "{}: document is not an RSS or Atom feed",
            feed.name
        )));
    }
    Ok(items)
}

/// Which entry field an element feeds, if any. The first non-empty value
/// wins, so `description` beats a later `content:encoded`.
fn field_for(name: &[u8], entry: &Entry) -> Option<Field> {
    let (field, current) = match name {
        b"title" => (Field::Title, &entry.title),
        b"link" => (Field::Link, &entry.link),
        b"description" | b"summary" | b"content" | b"encoded" => (Field::Summary, &entry.summary),
        b"pubDate" | b"published" | b"updated" | b"date" => (Field::Published, &entry.published),
        b"category" => (Field::Category, &entry.category),
        _ => return None,
    };
    current.is_empty().then_some(field)
}

/// Atom `<link href=".."/>`. Only alternate links count.
fn take_link_href(e: &BytesStart<'_>, entry: &mut Entry) -> bool {
    let Some(href) = attr(e, "href") else {
        return false;
    };
    let rel = attr(e, "rel");
    if matches!(rel.as_deref(), None | Some("alternate")) && entry.link.is_empty() {
        entry.link = href;
    }
    true
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn into_raw_item(entry: Entry, feed: &FeedSource) -> Option<RawItem> {
    let category = if feed.category.is_empty() {
        entry.category.trim().to_string()
    } else {
        feed.category.clone()
    };
    let item = RawItem {
        url: entry.link.trim().to_string(),
        title: collapse_whitespace(&entry.title),
        summary: truncate_chars(&strip_html(&entry.summary), MAX_SUMMARY_CHARS),
        published: parse_date(&entry.published),
        source: feed.name.clone(),
        category,
    };
    match item.validate() {
        Ok(()) => Some(item),
        Err(e) => {
            debug!(feed = %feed.name, error = %e, "skipping feed entry");
            None
        }
    }
}

/// RFC 2822 (RSS) or RFC 3339 (Atom, Dublin Core).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

/// Drop tags and collapse whitespace. Summaries often carry inline HTML.
fn strip_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
