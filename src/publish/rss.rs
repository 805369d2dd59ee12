use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use super::PublishError;
use crate::storage::ChangeEvent;
use crate::util::{strip_xml_illegal_chars, truncate_with_marker, TRUNCATION_MARKER};

/// Channel-level fields of a published feed.
#[derive(Debug, Clone)]
pub struct ChannelMeta {
    pub title: String,
    /// Site the feed belongs to, normally from [`super::resolve_base_url`].
    pub link: String,
    pub description: String,
    pub last_build_date: DateTime<Utc>,
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn write(writer: &mut XmlWriter, event: Event<'_>, what: &str) -> Result<(), PublishError> {
    writer
        .write_event(event)
        .map_err(|e| PublishError::Xml(format!("Failed to write {what}: {e}")))
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), PublishError> {
    let text = strip_xml_illegal_chars(text);
    write(writer, Event::Start(BytesStart::new(name)), name)?;
    write(writer, Event::Text(BytesText::new(&text)), name)?;
    write(writer, Event::End(BytesEnd::new(name)), name)
}

/// Make `text` safe to place inside a single CDATA section.
///
/// XML-illegal control characters are removed and every `]]>` is split
/// across two sections.
pub fn cdata_safe(text: &str) -> String {
    strip_xml_illegal_chars(text).replace("]]>", "]]]]><![CDATA[>")
}

/// HTML body of an item's `<description>`.
fn item_html(event: &ChangeEvent, excerpt_limit: usize) -> String {
    let snippet = truncate_with_marker(&event.snippet, excerpt_limit, TRUNCATION_MARKER);

    let mut html = format!(
        "<p><strong>Impact:</strong> {}</p>\n<p><strong>URL:</strong> <a href=\"{url}\">{url}</a></p>\n",
        event.impact,
        url = escape(event.url.as_str()),
    );
    if let Some(summary) = event.summary_ja.as_deref().filter(|s| !s.trim().is_empty()) {
        html.push_str(&format!("<p>{}</p>\n", escape(summary)));
    }
    html.push_str(&format!("<pre>{}</pre>", escape(&*snippet)));
    html
}

/// Render `events` as an RSS 2.0 document, in the order given.
///
/// Snippets are cut to `excerpt_limit` characters before HTML escaping.
pub fn render_rss(
    channel: &ChannelMeta,
    events: &[ChangeEvent],
    excerpt_limit: usize,
) -> Result<String, PublishError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        "XML declaration",
    )?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    write(&mut writer, Event::Start(rss), "rss")?;
    write(&mut writer, Event::Start(BytesStart::new("channel")), "channel")?;

    text_element(&mut writer, "title", &channel.title)?;
    text_element(&mut writer, "link", &channel.link)?;
    text_element(&mut writer, "description", &channel.description)?;
    text_element(&mut writer, "lastBuildDate", &channel.last_build_date.to_rfc2822())?;

    for event in events {
        write(&mut writer, Event::Start(BytesStart::new("item")), "item")?;

        text_element(&mut writer, "title", &format!("[{}] {}", event.impact, event.name))?;
        text_element(&mut writer, "link", &event.url)?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        write(&mut writer, Event::Start(guid), "guid")?;
        write(&mut writer, Event::Text(BytesText::new(&event.id)), "guid")?;
        write(&mut writer, Event::End(BytesEnd::new("guid")), "guid")?;

        if let Some(pub_date) = &event.pub_date {
            text_element(&mut writer, "pubDate", pub_date)?;
        }

        let html = cdata_safe(&item_html(event, excerpt_limit));
        write(&mut writer, Event::Start(BytesStart::new("description")), "description")?;
        write(&mut writer, Event::CData(BytesCData::new(html.as_str())), "description")?;
        write(&mut writer, Event::End(BytesEnd::new("description")), "description")?;

        write(&mut writer, Event::End(BytesEnd::new("item")), "item")?;
    }

    write(&mut writer, Event::End(BytesEnd::new("channel")), "channel")?;
    write(&mut writer, Event::End(BytesEnd::new("rss")), "rss")?;

    let mut xml = String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| PublishError::Xml(format!("Generated feed contains invalid UTF-8: {e}")))?;
    xml.push('\n');
    Ok(xml)
}
