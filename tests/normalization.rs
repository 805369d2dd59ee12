//! Property tests for snapshot normalization.
//!
//! Two fetches of the same logical feed must normalize to identical text no
//! matter how the publisher orders, indents or escapes it, and nothing a
//! server sends may make normalization panic.

use driftfeed::normalize::{extract_items, normalize, Kind, NormalizeOptions, Stage};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Item {
    title: String,
    link: String,
    guid: String,
    body: String,
}

fn item_strategy() -> impl Strategy<Value = Item> {
    (
        "[A-Za-z][A-Za-z0-9 ]{0,15}[A-Za-z0-9]",
        "[a-z0-9]{1,8}",
        "[a-z0-9-]{1,12}",
        "[A-Za-z0-9 .,]{0,40}",
    )
        .prop_map(|(title, slug, guid, body)| Item {
            title,
            link: format!("https://example.com/{slug}"),
            guid,
            body,
        })
}

fn rss(items: &[Item], build_date: &str, pad: &str) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel><title>Feed</title><lastBuildDate>{build_date}</lastBuildDate>"
    );
    for item in items {
        xml.push_str(&format!(
            "<item>{pad}<title>{pad}{}{pad}</title><link>{}</link><guid isPermaLink=\"false\">{}</guid><description>{pad}{}{pad}</description></item>\n",
            item.title, item.link, item.guid, item.body
        ));
    }
    xml.push_str("</channel></rss>");
    xml
}

fn atom(items: &[Item], link_rel_first: bool) -> String {
    let mut xml = String::from("<feed xmlns=\"http://www.w3.org/2005/Atom\"><title>Feed</title>");
    for item in items {
        let link = if link_rel_first {
            format!("<link rel=\"alternate\" href=\"{}\"/>", item.link)
        } else {
            format!("<link href=\"{}\" rel=\"alternate\"/>", item.link)
        };
        xml.push_str(&format!(
            "<entry><title>{}</title>{link}<id>{}</id><summary>{}</summary></entry>",
            item.title, item.guid, item.body
        ));
    }
    xml.push_str("</feed>");
    xml
}

fn feed(text: &str) -> String {
    normalize(text, Kind::RssMin, &NormalizeOptions::default())
}

proptest! {
    #[test]
    fn prop_item_order_does_not_matter(items in prop::collection::vec(item_strategy(), 0..8)) {
        let mut reversed = items.clone();
        reversed.reverse();
        prop_assert_eq!(
            feed(&rss(&items, "Mon, 30 Sep 2024 00:00:00 GMT", "")),
            feed(&rss(&reversed, "Mon, 30 Sep 2024 00:00:00 GMT", ""))
        );
    }

    #[test]
    fn prop_whitespace_and_feed_timestamps_ignored(
        items in prop::collection::vec(item_strategy(), 1..6),
        pad in "[ \t\n]{0,4}",
    ) {
        let plain = feed(&rss(&items, "Mon, 30 Sep 2024 00:00:00 GMT", ""));
        let noisy = feed(&rss(&items, "Tue, 01 Oct 2024 12:34:56 GMT", &pad));
        prop_assert_eq!(plain, noisy);
    }

    #[test]
    fn prop_atom_attribute_order_ignored(items in prop::collection::vec(item_strategy(), 0..6)) {
        prop_assert_eq!(feed(&atom(&items, true)), feed(&atom(&items, false)));
    }

    #[test]
    fn prop_normalization_is_idempotent(text in any::<String>()) {
        let options = NormalizeOptions::default();
        prop_assert_eq!(
            normalize(&text, Kind::RssMin, &options),
            normalize(&text, Kind::RssMin, &options)
        );
        prop_assert_eq!(
            normalize(&text, Kind::OpenApiC14nV1, &options),
            normalize(&text, Kind::OpenApiC14nV1, &options)
        );
    }

    #[test]
    fn prop_arbitrary_markup_never_panics(
        body in "(<item>|</item>|<title>|</title>|<entry>|<link href=\"x\"/>|&amp;|&|<!\\[CDATA\\[|\\]\\]>|[a-z ]{1,5}){0,30}"
    ) {
        let out = feed(&body);
        prop_assert!(out.ends_with('\n'));
        prop_assert!(!out.ends_with("\n\n"));
    }

    #[test]
    fn prop_openapi_key_order_ignored(keys in prop::collection::btree_set("[a-z]{1,6}", 1..8)) {
        let keys: Vec<String> = keys.into_iter().collect();
        let forward: String = keys.iter().enumerate().map(|(i, k)| format!("{k}: {i}\n")).collect();
        let backward: String = keys
            .iter()
            .enumerate()
            .rev()
            .map(|(i, k)| format!("{k}: {i}\n"))
            .collect();
        let options = NormalizeOptions::default();
        prop_assert_eq!(
            normalize(&forward, Kind::OpenApiC14nV1, &options),
            normalize(&backward, Kind::OpenApiC14nV1, &options)
        );
    }
}

#[test]
fn test_entity_spellings_are_equivalent() {
    let named = "<rss><channel><item><title>Q&amp;A &lt;v2&gt;</title></item></channel></rss>";
    let numeric = "<rss><channel><item><title>Q&#38;A &#x3C;v2&#62;</title></item></channel></rss>";
    let cdata = "<rss><channel><item><title><![CDATA[Q&A <v2>]]></title></item></channel></rss>";
    assert_eq!(feed(named), feed(numeric));
    assert_eq!(feed(named), feed(cdata));
    assert!(feed(named).contains("title: Q&A <v2>\n"));
}

#[test]
fn test_html_entity_in_feed_is_repaired_or_recovered() {
    // &nbsp; is not an XML entity; the item must still come through
    let xml = "<rss><channel><item><title>Hello&nbsp;World</title><guid>g</guid></item></channel></rss>";
    let extraction = extract_items(xml, &NormalizeOptions::default());
    assert_ne!(extraction.stage, Stage::Strict);
    assert_eq!(extraction.items.len(), 1);
    assert_eq!(extraction.items[0].id, "g");
    assert!(extraction.items[0].title.starts_with("Hello"));
}

#[test]
fn test_body_limit_applies() {
    let xml = format!(
        "<rss><channel><item><description>{}</description></item></channel></rss>",
        "x".repeat(50)
    );
    let options = NormalizeOptions {
        body_limit: 10,
        ..NormalizeOptions::default()
    };
    let out = normalize(&xml, Kind::RssMin, &options);
    assert!(out.ends_with(&format!("body: {}\n", "x".repeat(10))));
}

#[test]
fn test_rss_and_atom_mixture_of_real_world_shapes() {
    let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Changelog</title>
    <lastBuildDate>Mon, 30 Sep 2024 00:00:00 GMT</lastBuildDate>
    <item>
      <title>Realtime API   update</title>
      <link>https://developers.example.com/changelog#realtime</link>
      <guid>realtime-2024-09-30</guid>
      <pubDate>Mon, 30 Sep 2024 00:00:00 GMT</pubDate>
      <dc:creator>Team</dc:creator>
      <description><![CDATA[<p>New   voices</p>]]></description>
    </item>
  </channel>
</rss>"#;
    assert_eq!(
        feed(rss),
        "#ITEM\n\
         title: Realtime API update\n\
         link: https://developers.example.com/changelog#realtime\n\
         id: realtime-2024-09-30\n\
         date: Mon, 30 Sep 2024 00:00:00 GMT\n\
         body: <p>New voices</p>\n"
    );
}
