use super::FeedItem;
use crate::util::truncate_chars;

/// Render feed items as the canonical `#ITEM` record stream.
///
/// Items are sorted by `(link, id, title)`, with `date` and `body` as final
/// tie-breakers so the order is total and independent of the source order.
/// Bodies are cut to `body_limit` characters with no marker. Each item
/// renders as:
///
/// ```text
/// #ITEM
/// title: ...
/// link: ...
/// id: ...
/// date: ...
/// body: ...
/// ```
///
/// Lines are joined with `\n`, the result is trimmed and ends with exactly
/// one `\n`. An empty item list renders as `"\n"`.
pub fn render_items(mut items: Vec<FeedItem>, body_limit: usize) -> String {
    items.sort_by(|a, b| {
        (&a.link, &a.id, &a.title, &a.date, &a.body).cmp(&(
            &b.link, &b.id, &b.title, &b.date, &b.body,
        ))
    });

    let mut lines: Vec<String> = Vec::with_capacity(items.len() * 6);
    for item in &items {
        lines.push("#ITEM".to_string());
        lines.push(format!("title: {}", item.title));
        lines.push(format!("link: {}", item.link));
        lines.push(format!("id: {}", item.id));
        lines.push(format!("date: {}", item.date));
        lines.push(format!("body: {}", truncate_chars(&item.body, body_limit)));
    }

    let mut out = lines.join("\n").trim().to_string();
    out.push('\n');
    out
}
