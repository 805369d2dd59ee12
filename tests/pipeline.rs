//! End-to-end runs against a mock upstream: fetch, normalize, compare,
//! persist and publish.
//!
//! Each test uses its own directory under the system temp dir and its own
//! mock server.

use driftfeed::config::{Config, Target};
use driftfeed::normalize::Kind;
use driftfeed::publish::{FEED_FILE, IMPORTANT_FEED_FILE};
use driftfeed::run::{run, RunReport};
use driftfeed::storage::{Impact, StateStore};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_V1: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Upstream</title>
  <lastBuildDate>Mon, 30 Sep 2024 00:00:00 GMT</lastBuildDate>
  <item><title>First</title><link>https://example.com/1</link><guid>1</guid></item>
</channel></rss>"#;

// Only the feed-level timestamp and layout differ from v1
const FEED_V1_REBUILT: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Upstream</title>
    <lastBuildDate>Tue, 01 Oct 2024 09:00:00 GMT</lastBuildDate>
    <item>
      <guid>1</guid>
      <link>https://example.com/1</link>
      <title>  First </title>
    </item>
  </channel>
</rss>"#;

const FEED_V2: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item><title>Second</title><link>https://example.com/2</link><guid>2</guid></item>
  <item><title>First</title><link>https://example.com/1</link><guid>1</guid></item>
</channel></rss>"#;

const SPEC_V1: &str = "openapi: 3.1.0\nservers:\n  - url: https://b.example.com\n  - url: https://a.example.com\ninfo:\n  title: API\n";
const SPEC_V1_SHUFFLED: &str = "info: {title: API}\nservers: [{url: 'https://a.example.com'}, {url: 'https://b.example.com'}]\nopenapi: 3.1.0\n";

struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("driftfeed_pipeline_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        Self { dir }
    }

    fn state(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    fn out(&self) -> PathBuf {
        self.dir.join("public")
    }

    fn read_out(&self, file: &str) -> String {
        std::fs::read_to_string(self.out().join(file)).unwrap()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

fn config_for(server: &MockServer) -> Config {
    Config {
        allow_private_hosts: true,
        site_url: Some("https://watch.example.com".into()),
        targets: vec![
            Target::new(
                "Changelog",
                &format!("{}/rss.xml", server.uri()),
                Impact::High,
                Kind::RssMin,
            ),
            Target::new(
                "Spec",
                &format!("{}/openapi.yml", server.uri()),
                Impact::Breaking,
                Kind::OpenApiC14nV1,
            ),
        ],
        ..Config::default()
    }
}

async fn serve(server: &MockServer, feed: &str, spec: &str) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/openapi.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(spec))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_baseline_then_cosmetic_changes_then_real_change() {
    let ws = Workspace::new("lifecycle");
    let server = MockServer::start().await;
    let config = config_for(&server);

    // First run stores baselines and publishes empty feeds
    serve(&server, FEED_V1, SPEC_V1).await;
    let report = run(&config, &ws.state(), &ws.out()).await.unwrap();
    assert_eq!(
        report,
        RunReport {
            baseline: 2,
            ..RunReport::default()
        }
    );
    assert!(!ws.read_out(FEED_FILE).contains("<item>"));
    assert!(ws
        .read_out(FEED_FILE)
        .contains("<link>https://watch.example.com/</link>"));

    // Reformatting and reordering upstream is not a change
    serve(&server, FEED_V1_REBUILT, SPEC_V1_SHUFFLED).await;
    let report = run(&config, &ws.state(), &ws.out()).await.unwrap();
    assert_eq!(
        report,
        RunReport {
            unchanged: 2,
            ..RunReport::default()
        }
    );

    // A new item is
    serve(&server, FEED_V2, SPEC_V1_SHUFFLED).await;
    let report = run(&config, &ws.state(), &ws.out()).await.unwrap();
    assert_eq!(
        report,
        RunReport {
            changed: 1,
            unchanged: 1,
            ..RunReport::default()
        }
    );

    let store = StateStore::load(&ws.state()).unwrap();
    assert_eq!(store.targets.len(), 2);
    assert_eq!(store.events().len(), 1);
    let event = &store.events()[0];
    assert_eq!(event.name, "Changelog");
    assert_eq!(event.impact, Impact::High);
    assert!(event.snippet.contains("+title: Second"), "{}", event.snippet);

    let feed = ws.read_out(FEED_FILE);
    assert_eq!(feed.matches("<item>").count(), 1);
    assert!(feed.contains("<title>[High] Changelog</title>"));
    assert!(feed.contains(&format!("<guid isPermaLink=\"false\">{}</guid>", event.id)));

    let important = ws.read_out(IMPORTANT_FEED_FILE);
    assert_eq!(important.matches("<item>").count(), 1);
}

#[tokio::test]
async fn test_spec_change_lands_in_important_feed_first() {
    let ws = Workspace::new("spec_change");
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    config.targets[0].impact = Impact::Low;

    serve(&server, FEED_V1, SPEC_V1).await;
    run(&config, &ws.state(), &ws.out()).await.unwrap();

    serve(&server, FEED_V2, SPEC_V1).await;
    run(&config, &ws.state(), &ws.out()).await.unwrap();

    serve(&server, FEED_V2, "openapi: 3.1.0\ninfo:\n  title: API v2\n").await;
    run(&config, &ws.state(), &ws.out()).await.unwrap();

    let feed = ws.read_out(FEED_FILE);
    let spec_at = feed.find("[Breaking] Spec").unwrap();
    let feed_at = feed.find("[Low] Changelog").unwrap();
    assert!(spec_at < feed_at, "newest event should come first");

    let important = ws.read_out(IMPORTANT_FEED_FILE);
    assert!(important.contains("[Breaking] Spec"));
    assert!(!important.contains("[Low] Changelog"));
}

#[tokio::test]
async fn test_failed_target_keeps_previous_snapshot() {
    let ws = Workspace::new("failure");
    let server = MockServer::start().await;
    let config = config_for(&server);

    serve(&server, FEED_V1, SPEC_V1).await;
    run(&config, &ws.state(), &ws.out()).await.unwrap();
    let before = StateStore::load(&ws.state()).unwrap();

    // Feed disappears, spec stays
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/openapi.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SPEC_V1))
        .mount(&server)
        .await;

    let report = run(&config, &ws.state(), &ws.out()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.unchanged, 1);

    let after = StateStore::load(&ws.state()).unwrap();
    let id = &config.targets[0].id;
    assert_eq!(after.targets[id], before.targets[id]);
    assert!(after.events().is_empty());
}

#[tokio::test]
async fn test_broken_feed_still_produces_snapshot() {
    let ws = Workspace::new("broken_feed");
    let server = MockServer::start().await;
    let config = config_for(&server);

    let broken = "<rss><channel><item><title>Fish & Chips</title><guid>1</guid></item>\
                  <item><title>Unclosed";
    serve(&server, broken, SPEC_V1).await;
    let report = run(&config, &ws.state(), &ws.out()).await.unwrap();
    assert_eq!(report.baseline, 2);

    let store = StateStore::load(&ws.state()).unwrap();
    let canonical = &store.targets[&config.targets[0].id].canonical;
    assert!(canonical.contains("title: Fish & Chips\n"), "{canonical}");
}
