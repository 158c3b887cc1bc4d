//! Integration tests for the export flow against a mock researchmap server.
//!
//! The mock server runs on a tokio runtime; the blocking client is driven from
//! the plain test thread.

use researchmap_export::{
    Client, ClientConfig, Endpoint, Format, Listing, QueryParams, Snapshot, export,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PERMALINK: &str = "t_yamane";

// Field order matters: the server is dropped (and its expectations verified)
// before the runtime goes away.
struct Harness {
    server: MockServer,
    rt: Runtime,
}

impl Harness {
    fn start() -> Self {
        let rt = Runtime::new().expect("failed to build runtime");
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    fn mount(&self, endpoint: &str, response: ResponseTemplate) {
        self.rt.block_on(
            Mock::given(method("GET"))
                .and(path(format!("/{}/{}", PERMALINK, endpoint)))
                .respond_with(response)
                .expect(1)
                .mount(&self.server),
        );
    }

    fn mount_json(&self, endpoint: &str, body: Value) {
        self.mount(endpoint, ResponseTemplate::new(200).set_body_json(body));
    }

    fn client(&self) -> Client {
        Client::with_config(ClientConfig {
            url: self.server.uri(),
            permalink: PERMALINK.to_string(),
            verify: true,
        })
        .expect("client should build")
        .with_progress(false)
    }
}

fn items(n: usize, prefix: &str) -> Vec<Value> {
    (0..n).map(|i| json!({"id": format!("{prefix}-{i}")})).collect()
}

#[test]
fn test_export_writes_all_endpoints_in_order() {
    let h = Harness::start();
    h.mount_json("published_papers", json!({"items": items(3, "paper")}));
    h.mount_json("research_projects", json!({"items": []}));
    h.mount_json("awards", json!({"items": items(5, "award")}));

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("researchmap_data.json");
    let snapshot = export(&h.client(), &QueryParams::new(), &target).expect("export should succeed");

    assert_eq!(snapshot.published_papers.len(), 3);
    assert_eq!(snapshot.research_projects.len(), 0);
    assert_eq!(snapshot.awards.len(), 5);

    let text = std::fs::read_to_string(&target).unwrap();
    let on_disk: serde_json::Map<String, Value> = serde_json::from_str(&text).unwrap();
    let keys: Vec<_> = on_disk.keys().map(String::as_str).collect();
    assert_eq!(keys, ["published_papers", "research_projects", "awards"]);
    assert_eq!(on_disk["published_papers"].as_array().unwrap().len(), 3);
    assert_eq!(on_disk["research_projects"].as_array().unwrap().len(), 0);
    assert_eq!(on_disk["awards"].as_array().unwrap().len(), 5);
    assert_eq!(on_disk["awards"][4]["id"], "award-4");
}

#[test]
fn test_export_handles_every_envelope() {
    let h = Harness::start();
    h.mount_json(
        "published_papers",
        json!({"@context": "https://example.org", "@graph": [{"@type": "published_papers", "items": items(2, "p")}]}),
    );
    h.mount_json("research_projects", json!(items(4, "r")));
    h.mount_json("awards", json!({"message": "nothing here", "total_items": 0}));

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out.json");
    let snapshot = export(&h.client(), &QueryParams::new(), &target).unwrap();

    assert_eq!(snapshot.published_papers.len(), 2);
    assert_eq!(snapshot.research_projects.len(), 4);
    assert!(snapshot.awards.is_empty());
    assert!(target.exists());
}

#[test]
fn test_requests_carry_default_query() {
    let h = Harness::start();
    h.rt.block_on(
        Mock::given(method("GET"))
            .and(path(format!("/{}/awards", PERMALINK)))
            .and(query_param("format", "json"))
            .and(query_param("limit", "1000"))
            .and(query_param("start", "1"))
            .and(query_param("sort", "newest"))
            .and(query_param("from_date", "2000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2]})))
            .expect(1)
            .mount(&h.server),
    );

    let items = h
        .client()
        .fetch_items(Endpoint::Awards, &QueryParams::new())
        .unwrap();
    assert_eq!(items, vec![json!(1), json!(2)]);
}

#[test]
fn test_overrides_reach_the_server() {
    let h = Harness::start();
    h.rt.block_on(
        Mock::given(method("GET"))
            .and(path(format!("/{}/published_papers", PERMALINK)))
            .and(query_param("start", "5"))
            .and(query_param("limit", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 6}])))
            .expect(1)
            .mount(&h.server),
    );

    let overrides = QueryParams::new().with("start", 5);
    let items = h
        .client()
        .fetch_items(Endpoint::PublishedPapers, &overrides)
        .unwrap();
    assert_eq!(items.len(), 1);
}

#[test]
fn test_second_endpoint_failure_writes_nothing() {
    let h = Harness::start();
    h.mount_json("published_papers", json!({"items": items(3, "paper")}));
    h.mount(
        "research_projects",
        ResponseTemplate::new(500).set_body_string("internal error"),
    );

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("researchmap_data.json");
    let err = export(&h.client(), &QueryParams::new(), &target).unwrap_err();

    let chain = format!("{:#}", err);
    assert!(chain.contains("research_projects"), "{}", chain);
    assert!(chain.contains("HTTP 500"), "{}", chain);
    assert!(!target.exists(), "no partial snapshot may be written");
}

#[test]
fn test_failure_leaves_existing_file_untouched() {
    let h = Harness::start();
    h.mount_json("published_papers", json!({"items": []}));
    h.mount_json("research_projects", json!({"items": []}));
    h.mount(
        "awards",
        ResponseTemplate::new(200).set_body_string("{not json"),
    );

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("researchmap_data.json");
    std::fs::write(&target, "previous").unwrap();

    let err = export(&h.client(), &QueryParams::new(), &target).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to parse API JSON"));
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "previous");
}

#[test]
fn test_not_found_error_mentions_permalink() {
    let h = Harness::start();
    h.mount(
        "published_papers",
        ResponseTemplate::new(404)
            .set_body_json(json!({"error": "not_found", "error_description": "no such researcher"})),
    );

    let err = h
        .client()
        .fetch_items(Endpoint::PublishedPapers, &QueryParams::new())
        .unwrap_err();
    let chain = format!("{:#}", err);
    assert!(chain.contains("HTTP 404"), "{}", chain);
    assert!(chain.contains("permalink"), "{}", chain);
    assert!(chain.contains("no such researcher"), "{}", chain);
}

#[test]
fn test_invalid_utf8_body_is_an_error() {
    let h = Harness::start();
    h.mount(
        "awards",
        ResponseTemplate::new(200).set_body_bytes(vec![b'[', 0xff, 0xfe, b']']),
    );

    let err = h
        .client()
        .fetch_items(Endpoint::Awards, &QueryParams::new())
        .unwrap_err();
    assert!(format!("{:#}", err).contains("UTF-8"));
}

#[test]
fn test_transport_error_aborts_before_writing() {
    // Nothing listens on port 1.
    let client = Client::with_config(ClientConfig {
        url: "http://127.0.0.1:1".to_string(),
        permalink: PERMALINK.to_string(),
        verify: true,
    })
    .unwrap()
    .with_progress(false);

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("researchmap_data.json");
    let err = export(&client, &QueryParams::new(), &target).unwrap_err();

    assert!(format!("{:#}", err).contains("could not connect"));
    assert!(!target.exists());
}

#[test]
fn test_snapshot_round_trip_preserves_non_ascii() {
    let h = Harness::start();
    let paper = json!({
        "paper_title": {"ja": "深層学習による橋梁損傷の検出", "en": "Bridge damage detection"},
        "authors": {"ja": [{"name": "山根 達郎"}]},
        "publication_date": "2023-04-01"
    });
    h.mount_json("published_papers", json!({"@graph": [{"items": [paper.clone()]}]}));
    h.mount_json("research_projects", json!({"items": []}));
    h.mount_json("awards", json!({"items": [{"award_name": {"ja": "優秀論文賞"}}]}));

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("researchmap_data.json");
    let snapshot = export(&h.client(), &QueryParams::new(), &target).unwrap();

    let text = std::fs::read_to_string(&target).unwrap();
    assert!(text.contains("深層学習による橋梁損傷の検出"));
    assert!(text.contains("優秀論文賞"));
    assert!(!text.contains("\\u"));

    let back: Snapshot = serde_json::from_str(&text).unwrap();
    assert_eq!(back, snapshot);
    assert_eq!(back.published_papers[0], paper);
}

#[test]
fn test_saved_snapshot_renders_listing() {
    let h = Harness::start();
    h.mount_json(
        "published_papers",
        json!({"items": [
            {"paper_title": {"ja": "古い論文"}, "publication_date": "2015-01-01"},
            {"paper_title": {"ja": "新しい論文"}, "publication_date": "2024-02-01", "major_achievement": true}
        ]}),
    );
    h.mount_json("research_projects", json!({"items": []}));
    h.mount_json("awards", json!({"items": [{"award_name": {"en": "Best Paper"}, "award_date": "2022-09"}]}));

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("researchmap_data.json");
    export(&h.client(), &QueryParams::new(), &target).unwrap();

    let listing = Listing::from_snapshot(&Snapshot::load(&target).unwrap());
    assert_eq!(listing.selected.len(), 1);
    assert_eq!(listing.selected[0].title, "新しい論文");
    assert_eq!(listing.recent[1].title, "古い論文");

    let html = listing.render(Format::Html);
    assert!(html.contains("<strong>Best Paper</strong>"));
    assert!(html.contains("2022-09"));
}
