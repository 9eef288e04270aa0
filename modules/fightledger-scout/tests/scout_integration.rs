//! End-to-end runs against a scripted transport.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use espn_client::testing::{profile_link, search_body, MockTransport};
use espn_client::{ClientConfig, EspnClient, RetryPolicy};
use fightledger_common::{DataLayout, DatasetKind, RunMode};
use fightledger_scout::{Scout, ScoutOptions};
use serde_json::json;

const ROSTER: [(&str, u32, &str); 3] = [
    ("Alpha", 1, "Xavier"),
    ("Bravo", 2, "Yusuf"),
    ("Charlie", 3, "Zane"),
];

fn stats_page(division: &str, opponent: &str) -> String {
    let portal = json!({
        "plyrHdr": {
            "ath": { "wghtclss": division, "stnc": "Southpaw" },
            "statsBlck": { "vals": [{ "name": "Wins-Losses-Draws", "val": "9-1-0" }] }
        }
    });
    let cells = [
        "Mar 1, 2025", opponent, "UFC 313", "W", "4/9", "20/50", "3/3", "40", "80", "27", "62",
        "13-18", "1", "15%", "74%", "11%",
    ];
    let row: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
    format!(
        "<html><head><script>window.data={{\"prtlCmnApiRsp\":{portal}}};</script></head>\
         <body><div class=\"Table__Title\">striking</div>\
         <table><thead><tr><th>Date</th></tr></thead><tbody><tr>{row}</tr></tbody></table>\
         </body></html>"
    )
}

fn mock() -> MockTransport {
    let mut mock = MockTransport::new().route_ok("query=Unknown", r#"{"results": []}"#);
    for (name, id, opponent) in ROSTER {
        let slug = name.to_ascii_lowercase();
        mock = mock
            .route_ok(
                format!("query={name}"),
                search_body(name, "mma", &profile_link(id, &slug)),
            )
            .route_ok(format!("/stats/_/id/{id}/"), stats_page("Lightweight", opponent));
    }
    mock
}

fn scout(layout: &DataLayout, transport: Arc<MockTransport>, chunk_size: usize) -> Scout {
    let config = ClientConfig {
        requests_per_minute: 1000,
        worker_spacing: Duration::ZERO,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            jitter: Duration::ZERO,
        },
        ..ClientConfig::default()
    };
    let options = ScoutOptions {
        chunk_size,
        workers: 3,
        chunk_pause_min: Duration::ZERO,
        chunk_pause_max: Duration::ZERO,
        dry_run: false,
    };
    Scout::with_client(EspnClient::with_transport(config, transport), layout, options).unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn workspace() -> (tempfile::TempDir, DataLayout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    layout.ensure().unwrap();
    (dir, layout)
}

#[tokio::test]
async fn unknown_fighter_fails_alone() {
    let (_dir, layout) = workspace();
    let transport = Arc::new(mock());
    let scout = scout(&layout, transport.clone(), 50);

    let summary = scout
        .run(&names(&["Alpha", "Unknown Person", "Bravo"]), RunMode::Full)
        .await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failing_entities, vec!["Unknown Person"]);
    assert_eq!(summary.documents_written, 2);
    assert_eq!(transport.count_matching("query=Unknown"), 1);

    let striking = summary
        .datasets
        .iter()
        .find(|r| r.kind == DatasetKind::Striking)
        .unwrap();
    assert_eq!(striking.rows_after, 2);
    assert!(striking.written);
}

#[tokio::test]
async fn chunk_order_does_not_change_datasets() {
    let (_a, first) = workspace();
    let (_b, second) = workspace();

    scout(&first, Arc::new(mock()), 1)
        .run(&names(&["Alpha", "Bravo", "Charlie"]), RunMode::Full)
        .await;
    scout(&second, Arc::new(mock()), 2)
        .run(&names(&["Charlie", "Alpha", "Bravo"]), RunMode::Full)
        .await;

    for kind in [DatasetKind::Profiles, DatasetKind::Striking] {
        let a = std::fs::read(first.dataset_path(kind)).unwrap();
        let b = std::fs::read(second.dataset_path(kind)).unwrap();
        assert_eq!(a, b, "{kind} differs between chunk orders");
    }
}

#[tokio::test]
async fn incremental_run_reuses_stored_documents() {
    let (_dir, layout) = workspace();
    scout(&layout, Arc::new(mock()), 50)
        .run(&names(&["Alpha", "Bravo"]), RunMode::Full)
        .await;
    let before = std::fs::read(layout.dataset_path(DatasetKind::Striking)).unwrap();

    let offline = Arc::new(MockTransport::new());
    let summary = scout(&layout, offline.clone(), 50)
        .run(&names(&["Alpha", "Bravo"]), RunMode::Incremental)
        .await;

    assert!(offline.requests().is_empty());
    assert_eq!((summary.succeeded, summary.cached, summary.failed), (2, 2, 0));
    assert!(summary.datasets.iter().all(|r| !r.written));
    assert_eq!(std::fs::read(layout.dataset_path(DatasetKind::Striking)).unwrap(), before);
}

#[tokio::test]
async fn full_refetch_of_same_page_is_unchanged() {
    let (_dir, layout) = workspace();
    scout(&layout, Arc::new(mock()), 50)
        .run(&names(&["Alpha"]), RunMode::Full)
        .await;

    let transport = Arc::new(mock());
    let summary = scout(&layout, transport.clone(), 50)
        .run(&names(&["Alpha"]), RunMode::Full)
        .await;

    assert_eq!(transport.requests().len(), 2);
    assert_eq!(summary.documents_written, 0);
    assert_eq!(summary.documents_unchanged, 1);
}

#[tokio::test]
async fn earlier_documents_stay_in_datasets() {
    let (_dir, layout) = workspace();
    scout(&layout, Arc::new(mock()), 50)
        .run(&names(&["Alpha"]), RunMode::Full)
        .await;

    let summary = scout(&layout, Arc::new(mock()), 50)
        .run(&names(&["Bravo"]), RunMode::Full)
        .await;

    let profiles = summary
        .datasets
        .iter()
        .find(|r| r.kind == DatasetKind::Profiles)
        .unwrap();
    assert_eq!((profiles.rows_before, profiles.rows_after), (1, 2));
}

#[tokio::test]
async fn page_without_profile_block_fails_entity_but_keeps_events() {
    let (_dir, layout) = workspace();
    let page = stats_page("Lightweight", "Xavier").replace("prtlCmnApiRsp", "somethingElse");
    let transport = Arc::new(
        MockTransport::new()
            .route_ok("query=Alpha", search_body("Alpha", "mma", &profile_link(1, "alpha")))
            .route_ok("/stats/_/id/1/", page),
    );

    let summary = scout(&layout, transport, 50)
        .run(&names(&["Alpha"]), RunMode::Full)
        .await;

    assert_eq!((summary.succeeded, summary.failed), (0, 1));
    assert_eq!(summary.failing_entities, vec!["Alpha"]);
    assert_eq!(summary.parse_failures, 1);
    assert!(summary.to_string().contains("Alpha"));
    let report = |kind: DatasetKind| summary.datasets.iter().find(|r| r.kind == kind).unwrap();
    assert_eq!(report(DatasetKind::Profiles).rows_after, 0);
    assert_eq!(report(DatasetKind::Striking).rows_after, 1);
}

#[tokio::test]
async fn accented_namesakes_are_fetched_separately() {
    let (_dir, layout) = workspace();
    let transport = Arc::new(
        MockTransport::new()
            .route_ok("query=Jos%C3%A9", search_body("José Aldo", "mma", &profile_link(11, "jose-aldo")))
            .route_ok("query=Jos%C3%A8", search_body("Josè Aldo", "mma", &profile_link(12, "jose-aldo")))
            .route_ok("/stats/_/id/11/", stats_page("Bantamweight", "Xavier"))
            .route_ok("/stats/_/id/12/", stats_page("Featherweight", "Yusuf")),
    );

    scout(&layout, transport.clone(), 50)
        .run(&names(&["José Aldo"]), RunMode::Full)
        .await;
    let summary = scout(&layout, transport.clone(), 50)
        .run(&names(&["Josè Aldo"]), RunMode::Incremental)
        .await;

    assert_eq!((summary.succeeded, summary.cached), (1, 0));
    assert_eq!(transport.count_matching("query=Jos%C3%A8"), 1);
    assert_eq!(summary.documents_written, 1);
    let profiles = summary
        .datasets
        .iter()
        .find(|r| r.kind == DatasetKind::Profiles)
        .unwrap();
    assert_eq!((profiles.rows_before, profiles.rows_after), (1, 2));
}

#[tokio::test]
async fn cancelled_run_skips_fetching() {
    let (_dir, layout) = workspace();
    let transport = Arc::new(mock());
    let scout = scout(&layout, transport.clone(), 1);
    scout.cancel_handle().store(true, Ordering::SeqCst);

    let summary = scout.run(&names(&["Alpha", "Bravo"]), RunMode::Full).await;

    assert!(summary.cancelled);
    assert_eq!(summary.succeeded + summary.failed, 0);
    assert!(transport.requests().is_empty());
    assert_eq!(summary.datasets.len(), 4);
}

#[tokio::test]
async fn dry_run_leaves_datasets_absent() {
    let (_dir, layout) = workspace();
    let config = ClientConfig {
        worker_spacing: Duration::ZERO,
        ..ClientConfig::default()
    };
    let options = ScoutOptions {
        dry_run: true,
        chunk_pause_min: Duration::ZERO,
        chunk_pause_max: Duration::ZERO,
        ..ScoutOptions::default()
    };
    let client = EspnClient::with_transport(config, Arc::new(mock()));
    let scout = Scout::with_client(client, &layout, options).unwrap();

    let summary = scout.run(&names(&["Alpha"]), RunMode::Full).await;

    assert_eq!(summary.documents_written, 1);
    assert!(summary.datasets.iter().all(|r| !r.written));
    assert!(!layout.dataset_path(DatasetKind::Striking).exists());
    assert!(scout.archive().exists("Alpha"));
}
