//! Integration tests for the pipeline → cache → query path.
//!
//! Repositories are served by `MemoryProvider` fixtures; nothing here
//! touches the network.

use chrono::{DateTime, TimeZone, Utc};
use plughub_core::provider::MemoryProvider;
use plughub_core::{
    CancellationToken, Catalog, CatalogRecord, ClientRegistry, EntryError, FilterOptions,
    PlughubError, SortBy,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const OWNER: &str = "AvengeMedia";
const REGISTRY: &str = "dms-plugin-registry";

struct Fixture {
    github: Arc<MemoryProvider>,
    codeberg: Arc<MemoryProvider>,
    catalog: Catalog,
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, d, 8, 0, 0).unwrap()
}

fn fixture() -> Fixture {
    let github = Arc::new(MemoryProvider::new("github.com"));
    let codeberg = Arc::new(MemoryProvider::new("codeberg.org"));
    let clients = Arc::new(ClientRegistry::default());
    clients.register("github.com", github.clone());
    clients.register("codeberg.org", codeberg.clone());

    let catalog = Catalog::builder().client_registry(clients).concurrency(3).build();
    Fixture {
        github,
        codeberg,
        catalog,
    }
}

/// Registry entry plus a valid `plugin.json` in the plugin's own repository.
fn publish_plugin(
    registry: &MemoryProvider,
    (host, provider): (&str, &MemoryProvider),
    id: &str,
    name: &str,
    compositors: &[&str],
    updated: DateTime<Utc>,
) {
    registry.add_json(
        OWNER,
        REGISTRY,
        &format!("plugins/{}.json", id),
        &json!({
            "id": id,
            "name": name,
            "repo": format!("https://{}/dev/{}", host, id),
            "author": "curator",
            "category": "widgets",
            "capabilities": ["dankbar-widget"],
            "compositors": compositors,
        }),
    );
    provider.add_json("dev", id, "plugin.json", &json!({"version": "1.0.0"}));
    provider.set_commit("dev", id, "", updated);
}

fn populated() -> Fixture {
    let f = fixture();
    let github = ("github.com", f.github.as_ref());
    let codeberg = ("codeberg.org", f.codeberg.as_ref());
    publish_plugin(&f.github, github, "alpha", "Alpha", &["niri"], day(1));
    publish_plugin(&f.github, github, "bravo", "Bravo", &["hyprland"], day(4));
    publish_plugin(&f.github, codeberg, "charlie", "Charlie", &["any"], day(3));
    publish_plugin(&f.github, github, "delta", "Delta", &["niri", "hyprland"], day(2));
    f.github.add_json(
        OWNER,
        REGISTRY,
        "themes/nord/theme.json",
        &json!({"id": "nord", "name": "Nord", "version": "1.0.0"}),
    );
    f.github.set_commit(OWNER, REGISTRY, "themes/nord", day(5));
    f
}

#[tokio::test]
async fn test_invalid_repo_url_drops_only_that_entry() {
    let f = populated();
    f.github.add_json(
        OWNER,
        REGISTRY,
        "plugins/echo.json",
        &json!({"id": "echo", "name": "Echo", "repo": "https://github.com/just-an-owner"}),
    );

    f.catalog.initialize(&CancellationToken::new()).await.unwrap();

    let snapshot = f.catalog.plugins().read();
    assert_eq!(snapshot.len(), 4);
    assert!(snapshot.records().iter().all(|p| p.id != "echo"));
    assert!(snapshot.records().iter().all(|p| p.missing_field().is_none()));
    assert_eq!(snapshot.skipped().len(), 1);
    assert_eq!(snapshot.skipped()[0].entry, "echo");
}

#[tokio::test]
async fn test_alternate_host_is_enriched() {
    let f = populated();
    f.catalog.initialize(&CancellationToken::new()).await.unwrap();

    let snapshot = f.catalog.plugins().read();
    let charlie = snapshot.records().iter().find(|p| p.id == "charlie").unwrap();
    assert_eq!(charlie.updated_at, day(3));
    assert!(f.codeberg.request_count() >= 2);
}

#[tokio::test]
async fn test_failed_listing_keeps_last_update() {
    let f = populated();
    let cancel = CancellationToken::new();
    f.catalog.initialize(&cancel).await.unwrap();
    let last_update = f.catalog.plugins().last_update();
    assert!(last_update.is_some());

    f.github.set_unavailable(true);
    let err = f.catalog.plugins().refresh(&cancel).await.unwrap_err();
    assert!(matches!(err, PlughubError::SourceUnavailable { .. }));
    assert_eq!(f.catalog.plugins().last_update(), last_update);
    assert_eq!(f.catalog.plugins().read().len(), 4);
}

#[tokio::test]
async fn test_broken_upstream_repo_is_skipped_next_cycle() {
    let f = populated();
    let cancel = CancellationToken::new();
    f.catalog.initialize(&cancel).await.unwrap();

    f.codeberg.set_unavailable(true);
    f.catalog.plugins().refresh(&cancel).await.unwrap();

    let snapshot = f.catalog.plugins().read();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.skipped()[0].entry, "charlie");
}

#[tokio::test]
async fn test_compositor_filter_and_sorts() {
    let f = populated();
    f.catalog.initialize(&CancellationToken::new()).await.unwrap();
    let plugins = f.catalog.plugins();

    let hyprland = FilterOptions {
        compositor: "hyprland".into(),
        ..Default::default()
    };
    let ids: Vec<String> = plugins
        .list_plugins(&hyprland, SortBy::Name)
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec!["bravo", "charlie", "delta"]);

    let by_update = plugins.list_plugins(&FilterOptions::default(), SortBy::UpdatedAt);
    let ids: Vec<&str> = by_update.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["bravo", "charlie", "delta", "alpha"]);

    let random = plugins.list_plugins(&FilterOptions::default(), SortBy::Random);
    assert_eq!(random.len(), 4);

    let themes = f.catalog.themes().list_sorted(SortBy::default());
    assert_eq!(themes.len(), 1);
    assert_eq!(themes[0].updated_at, day(5));
}

#[tokio::test]
async fn test_manifest_author_overrides_registry() {
    let f = populated();
    f.github.add_json(
        "dev",
        "alpha",
        "plugin.json",
        &json!({"version": "1.1.0", "author": "Alice"}),
    );
    f.catalog.initialize(&CancellationToken::new()).await.unwrap();

    let snapshot = f.catalog.plugins().read();
    let author = |id: &str| {
        snapshot
            .records()
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.author.clone())
            .unwrap()
    };
    assert_eq!(author("alpha"), "Alice");
    assert_eq!(author("bravo"), "curator");
}

#[tokio::test]
async fn test_missing_manifest_reason_is_reported() {
    let f = populated();
    f.github.remove_file("dev", "bravo", "plugin.json");
    f.github.add_file("dev", "bravo", "README.md", "moved");
    f.catalog.initialize(&CancellationToken::new()).await.unwrap();

    let report = f.catalog.plugins().read();
    assert_eq!(report.len(), 3);
    assert_eq!(report.skipped()[0].entry, "bravo");
    assert!(report.skipped()[0].reason.contains("plugin.json"));
}

#[tokio::test]
async fn test_pipeline_report_exposes_entry_errors() {
    let f = populated();
    f.github.add_json(
        OWNER,
        REGISTRY,
        "plugins/gitlab.json",
        &json!({"id": "gitlab", "name": "GitLab", "repo": "https://gitlab.com/dev/gitlab"}),
    );

    let pipeline = plughub_core::EnrichmentPipeline::new(f.catalog.clients().clone());
    let report = pipeline.fetch_plugins(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.records.len(), 4);
    assert!(matches!(
        report.skipped[0].reason,
        EntryError::UnsupportedHost { ref host } if host == "gitlab.com"
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readers_unblocked_and_cancel_aborts_slow_refresh() {
    let f = populated();
    f.catalog.initialize(&CancellationToken::new()).await.unwrap();
    let before = f.catalog.plugins().read();
    let last_update = f.catalog.plugins().last_update();

    f.github.set_latency(Duration::from_millis(300));
    let cancel = CancellationToken::new();
    let refresh = {
        let plugins = f.catalog.plugins().clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { plugins.refresh(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!refresh.is_finished());

    let started = Instant::now();
    let during = f.catalog.plugins().read();
    assert!(started.elapsed() < Duration::from_millis(50));
    assert!(Arc::ptr_eq(&before, &during));

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_millis(100), refresh)
        .await
        .expect("refresh should stop promptly once cancelled")
        .unwrap();
    assert!(matches!(result, Err(PlughubError::Cancelled)));

    assert!(Arc::ptr_eq(&before, &f.catalog.plugins().read()));
    assert_eq!(f.catalog.plugins().last_update(), last_update);
}
