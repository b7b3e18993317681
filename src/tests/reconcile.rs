use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use super::*;
use crate::config::Config;
use crate::provider::DnsAppState;
use crate::reconcile::{pass_interval, sweep, ApplySummary, Reconciler, StateFile};
use tokio::time::Duration;

fn write_config(dir: &Path, apps: &str) -> Config {
    let path = dir.join("config.yaml");
    fs::write(&path, format!("dns_apps:\n{}", apps)).unwrap();
    Config::load(&path).unwrap()
}

const WEBSITE: &str = r#"
  website:
    name: "foo-website"
    description: "some description"
    fallback_cname: "fallback.foo.com"
    app_data: "// some source"
"#;

const WEBSITE_CHANGED: &str = r#"
  website:
    name: "foo-website"
    description: "some description"
    fallback_cname: "fallback.foo.com"
    app_data: "// some source foo"
"#;

const WEBSITE_PADDED: &str = r#"
  website:
    name: "foo-website"
    description: "some description"
    fallback_cname: "fallback.foo.com"
    app_data: "  // some source\n"
"#;

#[tokio::test]
async fn test_apply_creates_then_is_idempotent() {
    let (server, fake) = FakeItm::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), WEBSITE);
    let state_file = config.state_file.clone();
    let reconciler = Reconciler::new(config, Arc::new(test_client(&server)));

    let summary = reconciler.apply().await.unwrap();
    assert_eq!(
        summary,
        ApplySummary {
            created: 1,
            ..Default::default()
        }
    );

    let state = StateFile::load(&state_file).unwrap();
    let website = &state.dns_apps["website"];
    assert_eq!(website.id, "1");
    assert_eq!(website.args.name, "foo-website");

    let summary = reconciler.apply().await.unwrap();
    assert_eq!(summary.unchanged, 1);
    assert_eq!(fake.calls("POST"), 1);
    assert_eq!(fake.calls("PUT"), 0);
}

#[tokio::test]
async fn test_apply_updates_changed_app_data() {
    let (server, fake) = FakeItm::start().await;
    let dir = TempDir::new().unwrap();
    let client = Arc::new(test_client(&server));

    Reconciler::new(write_config(dir.path(), WEBSITE), client.clone())
        .apply()
        .await
        .unwrap();

    let summary = Reconciler::new(write_config(dir.path(), WEBSITE_CHANGED), client.clone())
        .apply()
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(fake.calls("PUT"), 1);
    assert_eq!(fake.app(1).unwrap()["appData"], "// some source foo");

    let summary = Reconciler::new(write_config(dir.path(), WEBSITE_PADDED), client)
        .apply()
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(fake.calls("PUT"), 2);
}

#[tokio::test]
async fn test_apply_ignores_whitespace_only_changes() {
    let (server, fake) = FakeItm::start().await;
    let dir = TempDir::new().unwrap();
    let client = Arc::new(test_client(&server));

    Reconciler::new(write_config(dir.path(), WEBSITE), client.clone())
        .apply()
        .await
        .unwrap();
    let summary = Reconciler::new(write_config(dir.path(), WEBSITE_PADDED), client)
        .apply()
        .await
        .unwrap();

    assert_eq!(summary.unchanged, 1);
    assert_eq!(fake.calls("PUT"), 0);
}

#[tokio::test]
async fn test_apply_recreates_disabled_app() {
    let (server, fake) = FakeItm::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), WEBSITE);
    let state_file = config.state_file.clone();
    let reconciler = Reconciler::new(config, Arc::new(test_client(&server)));

    reconciler.apply().await.unwrap();
    fake.set_enabled(1, false);

    let summary = reconciler.apply().await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(fake.calls("POST"), 2);

    let state = StateFile::load(&state_file).unwrap();
    assert_eq!(state.dns_apps["website"].id, "2");
}

#[tokio::test]
async fn test_apply_deletes_unconfigured_apps() {
    let (server, fake) = FakeItm::start().await;
    let dir = TempDir::new().unwrap();
    let client = Arc::new(test_client(&server));

    Reconciler::new(write_config(dir.path(), WEBSITE), client.clone())
        .apply()
        .await
        .unwrap();

    let config = write_config(dir.path(), " {}\n");
    let state_file = config.state_file.clone();
    let summary = Reconciler::new(config, client).apply().await.unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(fake.app(1).unwrap()["enabled"], false);
    assert!(StateFile::load(&state_file).unwrap().dns_apps.is_empty());
}

#[tokio::test]
async fn test_apply_imports_existing_app() {
    let (server, fake) = FakeItm::start().await;
    let id = fake.seed("foo-website", true);
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        &format!("{}    import_id: \"{}\"\n", WEBSITE, id),
    );
    let reconciler = Reconciler::new(config, Arc::new(test_client(&server)));

    let summary = reconciler.apply().await.unwrap();
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(fake.calls("POST"), 0);
}

#[tokio::test]
async fn test_apply_keeps_state_when_a_step_fails() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/1", DNS_APPS_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_json(1, "foo-website", true)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), WEBSITE_CHANGED);
    let state_file = config.state_file.clone();
    let mut state = StateFile::default();
    state
        .dns_apps
        .insert("website".to_string(), DnsAppState::with_id("1"));
    state.save(&state_file).unwrap();

    let err = Reconciler::new(config, Arc::new(test_client(&server)))
        .apply()
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("500"));

    let state = StateFile::load(&state_file).unwrap();
    assert_eq!(state.dns_apps["website"].id, "1");
}

#[tokio::test]
async fn test_apply_tracks_created_app_when_read_back_fails() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(app_json(1, "foo-website", true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), WEBSITE);
    let state_file = config.state_file.clone();
    let reconciler = Reconciler::new(config, Arc::new(test_client(&server)));

    assert!(reconciler.apply().await.is_err());
    let state = StateFile::load(&state_file).unwrap();
    assert_eq!(state.dns_apps["website"].id, "1");

    // The next pass reads the tracked app instead of creating another one.
    assert!(reconciler.apply().await.is_err());
    let state = StateFile::load(&state_file).unwrap();
    assert_eq!(state.dns_apps["website"].id, "1");
}

#[tokio::test]
async fn test_unchanged_app_is_read_once() {
    let (server, fake) = FakeItm::start().await;
    let dir = TempDir::new().unwrap();
    let reconciler = Reconciler::new(
        write_config(dir.path(), WEBSITE),
        Arc::new(test_client(&server)),
    );

    reconciler.apply().await.unwrap();
    let gets = fake.calls("GET");
    reconciler.apply().await.unwrap();
    assert_eq!(fake.calls("GET"), gets + 1);
}

#[test]
fn test_pass_interval_saturates() {
    assert_eq!(pass_interval(5), Duration::from_secs(300));
    assert_eq!(pass_interval(u64::MAX), Duration::from_secs(u64::MAX));
}

#[tokio::test]
async fn test_sweep_disables_prefixed_apps() {
    let (server, fake) = FakeItm::start().await;
    let foo = fake.seed("foo-one", true);
    let bar = fake.seed("bar-two", true);
    let old = fake.seed("foo-old", false);
    let client = test_client(&server);

    let swept = sweep(&client, "foo-").await.unwrap();

    assert_eq!(swept, 1);
    assert_eq!(fake.app(foo).unwrap()["enabled"], false);
    assert_eq!(fake.app(bar).unwrap()["enabled"], true);
    assert_eq!(fake.app(old).unwrap()["enabled"], false);
    assert_eq!(fake.calls("DELETE"), 1);

    assert!(sweep(&client, "").await.is_err());
}
