mod reconcile;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::api::ItmClient;
use crate::config::ProviderConfig;

pub(crate) const TEST_TOKEN: &str = "test-token";
pub(crate) const DNS_APPS_PATH: &str = "/api/v2/config/applications/dns.json";
pub(crate) const CNAME_PATTERN: &str = r"^\d-\d{2}-[0-9a-z]{4}-[0-9a-z]{4}\.cdx\.cedexis\.net$";

pub(crate) fn token_mock() -> Mock {
    Mock::given(method("POST"))
        .and(path("/api/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TEST_TOKEN,
            "token_type": "bearer",
            "expires_in": 3600,
        })))
}

pub(crate) async fn mount_token_endpoint(server: &MockServer) {
    token_mock().mount(server).await;
}

pub(crate) fn test_client(server: &MockServer) -> ItmClient {
    ProviderConfig::new("some id", "some secret", &format!("{}/api", server.uri()))
        .unwrap()
        .client()
        .unwrap()
}

pub(crate) fn app_json(id: u64, name: &str, enabled: bool) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": "some description",
        "enabled": enabled,
        "fallbackCname": "fallback.foo.com",
        "ttl": 20,
        "appData": "// some source",
        "cname": "2-01-abcd-0123.cdx.cedexis.net",
        "version": 1,
    })
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    apps: BTreeMap<u64, Value>,
    calls: Vec<String>,
}

/// In-memory stand-in for the DNS apps endpoints. Like the real API, a
/// delete only clears `enabled`.
#[derive(Clone, Default)]
pub(crate) struct FakeItm {
    state: Arc<Mutex<FakeState>>,
}

impl FakeItm {
    pub(crate) async fn start() -> (MockServer, FakeItm) {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        let fake = FakeItm::default();
        Mock::given(path_regex(r"^/api/v2/config/applications/dns\.json(/\d+)?$"))
            .respond_with(fake.clone())
            .mount(&server)
            .await;
        (server, fake)
    }

    /// Number of requests seen with the given HTTP verb.
    pub(crate) fn calls(&self, verb: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.iter().filter(|call| call.as_str() == verb).count()
    }

    pub(crate) fn app(&self, id: u64) -> Option<Value> {
        self.state.lock().unwrap().apps.get(&id).cloned()
    }

    pub(crate) fn seed(&self, name: &str, enabled: bool) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let mut app = app_json(id, name, enabled);
        app["cname"] = json!(fake_cname(id));
        state.apps.insert(id, app);
        id
    }

    pub(crate) fn set_enabled(&self, id: u64, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(app) = state.apps.get_mut(&id) {
            app["enabled"] = json!(enabled);
        }
    }
}

fn fake_cname(id: u64) -> String {
    format!("2-01-{:04x}-0a1b.cdx.cedexis.net", id)
}

impl Respond for FakeItm {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let verb = request.method.as_str().to_string();
        state.calls.push(verb.clone());

        let expected_auth = format!("Bearer {}", TEST_TOKEN);
        let auth = request
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok());
        if auth != Some(expected_auth.as_str()) {
            return ResponseTemplate::new(401);
        }

        let id = request
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|segment| segment.parse::<u64>().ok());
        let published = request
            .url
            .query_pairs()
            .any(|(key, value)| key == "publish" && value == "true");

        match (verb.as_str(), id) {
            ("GET", None) => {
                let apps: Vec<Value> = state.apps.values().cloned().collect();
                ResponseTemplate::new(200).set_body_json(apps)
            }
            ("GET", Some(id)) => match state.apps.get(&id) {
                Some(app) => ResponseTemplate::new(200).set_body_json(app.clone()),
                None => ResponseTemplate::new(404),
            },
            ("POST", None) if published => {
                let mut app: Value = match serde_json::from_slice(&request.body) {
                    Ok(body) => body,
                    Err(_) => return ResponseTemplate::new(400),
                };
                state.next_id += 1;
                let id = state.next_id;
                app["id"] = json!(id);
                app["enabled"] = json!(true);
                app["cname"] = json!(fake_cname(id));
                app["version"] = json!(1);
                state.apps.insert(id, app.clone());
                ResponseTemplate::new(201).set_body_json(app)
            }
            ("PUT", Some(id)) if published => {
                let body: Value = match serde_json::from_slice(&request.body) {
                    Ok(body) => body,
                    Err(_) => return ResponseTemplate::new(400),
                };
                let Some(app) = state.apps.get_mut(&id) else {
                    return ResponseTemplate::new(404);
                };
                if let Some(fields) = body.as_object() {
                    for (key, value) in fields {
                        app[key.as_str()] = value.clone();
                    }
                }
                let version = app["version"].as_u64().unwrap_or(0) + 1;
                app["version"] = json!(version);
                ResponseTemplate::new(200).set_body_json(app.clone())
            }
            ("DELETE", Some(id)) => match state.apps.get_mut(&id) {
                Some(app) => {
                    app["enabled"] = json!(false);
                    ResponseTemplate::new(204)
                }
                None => ResponseTemplate::new(404),
            },
            _ => ResponseTemplate::new(400),
        }
    }
}
