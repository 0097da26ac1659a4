//! In-memory collaborators for unit tests

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::{ApiManager, DeviceInfo, HttpClient, PairStore};
use crate::config::AddonConfig;
use crate::error::ApiError;
use crate::host::{ConnectionState, EpgEventState, PvrHost};
use crate::models::EpgEntry;

pub const PAIRING_OK: &str = r#"{"status":1,"deviceId":42,"password":"devpass"}"#;
pub const LOGIN_OK: &str = r#"{"status":1,"PHPSESSID":"sess1"}"#;
pub const STATUS_OK: &str = r#"{"status":1}"#;

/// API function name of a request URL (`.../api/<function>?...`)
pub fn function_name(url: &str) -> &str {
    url.split("/api/")
        .nth(1)
        .and_then(|rest| rest.split('?').next())
        .unwrap_or("")
}

/// Decoded query parameter of a request URL
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Canned responses per API function. The last response of a sequence
/// repeats; unknown functions fail like an unreachable server.
#[derive(Default)]
pub struct MockHttp {
    routes: Mutex<HashMap<String, Vec<Result<String, ApiError>>>>,
    calls: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, function: &str, body: &str) {
        self.respond_seq(function, &[body]);
    }

    pub fn respond_seq(&self, function: &str, bodies: &[&str]) {
        let responses = bodies.iter().map(|b| Ok(b.to_string())).collect();
        self.routes.lock().unwrap().insert(function.to_string(), responses);
    }

    pub fn fail(&self, function: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(function.to_string(), vec![Err(ApiError::Transport("connection refused".to_string()))]);
    }

    /// URLs requested for `function`, in order
    pub fn calls(&self, function: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| function_name(url) == function)
            .cloned()
            .collect()
    }

    pub fn count(&self, function: &str) -> usize {
        self.calls(function).len()
    }
}

impl HttpClient for MockHttp {
    fn get(&self, url: &str) -> Result<String, ApiError> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(function_name(url)) {
            Some(responses) if responses.len() > 1 => responses.remove(0),
            Some(responses) if !responses.is_empty() => responses[0].clone(),
            _ => Err(ApiError::Transport(format!("no route for {}", url))),
        }
    }
}

#[derive(Default)]
pub struct MemoryPairStore {
    content: Mutex<Option<String>>,
    pub writes: AtomicUsize,
}

impl MemoryPairStore {
    pub fn with(content: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            content: Mutex::new(content.map(str::to_string)),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn content(&self) -> Option<String> {
        self.content.lock().unwrap().clone()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.content().unwrap_or_default()).unwrap_or_default()
    }
}

impl PairStore for MemoryPairStore {
    fn read(&self) -> Option<String> {
        self.content()
    }

    fn write(&self, content: &str) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.content.lock().unwrap() = Some(content.to_string());
        Ok(())
    }
}

pub struct FixedDevice;

impl DeviceInfo for FixedDevice {
    fn mac_address(&self) -> Option<String> {
        Some("001122334455".to_string())
    }

    fn host_name(&self) -> Option<String> {
        Some("kodi-box".to_string())
    }
}

/// Host recording every callback
#[derive(Default)]
pub struct RecordingHost {
    pub pin: Mutex<Option<String>>,
    pub pin_prompts: AtomicUsize,
    pub channels_changed: AtomicUsize,
    pub groups_changed: AtomicUsize,
    pub recordings_changed: AtomicUsize,
    pub timers_changed: AtomicUsize,
    pub connection: Mutex<Vec<ConnectionState>>,
    pub epg_events: Mutex<Vec<(i64, EpgEventState)>>,
    pub notifications: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_pin(pin: &str) -> Arc<Self> {
        let host = Self::default();
        *host.pin.lock().unwrap() = Some(pin.to_string());
        Arc::new(host)
    }

    pub fn events(&self, state: EpgEventState) -> Vec<i64> {
        self.epg_events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == state)
            .map(|(start, _)| *start)
            .collect()
    }
}

impl PvrHost for RecordingHost {
    fn prompt_pin(&self, _heading: &str) -> Option<String> {
        self.pin_prompts.fetch_add(1, Ordering::SeqCst);
        self.pin.lock().unwrap().clone()
    }

    fn connection_state_changed(&self, state: ConnectionState) {
        self.connection.lock().unwrap().push(state);
    }

    fn channels_changed(&self) {
        self.channels_changed.fetch_add(1, Ordering::SeqCst);
    }

    fn channel_groups_changed(&self) {
        self.groups_changed.fetch_add(1, Ordering::SeqCst);
    }

    fn recordings_changed(&self) {
        self.recordings_changed.fetch_add(1, Ordering::SeqCst);
    }

    fn timers_changed(&self) {
        self.timers_changed.fetch_add(1, Ordering::SeqCst);
    }

    fn epg_event(&self, entry: &EpgEntry, state: EpgEventState) {
        self.epg_events.lock().unwrap().push((entry.start_time, state));
    }

    fn notify(&self, message: &str) {
        self.notifications.lock().unwrap().push(message.to_string());
    }
}

pub fn test_config() -> AddonConfig {
    AddonConfig {
        user_name: "jan".to_string(),
        password: "secret".to_string(),
        poll_interval_ms: 5,
        login_retry_secs: 1,
        ..AddonConfig::default()
    }
}

pub fn test_api(config: &AddonConfig, http: &Arc<MockHttp>, pairs: &Arc<MemoryPairStore>) -> ApiManager {
    ApiManager::new(config, http.clone(), pairs.clone(), &FixedDevice)
}
