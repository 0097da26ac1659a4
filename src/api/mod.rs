//! sledovanitv.cz / moderntv.eu API client
//!
//! Owns the device pairing, the login session and every remote call. All
//! calls are blocking; the background worker is the main caller, the host
//! threads only use the PIN, timer and stream lookups.

mod device;
mod pairing;
mod transport;

pub use device::{device_serial, DeviceInfo, SystemDeviceInfo};
pub use pairing::{FilePairStore, PairStore, PairingRecord, PAIR_FILE};
pub use transport::{build_query, url_encode, HttpClient, UreqClient};

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{AddonConfig, ServiceProvider, StreamQuality};
use crate::error::ApiError;

/// Client version reported on device login
const CLIENT_VERSION: &str = "2.6.21";
const DEVICE_TYPE: &str = "androidportable";

/// EPG request length in minutes for the small (1 hour) and large (1 day) step
const EPG_DURATION_SMALL: &str = "60";
const EPG_DURATION_LARGE: &str = "1439";

/// Query parameters of a single call, in order
pub type ApiParams = Vec<(&'static str, String)>;

/// Credentials obtained by pairing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCredentials {
    pub device_id: String,
    pub password: String,
}

impl DeviceCredentials {
    pub fn is_valid(&self) -> bool {
        !self.device_id.is_empty() && !self.password.is_empty()
    }

    pub fn clear(&mut self) {
        self.device_id.clear();
        self.password.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStream {
    pub url: String,
    /// Remote id of the recorded channel
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeshiftInfo {
    pub url: String,
    pub channel: String,
    pub duration: i64,
}

pub struct ApiManager {
    provider: ServiceProvider,
    user_name: String,
    user_password: String,
    product: String,
    serial: String,
    http: Arc<dyn HttpClient>,
    pair_store: Arc<dyn PairStore>,
    credentials: Mutex<DeviceCredentials>,
    /// Swapped as a whole on login/logout, readers clone the handle
    session_id: Mutex<Arc<str>>,
    pin_unlocked: AtomicBool,
}

impl ApiManager {
    pub fn new(
        config: &AddonConfig,
        http: Arc<dyn HttpClient>,
        pair_store: Arc<dyn PairStore>,
        device: &dyn DeviceInfo,
    ) -> Self {
        log::info!("Loading ApiManager");

        let product = if config.product_id.is_empty() {
            device.host_name().unwrap_or_default()
        } else {
            config.product_id.clone()
        };

        Self {
            provider: config.service_provider,
            user_name: config.user_name.clone(),
            user_password: config.password.clone(),
            product,
            serial: device_serial(&config.device_id, device),
            http,
            pair_store,
            credentials: Mutex::new(DeviceCredentials::default()),
            session_id: Mutex::new(Arc::from("")),
            pin_unlocked: AtomicBool::new(false),
        }
    }

    /// Manager talking to the real service, pairing stored in the user dir
    pub fn from_config(config: &AddonConfig) -> Self {
        Self::new(
            config,
            Arc::new(UreqClient::new(&config.user_agent)),
            Arc::new(FilePairStore::in_user_dir()),
            &SystemDeviceInfo,
        )
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn provider(&self) -> ServiceProvider {
        self.provider
    }

    fn session_id(&self) -> Arc<str> {
        self.session_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn publish_session(&self, session_id: &str) {
        *self.session_id.lock().unwrap_or_else(|e| e.into_inner()) = Arc::from(session_id);
    }

    fn lock_credentials(&self) -> MutexGuard<'_, DeviceCredentials> {
        self.credentials.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn credentials(&self) -> DeviceCredentials {
        self.lock_credentials().clone()
    }

    pub fn logged_in(&self) -> bool {
        !self.session_id().is_empty()
    }

    pub fn pin_unlocked(&self) -> bool {
        self.pin_unlocked.load(Ordering::SeqCst)
    }

    fn call(&self, url_path: &str, params: &[(&str, String)], put_session: bool) -> Result<String, ApiError> {
        let session = if put_session {
            let session_id = self.session_id();
            // authenticated call without a session, nothing to send
            if session_id.is_empty() {
                return Err(ApiError::NotLoggedIn);
            }
            Some(session_id)
        } else {
            None
        };

        let url = format!("{}?{}", url_path, build_query(params, session.as_deref()));
        let body = self.http.get(&url).inspect_err(|e| {
            log::error!("Cannot open url: {}", e);
        })?;

        if body.is_empty() {
            return Err(ApiError::Transport("Empty response".to_string()));
        }
        Ok(body)
    }

    fn api_call(&self, function: &str, params: &[(&str, String)], put_session: bool) -> Result<Value, ApiError> {
        log::debug!("API call {} - {} params", function, params.len());
        let url = format!("{}{}", self.provider.api_url(), function);
        let body = self.call(&url, params, put_session)?;
        check_response(&body)
    }

    fn delete_pairing(&self, record: &PairingRecord) -> bool {
        if record.device_id.is_empty() {
            // no previous pairing
            return true;
        }

        let params: ApiParams = vec![
            ("deviceId", record.device_id.clone()),
            ("password", record.password.clone()),
            ("unit", self.provider.unit().to_string()),
        ];

        match self.api_call("delete-pairing", &params, false) {
            Ok(_) => {}
            Err(e) if matches!(e.server_error(), Some("no device") | Some("not logged")) => {}
            Err(e) => {
                log::error!("Cannot delete previous pairing(deviceId:{}): {}", record.device_id, e);
                return false;
            }
        }

        log::info!("Previous pairing(deviceId:{}) deleted (or no such device)", record.device_id);
        true
    }

    fn pair_device(&self) -> Result<DeviceCredentials, ApiError> {
        let stored = self.pair_store.read().and_then(|content| PairingRecord::parse(&content));

        let reusable = stored
            .as_ref()
            .filter(|record| record.matches(&self.user_name, &self.serial))
            .cloned();

        let (mut record, new_pairing) = match reusable {
            Some(record) => {
                log::debug!("Reusing stored pairing");
                (record, false)
            }
            None => {
                if let Some(old) = &stored {
                    if !self.delete_pairing(old) {
                        return Err(ApiError::Pairing("Cannot delete previous pairing".to_string()));
                    }
                }

                let params: ApiParams = vec![
                    ("username", self.user_name.clone()),
                    ("password", self.user_password.clone()),
                    ("type", DEVICE_TYPE.to_string()),
                    ("serial", self.serial.clone()),
                    ("product", self.product.clone()),
                    ("unit", self.provider.unit().to_string()),
                    ("checkLimit", "1".to_string()),
                ];
                let root = self.api_call("create-pairing", &params, false).inspect_err(|_| {
                    log::error!("Error in pairing response.");
                })?;
                (serde_json::from_value::<PairingRecord>(root)?, true)
            }
        };

        let credentials = DeviceCredentials {
            device_id: record.device_id.clone(),
            password: record.password.clone(),
        };
        log::debug!("Device ID: {}", credentials.device_id);

        if !credentials.is_valid() {
            return Err(ApiError::Pairing("Pairing response without device credentials".to_string()));
        }

        if new_pairing {
            record.user_name = self.user_name.clone();
            record.serial = self.serial.clone();
            self.store_pairing(&record);
        }

        Ok(credentials)
    }

    fn store_pairing(&self, record: &PairingRecord) {
        match serde_json::to_string(record) {
            Ok(content) => {
                if let Err(e) = self.pair_store.write(&content) {
                    log::error!("Cannot write pairing file: {}", e);
                }
            }
            Err(e) => log::error!("Cannot serialize pairing: {}", e),
        }
    }

    /// Blank the owner of the stored pairing so the next login pairs again.
    /// The old device id is kept so it can be deleted remotely.
    fn invalidate_stored_pairing(&self) {
        let mut record = self
            .pair_store
            .read()
            .and_then(|content| PairingRecord::parse(&content))
            .unwrap_or_default();
        record.user_name.clear();
        self.store_pairing(&record);
    }

    /// Pair (if needed) and log in. On an explicit rejection the device
    /// credentials are dropped; when the server did not answer at all
    /// everything is kept for the next attempt.
    pub fn login(&self) -> Result<(), ApiError> {
        self.pin_unlocked.store(false, Ordering::SeqCst);

        let mut credentials = self.lock_credentials();
        if !credentials.is_valid() {
            *credentials = self.pair_device().inspect_err(|e| {
                log::error!("Cannot pair device: {}", e);
            })?;
        }

        let params: ApiParams = vec![
            ("deviceId", credentials.device_id.clone()),
            ("password", credentials.password.clone()),
            ("version", CLIENT_VERSION.to_string()),
            ("lang", "en".to_string()),
            ("unit", self.provider.unit().to_string()),
        ];

        let outcome = match self.api_call("device-login", &params, false) {
            Ok(root) => {
                let session_id = json_str(&root, "PHPSESSID");
                if session_id.is_empty() {
                    log::error!("Cannot perform device login");
                    Err(ApiError::Parse("Missing PHPSESSID in login response".to_string()))
                } else {
                    log::info!("Device logged in.");
                    log::debug!("Session ID: {}", session_id);
                    Ok(session_id)
                }
            }
            Err(e) if e.is_transport() => {
                log::info!("No login response. Is something wrong with network or remote servers?");
                return Err(e);
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(session_id) => {
                self.publish_session(&session_id);
                Ok(())
            }
            Err(e) => {
                credentials.clear();
                self.invalidate_stored_pairing();
                self.publish_session("");
                Err(e)
            }
        }
    }

    pub fn pin_unlock(&self, pin: &str) -> Result<(), ApiError> {
        let params: ApiParams = vec![("pin", pin.to_string())];
        self.api_call("pin-unlock", &params, true)?;
        self.pin_unlocked.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn keep_alive(&self) -> Result<(), ApiError> {
        self.api_call("keepalive", &[], true).map(|_| ())
    }

    pub fn get_playlist(&self, quality: StreamQuality, use_h265: bool, use_adaptive: bool) -> Result<Value, ApiError> {
        let mut caps = Vec::new();
        if use_h265 {
            caps.push("h265");
        }
        if use_adaptive {
            caps.push("adaptive2");
        }

        let params: ApiParams = vec![
            ("uuid", self.serial.clone()),
            ("format", "m3u8".to_string()),
            ("quality", quality.api_value().to_string()),
            ("capabilities", caps.join(",")),
        ];
        self.api_call("playlist", &params, true)
    }

    pub fn get_stream_qualities(&self) -> Result<Value, ApiError> {
        self.api_call("get-stream-qualities", &[], true)
    }

    /// EPG starting at `start`, one hour long with `small_duration`, one day
    /// otherwise. `channels` is a comma separated id list, empty for all.
    pub fn get_epg(&self, start: i64, small_duration: bool, channels: &str) -> Result<Value, ApiError> {
        let mut params: ApiParams = vec![
            ("time", crate::epg::format_api_time(start)),
            (
                "duration",
                if small_duration { EPG_DURATION_SMALL } else { EPG_DURATION_LARGE }.to_string(),
            ),
            ("detail", "description,poster".to_string()),
            ("allowOrder", "1".to_string()),
        ];
        if !channels.is_empty() {
            params.push(("channels", channels.to_string()));
        }
        self.api_call("epg", &params, true)
    }

    pub fn get_pvr(&self) -> Result<Value, ApiError> {
        self.api_call("get-pvr", &[], true)
    }

    pub fn get_recording_url(&self, record_id: &str) -> Result<RecordingStream, ApiError> {
        let params: ApiParams = vec![
            ("recordId", record_id.to_string()),
            ("format", "m3u8".to_string()),
        ];
        let root = self.api_call("record-timeshift", &params, true)?;
        Ok(RecordingStream {
            url: json_str(&root, "url"),
            channel: json_str(&root, "channel"),
        })
    }

    pub fn get_timeshift_info(&self, event_id: &str) -> Result<TimeshiftInfo, ApiError> {
        let params: ApiParams = vec![
            ("eventId", event_id.to_string()),
            ("format", "m3u8".to_string()),
        ];
        let root = self.api_call("event-timeshift", &params, true)?;
        Ok(TimeshiftInfo {
            url: json_str(&root, "url"),
            channel: json_str(&root, "channel"),
            duration: json_i64(&root, "duration"),
        })
    }

    /// Schedule recording of an EPG event, returns the new record id
    pub fn add_timer(&self, event_id: &str) -> Result<String, ApiError> {
        let params: ApiParams = vec![("eventId", event_id.to_string())];
        let root = self.api_call("record-event", &params, true)?;
        Ok(json_str(&root, "recordId"))
    }

    pub fn delete_record(&self, record_id: &str) -> Result<(), ApiError> {
        let params: ApiParams = vec![("recordId", record_id.to_string())];
        self.api_call("delete-record", &params, true).map(|_| ())
    }
}

/// Parse a response body; success only when it is JSON with `status == 1`.
pub fn check_response(body: &str) -> Result<Value, ApiError> {
    let root: Value = serde_json::from_str(body).map_err(|e| {
        log::error!("Error parsing response. Response is: {:.1024}, reader error: {}", body, e);
        ApiError::Parse(e.to_string())
    })?;

    let status = json_i64(&root, "status");
    if status != 1 {
        let error = json_str(&root, "error");
        log::error!("Error indicated in response. status: {}, error: {}", status, error);
        return Err(ApiError::Status { status, error });
    }

    Ok(root)
}

/// String value of `key`; numbers and booleans are stringified, anything
/// else (including a missing key) gives an empty string.
pub fn json_str(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Integer value of `key`, accepting numeric strings; 0 when absent.
pub fn json_i64(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
