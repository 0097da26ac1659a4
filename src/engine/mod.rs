//! PVR engine
//!
//! [`Data`] owns the snapshot store and the background worker and answers
//! the host's requests from whatever snapshot is current. Host calls may
//! come from any thread; none of them waits for the worker except
//! [`Data::wait_for_channels`].

mod playlist;
mod recordings;
mod streams;
mod worker;

pub use playlist::{parse_playlist, Playlist};
pub use recordings::{inherit_streams, parse_pvr, recordings_changed, timers_changed, PvrListing};
pub use streams::{channel_stream_type, stream_properties, StreamProperty};

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::api::ApiManager;
use crate::config::AddonConfig;
use crate::error::PvrError;
use crate::host::{LocalizedString, PvrHost};
use crate::models::{
    Channel, ChannelGroup, DriveSpace, EpgEntry, EpgMap, GroupMember, Recording, StreamInfo, Timer,
};
use crate::store::SnapshotStore;

use worker::Worker;

pub const BACKEND_NAME: &str = "PVR sledovanitv.cz (unofficial)";

/// Default wait for the first playlist
pub const CHANNELS_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalStatus {
    pub adapter_name: String,
    pub adapter_status: String,
}

pub struct Data {
    config: Arc<AddonConfig>,
    store: Arc<SnapshotStore>,
    api: Arc<ApiManager>,
    host: Arc<dyn PvrHost>,
    worker: Option<JoinHandle<()>>,
}

impl Data {
    /// Engine talking to the real service
    pub fn new(config: AddonConfig, host: Arc<dyn PvrHost>) -> Self {
        let api = Arc::new(ApiManager::from_config(&config));
        Self::with_api(config, api, host)
    }

    pub fn with_api(config: AddonConfig, api: Arc<ApiManager>, host: Arc<dyn PvrHost>) -> Self {
        log::debug!("Creating the {}", BACKEND_NAME);

        let config = Arc::new(config);
        let store = Arc::new(SnapshotStore::new(
            i64::from(config.epg_max_future_days),
            i64::from(config.epg_max_past_days),
            unix_now(),
        ));

        let worker = {
            let (config, store, api, host) = (config.clone(), store.clone(), api.clone(), host.clone());
            thread::Builder::new()
                .name("sledovanitv-worker".to_string())
                .spawn(move || Worker::new(config, store, api, host).run())
        };
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Cannot start worker thread: {}", e);
                None
            }
        };

        Self { config, store, api, host, worker }
    }

    pub fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    pub fn connection_string(&self) -> &'static str {
        "connected"
    }

    pub fn signal_status(&self) -> SignalStatus {
        SignalStatus {
            adapter_name: self.api.provider().label().to_string(),
            adapter_status: "OK".to_string(),
        }
    }

    pub fn logged_in(&self) -> bool {
        self.api.logged_in()
    }

    pub fn wait_for_channels(&self, timeout: Duration) -> bool {
        self.store.wait_for_channels(timeout)
    }

    pub fn channels_amount(&self) -> usize {
        self.store.channels().len()
    }

    /// TV or radio channels. From now on playlist reloads are reported to
    /// the host.
    pub fn channels(&self, radio: bool) -> Vec<Channel> {
        log::debug!("channels {}", if radio { "radio" } else { "tv" });
        self.wait_for_channels(CHANNELS_TIMEOUT);

        let channels = self
            .store
            .channels()
            .iter()
            .filter(|c| c.is_radio == radio)
            .cloned()
            .collect();
        self.store.mark_channels_delivered();
        channels
    }

    pub fn channel_groups_amount(&self) -> usize {
        self.store.groups().len()
    }

    pub fn channel_groups(&self, radio: bool) -> Vec<ChannelGroup> {
        self.wait_for_channels(CHANNELS_TIMEOUT);
        self.store.groups().iter().filter(|g| g.is_radio == radio).cloned().collect()
    }

    /// Members of the group named `group_name`, numbered in group order
    pub fn channel_group_members(&self, group_name: &str) -> Vec<GroupMember> {
        self.wait_for_channels(CHANNELS_TIMEOUT);

        let groups = self.store.groups();
        let channels = self.store.channels();
        let Some(group) = groups.iter().find(|g| g.name == group_name) else {
            return Vec::new();
        };

        group
            .members
            .iter()
            .filter_map(|uid| channels.iter().find(|c| c.unique_id == *uid))
            .zip(1..)
            .map(|(channel, number)| GroupMember { channel_uid: channel.unique_id, channel_number: number })
            .collect()
    }

    /// Loaded EPG of a channel within `[start, end]`. The window is widened
    /// to cover the request; the worker fetches the rest in the background.
    pub fn epg_for_channel(&self, channel_uid: u32, start: i64, end: i64) -> Vec<EpgEntry> {
        log::debug!(
            "EPG for channel {}, from={} to={}",
            channel_uid,
            crate::epg::format_datetime(start),
            crate::epg::format_datetime(end)
        );
        self.store.widen_epg_window(start, end);

        let (channels, epg) = self.store.channels_and_epg();
        channels
            .iter()
            .find(|c| c.unique_id == channel_uid)
            .and_then(|c| epg.get(&c.id))
            .map(|ch| ch.entries_in_range(start, end).cloned().collect())
            .unwrap_or_default()
    }

    pub fn set_epg_max_future_days(&self, days: i64) {
        self.set_epg_max_days(days, -1);
    }

    pub fn set_epg_max_past_days(&self, days: i64) {
        self.set_epg_max_days(-1, days);
    }

    /// New window limits, `-1` keeps the current value
    pub fn set_epg_max_days(&self, future_days: i64, past_days: i64) {
        log::debug!("EPG max days future={}, past={}", future_days, past_days);
        self.store.set_epg_max_days(future_days, past_days, unix_now());
    }

    pub fn epg_window(&self) -> (i64, i64) {
        self.store.epg_window()
    }

    pub fn is_epg_tag_playable(&self, channel_uid: u32, broadcast_id: u32) -> Result<bool, PvrError> {
        let (_, entry) = self.find_epg_entry(channel_uid, broadcast_id)?;
        Ok(entry.available_timeshift && entry.start_time < unix_now())
    }

    pub fn is_epg_tag_recordable(&self, channel_uid: u32, broadcast_id: u32) -> Result<bool, PvrError> {
        let (_, entry) = self.find_epg_entry(channel_uid, broadcast_id)?;
        let recorded = entry.record_id.as_deref().is_some_and(|id| self.store.recording_exists(id));
        Ok(entry.available_timeshift && !recorded && entry.start_time < unix_now())
    }

    pub fn channel_stream(&self, channel_uid: u32) -> Result<StreamInfo, PvrError> {
        let channels = self.store.channels();
        let Some(channel) = channels.iter().find(|c| c.unique_id == channel_uid) else {
            log::info!("Can't find channel {}", channel_uid);
            return Err(PvrError::InvalidParameters(format!("channel {}", channel_uid)));
        };

        if !self.pin_check_unlock(channel.is_pin_locked) {
            return Err(PvrError::Rejected);
        }

        Ok(StreamInfo { url: channel.stream_url.clone(), stream_type: channel.stream_type.clone() })
    }

    /// Stream of a past EPG event: the recording when one exists, timeshift
    /// otherwise
    pub fn epg_tag_stream(&self, channel_uid: u32, broadcast_id: u32) -> Result<StreamInfo, PvrError> {
        let (channel, entry) = self.find_epg_entry(channel_uid, broadcast_id)?;

        if !self.pin_check_unlock(channel.is_pin_locked) {
            return Err(PvrError::Rejected);
        }

        if let Some(record_id) = entry.record_id.as_deref() {
            if self.store.recording_exists(record_id) {
                return self.recording_stream(record_id);
            }
        }

        let info = self
            .api
            .get_timeshift_info(&entry.event_id)
            .map_err(|e| PvrError::InvalidParameters(e.to_string()))?;
        Ok(StreamInfo {
            url: info.url,
            stream_type: channel_stream_type(&self.store.channels(), &info.channel),
        })
    }

    pub fn recording_stream(&self, record_id: &str) -> Result<StreamInfo, PvrError> {
        let recordings = self.store.recordings();
        let Some(recording) = recordings.iter().find(|r| r.record_id == record_id) else {
            return Err(PvrError::InvalidParameters(format!("recording {}", record_id)));
        };

        if !self.pin_check_unlock(recording.is_pin_locked) {
            return Err(PvrError::Rejected);
        }

        Ok(StreamInfo { url: recording.stream_url.clone(), stream_type: recording.stream_type.clone() })
    }

    pub fn channel_stream_properties(&self, channel_uid: u32) -> Result<Vec<StreamProperty>, PvrError> {
        let stream = self.channel_stream(channel_uid)?;
        Ok(stream_properties(&stream, self.config.use_adaptive, true))
    }

    pub fn epg_tag_stream_properties(&self, channel_uid: u32, broadcast_id: u32) -> Result<Vec<StreamProperty>, PvrError> {
        let stream = self.epg_tag_stream(channel_uid, broadcast_id)?;
        Ok(stream_properties(&stream, self.config.use_adaptive, false))
    }

    pub fn recording_stream_properties(&self, record_id: &str) -> Result<Vec<StreamProperty>, PvrError> {
        let stream = self.recording_stream(record_id)?;
        Ok(stream_properties(&stream, self.config.use_adaptive, false))
    }

    pub fn recordings_amount(&self) -> usize {
        self.store.recordings().len()
    }

    pub fn recordings(&self) -> Arc<Vec<Recording>> {
        self.store.recordings()
    }

    pub fn timers_amount(&self) -> usize {
        self.store.timers().len()
    }

    pub fn timers(&self) -> Arc<Vec<Timer>> {
        self.store.timers()
    }

    /// Schedule recording of the EPG event starting at `start_time` on the
    /// channel
    pub fn add_timer(&self, channel_uid: u32, start_time: i64) -> Result<(), PvrError> {
        let (channels, epg) = self.store.channels_and_epg();

        let Some(channel) = channels.iter().find(|c| c.unique_id == channel_uid) else {
            log::error!("add_timer - channel not found");
            return Err(PvrError::InvalidParameters(format!("channel {}", channel_uid)));
        };
        let Some(entry) = epg.get(&channel.id).and_then(|ch| ch.entries.get(&start_time)) else {
            log::error!("add_timer - event not found");
            return Err(PvrError::InvalidParameters(format!("event at {}", start_time)));
        };

        let record_id = self.api.add_timer(&entry.event_id)?;

        self.store.update_epg(|map| {
            if let Some(ch) = map.get_mut(&channel.id) {
                if let Some(entry) = Arc::make_mut(ch).entries.get_mut(&start_time) {
                    entry.record_id = Some(record_id);
                }
            }
        });
        self.store.set_load_recordings();
        Ok(())
    }

    pub fn delete_recording(&self, record_id: &str) -> Result<(), PvrError> {
        self.api.delete_record(record_id)?;
        self.store.set_load_recordings();
        Ok(())
    }

    pub fn delete_timer(&self, client_index: u32) -> Result<(), PvrError> {
        self.delete_recording(&client_index.to_string())
    }

    pub fn drive_space(&self) -> DriveSpace {
        self.store.drive_space()
    }

    /// Snapshot of the whole EPG
    pub fn epg(&self) -> Arc<EpgMap> {
        self.store.epg()
    }

    fn find_epg_entry(&self, channel_uid: u32, broadcast_id: u32) -> Result<(Channel, EpgEntry), PvrError> {
        let (channels, epg) = self.store.channels_and_epg();

        let Some(channel) = channels.iter().find(|c| c.unique_id == channel_uid) else {
            log::info!("Can't find channel {}", channel_uid);
            return Err(PvrError::InvalidParameters(format!("channel {}", channel_uid)));
        };

        let entry = epg
            .get(&channel.id)
            .and_then(|ch| ch.entries.get(&i64::from(broadcast_id)))
            .ok_or_else(|| {
                log::info!("Can't find EPG data for channel {}, time {}", channel.id, broadcast_id);
                PvrError::InvalidParameters(format!("EPG entry {}", broadcast_id))
            })?;

        Ok((channel.clone(), entry.clone()))
    }

    /// Ask for the PIN when `is_pin_locked` and the session is not unlocked
    fn pin_check_unlock(&self, is_pin_locked: bool) -> bool {
        if !is_pin_locked || self.api.pin_unlocked() {
            return true;
        }

        let heading = self.host.localized(LocalizedString::EnterPin);
        let Some(pin) = self.host.prompt_pin(&heading) else {
            log::error!("PIN-entering cancelled");
            return false;
        };

        if let Err(e) = self.api.pin_unlock(&pin) {
            log::error!("PIN-unlocking failed: {}", e);
            return false;
        }

        // locked recordings become visible
        self.store.set_load_recordings();
        true
    }
}

impl Drop for Data {
    fn drop(&mut self) {
        self.store.stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
        log::debug!("{} destructed", BACKEND_NAME);
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
