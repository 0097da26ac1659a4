//! Data models for the PVR backend snapshots

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Live channel from the playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Remote channel id (used by EPG and PVR records)
    pub id: String,
    /// 1-based position in the playlist, stable only within one load
    pub unique_id: u32,
    pub channel_number: u32,
    pub name: String,
    pub stream_url: String,
    pub stream_type: String,
    pub group_id: String,
    pub icon_path: String,
    pub is_radio: bool,
    pub encryption_system: u32,
    pub is_pin_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub group_id: String,
    pub name: String,
    pub is_radio: bool,
    /// Channel unique ids in playlist order
    pub members: Vec<u32>,
}

/// Member of a channel group as handed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember {
    pub channel_uid: u32,
    pub channel_number: u32,
}

/// Single EPG event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpgEntry {
    /// Derived from the start time, unique within a channel
    pub broadcast_id: u32,
    pub channel_uid: u32,
    pub title: String,
    pub plot_outline: String,
    pub plot: String,
    pub icon_path: String,
    pub genre: String,
    pub event_id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub available_timeshift: bool,
    /// Set once a recording exists for the event
    pub record_id: Option<String>,
}

/// EPG of one channel, entries keyed by start time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpgChannel {
    pub id: String,
    pub entries: BTreeMap<i64, EpgEntry>,
}

impl EpgChannel {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), entries: BTreeMap::new() }
    }

    /// Entries overlapping `[start, end]`
    pub fn entries_in_range(&self, start: i64, end: i64) -> impl Iterator<Item = &EpgEntry> {
        self.entries.values().filter(move |e| e.end_time >= start && e.start_time <= end)
    }
}

/// All channel EPGs keyed by remote channel id. Channels are shared between
/// snapshot versions, an edit copies only the touched channel.
pub type EpgMap = BTreeMap<String, Arc<EpgChannel>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub record_id: String,
    pub title: String,
    pub plot_outline: String,
    pub channel_name: String,
    pub channel_uid: Option<u32>,
    pub start_time: i64,
    /// Seconds
    pub duration: i64,
    pub lifetime_days: i64,
    pub directory: String,
    pub is_radio: bool,
    pub is_pin_locked: bool,
    pub stream_url: String,
    pub stream_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Scheduled,
    Recording,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    /// Remote record id
    pub client_index: u32,
    pub channel_uid: Option<u32>,
    pub start_time: i64,
    pub end_time: i64,
    pub state: TimerState,
    pub title: String,
    pub summary: String,
    pub lifetime_days: i64,
    pub directory: String,
}

/// Resolved stream for playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub url: String,
    pub stream_type: String,
}

/// Recording quota, in the units reported to the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveSpace {
    pub total: u64,
    pub used: u64,
}
