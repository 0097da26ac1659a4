//! Recordings and timers from the `get-pvr` response
//!
//! One listing holds both: records whose broadcast already ended are
//! recordings, the rest are timers.

use serde_json::Value;

use crate::api::{json_i64, json_str};
use crate::epg::{parse_date_midnight, parse_datetime, DAY};
use crate::models::{Channel, DriveSpace, Recording, Timer, TimerState};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PvrListing {
    pub recordings: Vec<Recording>,
    pub timers: Vec<Timer>,
    pub drive_space: DriveSpace,
}

/// Quota seconds reported as "megabytes", one minute per 1024
fn quota_units(seconds: i64) -> u64 {
    (seconds.max(0) / 60 * 1024) as u64
}

fn lifetime_days(record: &Value, now: i64) -> i64 {
    parse_date_midnight(&json_str(record, "expires"))
        .map(|expires| (expires - now) / DAY)
        .unwrap_or(0)
}

/// Split the listing into recordings and timers. `locked_label` prefixes the
/// directory of records on locked channels.
pub fn parse_pvr(root: &Value, channels: &[Channel], locked_label: &str, now: i64) -> PvrListing {
    let summary = root.get("summary").cloned().unwrap_or_default();
    let drive_space = DriveSpace {
        total: quota_units(json_i64(&summary, "availableDuration")),
        used: quota_units(json_i64(&summary, "recordedDuration")),
    };

    let mut recordings = Vec::new();
    let mut timers = Vec::new();

    let records = root.get("records").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
    for record in records {
        let title = json_str(record, "title");
        let Some(start_time) = parse_datetime(&json_str(record, "startTime")) else {
            log::warn!("Skipping record '{}' without start time", title);
            continue;
        };
        let duration = json_i64(record, "duration");
        let id = json_i64(record, "id");

        let locked = match json_str(record, "channelLocked") {
            l if l.is_empty() => "none".to_string(),
            l => l,
        };
        let directory = if locked == "none" {
            String::new()
        } else {
            log::info!("Timer/recording '{}' is locked({})", title, locked);
            format!("{} - {}", locked_label, locked)
        };

        let channel_id = json_str(record, "channel");
        let channel = channels.iter().find(|c| c.id == channel_id);
        let description = record.get("event").map(|e| json_str(e, "description")).unwrap_or_default();

        if start_time + duration < now {
            log::debug!("Loading recording '{}'", title);
            recordings.push(Recording {
                record_id: id.to_string(),
                title,
                plot_outline: description,
                channel_name: channel.map(|c| c.name.clone()).unwrap_or_default(),
                channel_uid: channel.map(|c| c.unique_id),
                start_time,
                duration,
                lifetime_days: lifetime_days(record, now),
                directory,
                is_radio: channel.is_some_and(|c| c.is_radio),
                is_pin_locked: locked == "pin",
                stream_url: String::new(),
                stream_type: String::new(),
            });
        } else {
            let Ok(client_index) = u32::try_from(id) else {
                log::warn!("Skipping timer '{}' with invalid id {}", title, id);
                continue;
            };
            log::debug!("Loading timer '{}'", title);
            let end_time = start_time + duration;
            timers.push(Timer {
                client_index,
                channel_uid: channel.map(|c| c.unique_id),
                start_time,
                end_time,
                state: if start_time <= now && now < end_time {
                    TimerState::Recording
                } else {
                    TimerState::Scheduled
                },
                title,
                summary: description,
                lifetime_days: lifetime_days(record, now),
                directory,
            });
        }
    }

    PvrListing { recordings, timers, drive_space }
}

/// Copy already resolved streams from the previous snapshot, matched by id
pub fn inherit_streams(recordings: &mut [Recording], previous: &[Recording]) {
    for recording in recordings.iter_mut() {
        if let Some(old) = previous.iter().find(|old| old.record_id == recording.record_id) {
            recording.stream_url = old.stream_url.clone();
            recording.stream_type = old.stream_type.clone();
        }
    }
}

/// Positional comparison by id and stream URL
pub fn recordings_changed(old: &[Recording], new: &[Recording]) -> bool {
    old.len() != new.len()
        || old
            .iter()
            .zip(new)
            .any(|(o, n)| o.record_id != n.record_id || o.stream_url != n.stream_url)
}

pub fn timers_changed(old: &[Timer], new: &[Timer]) -> bool {
    old.len() != new.len() || old.iter().zip(new).any(|(o, n)| o.client_index != n.client_index)
}
