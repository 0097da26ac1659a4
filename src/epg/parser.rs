//! Parser for the `epg` response
//!
//! The response carries `channels: { <channel id>: [ {event}, ... ] }`.
//! Events of channels not present in the playlist are skipped.

use serde_json::Value;

use crate::api::json_str;
use crate::models::{Channel, EpgEntry};

use super::parse_datetime;

/// Entries per known channel id, in response order
pub fn parse_epg_response(root: &Value, channels: &[Channel]) -> Vec<(String, Vec<EpgEntry>)> {
    let Some(epg_channels) = root.get("channels").and_then(Value::as_object) else {
        log::warn!("EPG response without channels");
        return Vec::new();
    };

    let mut result = Vec::new();
    for (channel_id, events) in epg_channels {
        let Some(channel) = channels.iter().find(|c| &c.id == channel_id) else {
            continue;
        };

        let entries = events
            .as_array()
            .map(|events| {
                events
                    .iter()
                    .filter_map(|event| parse_event(event, channel))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        result.push((channel_id.clone(), entries));
    }

    result
}

fn parse_event(event: &Value, channel: &Channel) -> Option<EpgEntry> {
    let start_raw = json_str(event, "startTime");
    let Some(start_time) = parse_datetime(&start_raw) else {
        log::warn!("Skipping TV show on {} with bad start time '{}'", channel.id, start_raw);
        return None;
    };
    let end_time = parse_datetime(&json_str(event, "endTime")).unwrap_or(start_time);

    let availability = json_str(event, "availability");
    let record_id = json_str(event, "recordId");

    let entry = EpgEntry {
        broadcast_id: start_time as u32,
        channel_uid: channel.unique_id,
        title: json_str(event, "title"),
        plot_outline: String::new(),
        plot: json_str(event, "description"),
        icon_path: json_str(event, "poster"),
        genre: String::new(),
        event_id: json_str(event, "eventId"),
        start_time,
        end_time,
        available_timeshift: availability == "timeshift" || availability == "pvr",
        record_id: (!record_id.is_empty()).then_some(record_id),
    };

    log::debug!(
        "Loading TV show: {} - {}, start={}(epoch={})",
        channel.id,
        entry.title,
        start_raw,
        start_time
    );
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel(id: &str, uid: u32) -> Channel {
        Channel {
            id: id.to_string(),
            unique_id: uid,
            channel_number: uid,
            name: id.to_uppercase(),
            stream_url: format!("http://stream/{}", id),
            stream_type: "hls".to_string(),
            group_id: "1".to_string(),
            icon_path: String::new(),
            is_radio: false,
            encryption_system: 0,
            is_pin_locked: false,
        }
    }

    #[test]
    fn test_parse_known_channels_only() {
        let root = json!({
            "status": 1,
            "channels": {
                "ct1": [
                    {"title": "News", "description": "Daily news", "startTime": "2024-01-15 12:00", "endTime": "2024-01-15 12:30",
                     "eventId": "e1", "poster": "http://img/1.jpg", "availability": "timeshift"},
                    {"title": "Film", "startTime": "2024-01-15 12:30", "endTime": "2024-01-15 14:00",
                     "eventId": "e2", "availability": "none", "recordId": 77}
                ],
                "unknown": [
                    {"title": "Lost", "startTime": "2024-01-15 12:00", "endTime": "2024-01-15 13:00"}
                ]
            }
        });

        let parsed = parse_epg_response(&root, &[channel("ct1", 3)]);
        assert_eq!(parsed.len(), 1);
        let (id, entries) = &parsed[0];
        assert_eq!(id, "ct1");
        assert_eq!(entries.len(), 2);

        let news = &entries[0];
        assert_eq!(news.start_time, 1705316400);
        assert_eq!(news.end_time, 1705318200);
        assert_eq!(news.broadcast_id, 1705316400);
        assert_eq!(news.channel_uid, 3);
        assert_eq!(news.plot, "Daily news");
        assert!(news.available_timeshift);
        assert_eq!(news.record_id, None);

        let film = &entries[1];
        assert!(!film.available_timeshift);
        assert_eq!(film.record_id.as_deref(), Some("77"));
    }

    #[test]
    fn test_pvr_availability_counts_as_timeshift() {
        let root = json!({"channels": {"ct1": [
            {"title": "Show", "startTime": "2024-01-15 12:00", "endTime": "2024-01-15 13:00", "availability": "pvr"},
            {"title": "Broken", "startTime": "", "endTime": ""}
        ]}});
        let parsed = parse_epg_response(&root, &[channel("ct1", 1)]);
        assert_eq!(parsed[0].1.len(), 1);
        assert!(parsed[0].1[0].available_timeshift);
    }

    #[test]
    fn test_missing_channels_object() {
        assert!(parse_epg_response(&json!({"status": 1}), &[channel("ct1", 1)]).is_empty());
    }
}
