//! Channel lineup from the `playlist` response

use serde_json::Value;

use crate::api::json_str;
use crate::config::AddonConfig;
use crate::models::{Channel, ChannelGroup};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playlist {
    pub channels: Vec<Channel>,
    pub groups: Vec<ChannelGroup>,
}

/// Build channels and groups. Unique ids follow the response position, so
/// hidden locked channels leave gaps.
pub fn parse_playlist(root: &Value, config: &AddonConfig) -> Playlist {
    let mut channels = Vec::new();

    let items = root.get("channels").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
    for (i, item) in items.iter().enumerate() {
        let position = i as u32 + 1;
        let locked = match json_str(item, "locked") {
            l if l.is_empty() => "none".to_string(),
            l => l,
        };

        if !config.shows_locked(&locked) {
            log::info!("Skipping locked({}) channel#{} {}", locked, position, json_str(item, "name"));
            continue;
        }

        let channel = Channel {
            id: json_str(item, "id"),
            unique_id: position,
            channel_number: position,
            name: json_str(item, "name"),
            stream_url: json_str(item, "url"),
            stream_type: json_str(item, "streamType"),
            group_id: json_str(item, "group"),
            icon_path: json_str(item, "logoUrl"),
            is_radio: json_str(item, "type") != "tv",
            encryption_system: 0,
            is_pin_locked: locked == "pin",
        };
        log::debug!("Channel#{} {}", channel.unique_id, channel.name);
        channels.push(channel);
    }

    // the API does not tell radio groups apart
    let groups = root
        .get("groups")
        .and_then(Value::as_object)
        .map(|groups| {
            groups
                .iter()
                .map(|(group_id, name)| ChannelGroup {
                    group_id: group_id.clone(),
                    name: name.as_str().unwrap_or_default().to_string(),
                    is_radio: false,
                    members: channels
                        .iter()
                        .filter(|c| &c.group_id == group_id && !c.is_radio)
                        .map(|c| c.unique_id)
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();

    Playlist { channels, groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> Value {
        json!({
            "status": 1,
            "channels": [
                {"id": "ct1", "name": "CT 1", "url": "http://s/ct1.m3u8", "streamType": "hls", "group": "cz",
                 "logoUrl": "http://l/ct1.png", "type": "tv", "locked": "none"},
                {"id": "adult", "name": "Adult", "url": "http://s/a.m3u8", "streamType": "hls", "group": "cz",
                 "type": "tv", "locked": "pin"},
                {"id": "hbo", "name": "HBO", "url": "http://s/hbo.mpd", "streamType": "mpd", "group": "movies",
                 "type": "tv", "locked": "subscription"},
                {"id": "radio1", "name": "Radio 1", "url": "http://s/r1.mp3", "streamType": "mp3", "group": "cz",
                 "type": "radio"}
            ],
            "groups": {"cz": "Czech", "movies": "Movies"}
        })
    }

    #[test]
    fn test_channels_keep_response_position() {
        let playlist = parse_playlist(&response(), &AddonConfig::default());
        let ids: Vec<_> = playlist.channels.iter().map(|c| (c.id.as_str(), c.unique_id)).collect();
        assert_eq!(ids, [("ct1", 1), ("adult", 2), ("radio1", 4)]);

        let ct1 = &playlist.channels[0];
        assert_eq!(ct1.stream_type, "hls");
        assert_eq!(ct1.icon_path, "http://l/ct1.png");
        assert!(!ct1.is_radio);
        assert!(!ct1.is_pin_locked);
        assert!(playlist.channels[1].is_pin_locked);
        assert!(playlist.channels[2].is_radio);
    }

    #[test]
    fn test_all_locked_channels_when_configured() {
        let config = AddonConfig { show_locked_only_pin: false, ..AddonConfig::default() };
        assert_eq!(parse_playlist(&response(), &config).channels.len(), 4);

        let config = AddonConfig { show_locked_channels: false, ..AddonConfig::default() };
        assert_eq!(parse_playlist(&response(), &config).channels.len(), 2);
    }

    #[test]
    fn test_groups_hold_tv_members() {
        let playlist = parse_playlist(&response(), &AddonConfig::default());
        assert_eq!(playlist.groups.len(), 2);

        let czech = playlist.groups.iter().find(|g| g.group_id == "cz").unwrap();
        assert_eq!(czech.name, "Czech");
        assert!(!czech.is_radio);
        assert_eq!(czech.members, [1, 2]);

        let movies = playlist.groups.iter().find(|g| g.group_id == "movies").unwrap();
        assert!(movies.members.is_empty());
    }
}
