//! Playback properties handed to the host player

use crate::models::{Channel, StreamInfo};

pub const PROPERTY_STREAM_URL: &str = "streamurl";
pub const PROPERTY_INPUTSTREAM: &str = "inputstream";
pub const PROPERTY_MANIFEST_TYPE: &str = "inputstream.adaptive.manifest_type";
pub const PROPERTY_REALTIME: &str = "isrealtimestream";

const ADAPTIVE_TYPES: [&str; 3] = ["mpd", "ism", "hls"];

/// Name/value pair understood by the host player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProperty {
    pub name: String,
    pub value: String,
}

impl StreamProperty {
    fn new(name: &str, value: &str) -> Self {
        Self { name: name.to_string(), value: value.to_string() }
    }
}

pub fn stream_properties(stream: &StreamInfo, use_adaptive: bool, is_live: bool) -> Vec<StreamProperty> {
    let mut properties = vec![StreamProperty::new(PROPERTY_STREAM_URL, &stream.url)];

    if use_adaptive && ADAPTIVE_TYPES.contains(&stream.stream_type.as_str()) {
        properties.push(StreamProperty::new(PROPERTY_INPUTSTREAM, "inputstream.adaptive"));
        properties.push(StreamProperty::new(PROPERTY_MANIFEST_TYPE, &stream.stream_type));
    }
    if is_live {
        properties.push(StreamProperty::new(PROPERTY_REALTIME, "true"));
    }

    properties
}

/// Stream type of the channel with remote id `channel_id`
pub fn channel_stream_type(channels: &[Channel], channel_id: &str) -> String {
    match channels.iter().find(|c| c.id == channel_id) {
        Some(channel) => channel.stream_type.clone(),
        None => {
            log::info!("Can't find channel {}", channel_id);
            "unknown".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(kind: &str) -> StreamInfo {
        StreamInfo { url: "http://s/x".to_string(), stream_type: kind.to_string() }
    }

    #[test]
    fn test_plain_live_stream() {
        let props = stream_properties(&stream("hls"), false, true);
        assert_eq!(
            props,
            [StreamProperty::new(PROPERTY_STREAM_URL, "http://s/x"), StreamProperty::new(PROPERTY_REALTIME, "true")]
        );
    }

    #[test]
    fn test_adaptive_manifest() {
        let props = stream_properties(&stream("mpd"), true, false);
        assert_eq!(props.len(), 3);
        assert_eq!(props[1].value, "inputstream.adaptive");
        assert_eq!(props[2], StreamProperty::new(PROPERTY_MANIFEST_TYPE, "mpd"));

        // not an adaptive format
        assert_eq!(stream_properties(&stream("mp3"), true, false).len(), 1);
    }

    #[test]
    fn test_unknown_channel_stream_type() {
        assert_eq!(channel_stream_type(&[], "ct1"), "unknown");
    }
}
