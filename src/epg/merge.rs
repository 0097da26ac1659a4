//! Copy-on-write edits of the EPG map
//!
//! Both functions work on a map whose channel handles may still be shared
//! with readers; only the channels actually touched are cloned.

use std::sync::Arc;

use crate::host::EpgEventState;
use crate::models::{EpgChannel, EpgEntry, EpgMap};

/// Notification produced by an edit, delivered after the new map is published
#[derive(Debug, Clone, PartialEq)]
pub struct EpgChange {
    pub entry: EpgEntry,
    pub state: EpgEventState,
}

/// Insert or replace entries of one channel, keyed by start time
pub fn merge_entries(epg: &mut EpgMap, channel_id: &str, entries: Vec<EpgEntry>) -> Vec<EpgChange> {
    if entries.is_empty() {
        return Vec::new();
    }

    let channel = epg
        .entry(channel_id.to_string())
        .or_insert_with(|| Arc::new(EpgChannel::new(channel_id)));
    let channel = Arc::make_mut(channel);

    entries
        .into_iter()
        .map(|entry| {
            let state = match channel.entries.insert(entry.start_time, entry.clone()) {
                Some(_) => EpgEventState::Updated,
                None => EpgEventState::Created,
            };
            EpgChange { entry, state }
        })
        .collect()
}

/// Remove every entry ending before `min` or starting after `max`
pub fn release_outside(epg: &mut EpgMap, min: i64, max: i64) -> Vec<EpgChange> {
    let mut changes = Vec::new();

    for (id, channel) in epg.iter_mut() {
        let outside = |e: &EpgEntry| e.start_time > max || e.end_time < min;
        if !channel.entries.values().any(outside) {
            continue;
        }

        let channel = Arc::make_mut(channel);
        channel.entries.retain(|_, entry| {
            if outside(&*entry) {
                log::debug!(
                    "Removing TV show: {} - {}, start={} end={}",
                    id,
                    entry.title,
                    super::format_datetime(entry.start_time),
                    super::format_datetime(entry.end_time)
                );
                changes.push(EpgChange { entry: entry.clone(), state: EpgEventState::Deleted });
                false
            } else {
                true
            }
        });
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: i64, end: i64, title: &str) -> EpgEntry {
        EpgEntry {
            broadcast_id: start as u32,
            channel_uid: 1,
            title: title.to_string(),
            plot_outline: String::new(),
            plot: String::new(),
            icon_path: String::new(),
            genre: String::new(),
            event_id: format!("ev{}", start),
            start_time: start,
            end_time: end,
            available_timeshift: true,
            record_id: None,
        }
    }

    #[test]
    fn test_reload_replaces_in_place() {
        let mut epg = EpgMap::new();
        let first = merge_entries(&mut epg, "ct1", vec![entry(100, 200, "News"), entry(200, 300, "Film")]);
        assert!(first.iter().all(|c| c.state == EpgEventState::Created));

        let second = merge_entries(&mut epg, "ct1", vec![entry(100, 200, "News (repeat)"), entry(200, 300, "Film")]);
        assert!(second.iter().all(|c| c.state == EpgEventState::Updated));

        let channel = &epg["ct1"];
        assert_eq!(channel.entries.len(), 2);
        assert_eq!(channel.entries[&100].title, "News (repeat)");
    }

    #[test]
    fn test_merge_does_not_touch_shared_snapshot() {
        let mut epg = EpgMap::new();
        merge_entries(&mut epg, "ct1", vec![entry(100, 200, "News")]);
        let reader = epg.clone();

        merge_entries(&mut epg, "ct1", vec![entry(200, 300, "Film")]);
        assert_eq!(reader["ct1"].entries.len(), 1);
        assert_eq!(epg["ct1"].entries.len(), 2);
    }

    #[test]
    fn test_release_keeps_only_window() {
        let mut epg = EpgMap::new();
        merge_entries(
            &mut epg,
            "ct1",
            vec![entry(0, 100, "old"), entry(100, 250, "edge"), entry(250, 400, "in"), entry(600, 700, "future")],
        );
        merge_entries(&mut epg, "ct2", vec![entry(300, 350, "untouched")]);
        let reader = epg.clone();

        let removed = release_outside(&mut epg, 200, 500);
        let mut titles: Vec<_> = removed.iter().map(|c| c.entry.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, ["future", "old"]);
        assert!(removed.iter().all(|c| c.state == EpgEventState::Deleted));

        for channel in epg.values() {
            for e in channel.entries.values() {
                assert!(e.end_time >= 200 && e.start_time <= 500);
            }
        }
        assert!(Arc::ptr_eq(&epg["ct2"], &reader["ct2"]));
        assert_eq!(reader["ct1"].entries.len(), 4);
    }

    #[test]
    fn test_release_nothing_outside() {
        let mut epg = EpgMap::new();
        merge_entries(&mut epg, "ct1", vec![entry(250, 400, "in")]);
        assert!(release_outside(&mut epg, 200, 500).is_empty());
    }
}
