//! Shared snapshot store
//!
//! Every collection is an immutable `Arc` published under one mutex. Readers
//! clone the handle and iterate without holding the lock; writers build the
//! new value outside and swap it in. EPG edits work on a shallow copy of the
//! map, so `Arc::make_mut` clones only the channels they touch.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::epg::{DAY, HOUR};
use crate::models::{Channel, ChannelGroup, DriveSpace, EpgMap, Recording, Timer};

struct StoreState {
    keep_running: bool,
    load_recordings: bool,
    /// A playlist was published at least once
    playlist_loaded: bool,
    /// The host fetched the channel list at least once
    channels_delivered: bool,
    groups: Arc<Vec<ChannelGroup>>,
    channels: Arc<Vec<Channel>>,
    epg: Arc<EpgMap>,
    recordings: Arc<Vec<Recording>>,
    timers: Arc<Vec<Timer>>,
    drive_space: DriveSpace,
    epg_min_time: i64,
    epg_max_time: i64,
    epg_max_future_days: i64,
    epg_max_past_days: i64,
}

pub struct SnapshotStore {
    state: Mutex<StoreState>,
    playlist_published: Condvar,
    /// Serializes EPG writers (worker loads and GC, foreground timer edits)
    epg_writer: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(max_future_days: i64, max_past_days: i64, now: i64) -> Self {
        let store = Self {
            state: Mutex::new(StoreState {
                keep_running: true,
                // first pass of the worker loads recordings
                load_recordings: true,
                playlist_loaded: false,
                channels_delivered: false,
                groups: Arc::default(),
                channels: Arc::default(),
                epg: Arc::default(),
                recordings: Arc::default(),
                timers: Arc::default(),
                drive_space: DriveSpace::default(),
                epg_min_time: now,
                epg_max_time: now + HOUR,
                epg_max_future_days: max_future_days,
                epg_max_past_days: max_past_days,
            }),
            playlist_published: Condvar::new(),
            epg_writer: Mutex::new(()),
        };
        store.set_epg_max_days(max_future_days, max_past_days, now);
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn keep_running(&self) -> bool {
        self.lock().keep_running
    }

    /// Ask the worker to finish; also wakes anyone waiting for channels
    pub fn stop(&self) {
        self.lock().keep_running = false;
        self.playlist_published.notify_all();
    }

    pub fn channels(&self) -> Arc<Vec<Channel>> {
        self.lock().channels.clone()
    }

    pub fn groups(&self) -> Arc<Vec<ChannelGroup>> {
        self.lock().groups.clone()
    }

    pub fn epg(&self) -> Arc<EpgMap> {
        self.lock().epg.clone()
    }

    /// Channels and EPG taken under the same lock
    pub fn channels_and_epg(&self) -> (Arc<Vec<Channel>>, Arc<EpgMap>) {
        let state = self.lock();
        (state.channels.clone(), state.epg.clone())
    }

    pub fn recordings(&self) -> Arc<Vec<Recording>> {
        self.lock().recordings.clone()
    }

    pub fn timers(&self) -> Arc<Vec<Timer>> {
        self.lock().timers.clone()
    }

    pub fn drive_space(&self) -> DriveSpace {
        self.lock().drive_space
    }

    pub fn recording_exists(&self, record_id: &str) -> bool {
        self.recordings().iter().any(|r| r.record_id == record_id)
    }

    /// Swap in a new playlist. Returns whether the host already fetched
    /// channels, i.e. whether it must be told about the change.
    pub fn publish_playlist(&self, channels: Vec<Channel>, groups: Vec<ChannelGroup>) -> bool {
        let delivered = {
            let mut state = self.lock();
            state.channels = Arc::new(channels);
            state.groups = Arc::new(groups);
            state.playlist_loaded = true;
            state.channels_delivered
        };
        self.playlist_published.notify_all();
        delivered
    }

    pub fn mark_channels_delivered(&self) {
        self.lock().channels_delivered = true;
    }

    /// Block until the first playlist is published. `false` on timeout.
    pub fn wait_for_channels(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .playlist_published
            .wait_timeout_while(state, timeout, |s| !s.playlist_loaded && s.keep_running)
            .unwrap_or_else(|e| e.into_inner());
        state.playlist_loaded
    }

    /// Edit a copy of the EPG map and publish it. The store lock is only
    /// taken to read and to swap the handle; concurrent writers queue on
    /// `epg_writer` so no edit is lost.
    pub fn update_epg<R>(&self, edit: impl FnOnce(&mut EpgMap) -> R) -> R {
        let _writer = self.epg_writer.lock().unwrap_or_else(|e| e.into_inner());

        let mut epg = EpgMap::clone(&self.epg());
        let result = edit(&mut epg);

        let previous = std::mem::replace(&mut self.lock().epg, Arc::new(epg));
        // the old version may be the last reference, free it unlocked
        drop(previous);
        result
    }

    /// Publish the result of a recordings refresh. `None` keeps the current
    /// collection.
    pub fn publish_recordings(
        &self,
        recordings: Option<Vec<Recording>>,
        timers: Option<Vec<Timer>>,
        drive_space: DriveSpace,
    ) {
        let mut state = self.lock();
        if let Some(recordings) = recordings {
            state.recordings = Arc::new(recordings);
        }
        if let Some(timers) = timers {
            state.timers = Arc::new(timers);
        }
        state.drive_space = drive_space;
    }

    pub fn set_load_recordings(&self) {
        self.lock().load_recordings = true;
    }

    /// Clear the load-recordings flag, returning its previous value
    pub fn take_load_recordings(&self) -> bool {
        std::mem::take(&mut self.lock().load_recordings)
    }

    pub fn epg_window(&self) -> (i64, i64) {
        let state = self.lock();
        (state.epg_min_time, state.epg_max_time)
    }

    /// Extend the window to include `[start, end]`, never narrowing it
    pub fn widen_epg_window(&self, start: i64, end: i64) {
        let mut state = self.lock();
        state.epg_min_time = state.epg_min_time.min(start);
        state.epg_max_time = state.epg_max_time.max(end);
    }

    pub fn epg_max_days(&self) -> (i64, i64) {
        let state = self.lock();
        (state.epg_max_future_days, state.epg_max_past_days)
    }

    /// Store new limits (`-1` keeps the current one) and recompute the
    /// window around `now`
    pub fn set_epg_max_days(&self, future_days: i64, past_days: i64, now: i64) {
        let mut state = self.lock();
        if future_days != -1 {
            state.epg_max_future_days = future_days;
        }
        if past_days != -1 {
            state.epg_max_past_days = past_days;
        }
        state.epg_min_time = now - state.epg_max_past_days * DAY;
        state.epg_max_time = now + state.epg_max_future_days * DAY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    const NOW: i64 = 1_705_316_400;

    fn channel(uid: u32) -> Channel {
        Channel {
            id: format!("ch{}", uid),
            unique_id: uid,
            channel_number: uid,
            name: format!("Channel {}", uid),
            stream_url: String::new(),
            stream_type: "hls".to_string(),
            group_id: String::new(),
            icon_path: String::new(),
            is_radio: false,
            encryption_system: 0,
            is_pin_locked: false,
        }
    }

    #[test]
    fn test_reader_keeps_old_snapshot() {
        let store = SnapshotStore::new(3, 1, NOW);
        store.publish_playlist(vec![channel(1), channel(2)], Vec::new());

        let snapshot = store.channels();
        store.publish_playlist(vec![channel(1)], Vec::new());

        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.channels().len(), 1);
    }

    #[test]
    fn test_update_epg_shares_untouched_channels() {
        let store = SnapshotStore::new(3, 1, NOW);
        let before = store.epg();
        store.update_epg(|epg| {
            epg.insert("ch1".to_string(), Arc::default());
            epg.insert("ch2".to_string(), Arc::default());
        });
        assert!(before.is_empty());

        let reader = store.epg();
        store.update_epg(|epg| {
            if let Some(channel) = epg.get_mut("ch1") {
                Arc::make_mut(channel).id = "ch1".to_string();
            }
        });
        let after = store.epg();
        assert!(Arc::ptr_eq(&reader["ch2"], &after["ch2"]));
        assert!(!Arc::ptr_eq(&reader["ch1"], &after["ch1"]));
        assert_eq!(reader["ch1"].id, "");
    }

    #[test]
    fn test_readers_not_blocked_by_epg_edit() {
        let store = Arc::new(SnapshotStore::new(3, 1, NOW));
        store.publish_playlist(vec![channel(1)], Vec::new());

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                store.update_epg(|epg| {
                    epg.insert("ch1".to_string(), Arc::default());
                    thread::sleep(Duration::from_millis(300));
                })
            })
        };
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        assert_eq!(store.channels().len(), 1);
        assert!(store.epg().is_empty());
        assert!(started.elapsed() < Duration::from_millis(200));

        writer.join().unwrap();
        assert_eq!(store.epg().len(), 1);
    }

    #[test]
    fn test_concurrent_epg_edits_are_kept() {
        let store = Arc::new(SnapshotStore::new(3, 1, NOW));
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for j in 0..25 {
                        store.update_epg(|epg| {
                            epg.insert(format!("ch{}-{}", i, j), Arc::default());
                        });
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(store.epg().len(), 100);
    }

    #[test]
    fn test_initial_window_from_max_days() {
        let store = SnapshotStore::new(3, 1, NOW);
        assert_eq!(store.epg_window(), (NOW - DAY, NOW + 3 * DAY));
    }

    #[test]
    fn test_set_max_days_keeps_unset_value() {
        let store = SnapshotStore::new(3, 1, NOW);
        store.set_epg_max_days(-1, 2, NOW + 10);
        assert_eq!(store.epg_max_days(), (3, 2));
        assert_eq!(store.epg_window(), (NOW + 10 - 2 * DAY, NOW + 10 + 3 * DAY));

        store.set_epg_max_days(5, -1, NOW);
        assert_eq!(store.epg_max_days(), (5, 2));
    }

    #[test]
    fn test_widen_never_narrows() {
        let store = SnapshotStore::new(1, 1, NOW);
        store.widen_epg_window(NOW, NOW + HOUR);
        assert_eq!(store.epg_window(), (NOW - DAY, NOW + DAY));
        store.widen_epg_window(NOW - 2 * DAY, NOW + 5 * DAY);
        assert_eq!(store.epg_window(), (NOW - 2 * DAY, NOW + 5 * DAY));
    }

    #[test]
    fn test_load_recordings_flag() {
        let store = SnapshotStore::new(3, 1, NOW);
        // scheduled at startup
        assert!(store.take_load_recordings());
        assert!(!store.take_load_recordings());
        store.set_load_recordings();
        assert!(store.take_load_recordings());
        assert!(!store.take_load_recordings());
    }

    #[test]
    fn test_wait_for_channels_times_out() {
        let store = SnapshotStore::new(3, 1, NOW);
        let started = Instant::now();
        assert!(!store.wait_for_channels(Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_for_channels_wakes_on_publish() {
        let store = Arc::new(SnapshotStore::new(3, 1, NOW));
        let publisher = {
            let store = store.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                store.publish_playlist(vec![channel(1)], Vec::new())
            })
        };

        assert!(store.wait_for_channels(Duration::from_secs(5)));
        assert!(!publisher.join().unwrap());

        store.mark_channels_delivered();
        assert!(store.publish_playlist(vec![channel(1)], Vec::new()));
    }
}
