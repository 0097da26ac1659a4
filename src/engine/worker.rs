//! Background worker
//!
//! Single thread per engine. Logs in, loads the playlist and then runs the
//! periodic jobs, each gated by its own [`CallLimiter`]. Sleeps one poll
//! interval whenever a pass did nothing.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;

use crate::api::ApiManager;
use crate::call_limiter::CallLimiter;
use crate::config::AddonConfig;
use crate::epg::{self, merge_entries, parse_epg_response, release_outside, EpgLoad, EpgLoadState};
use crate::host::{ConnectionState, LocalizedString, PvrHost};
use crate::store::SnapshotStore;

use super::playlist::parse_playlist;
use super::recordings::{inherit_streams, parse_pvr, recordings_changed, timers_changed};
use super::streams::channel_stream_type;
use super::unix_now;

pub(crate) struct Worker {
    config: Arc<AddonConfig>,
    store: Arc<SnapshotStore>,
    api: Arc<ApiManager>,
    host: Arc<dyn PvrHost>,
    epg_state: RefCell<EpgLoadState>,
}

impl Worker {
    pub(crate) fn new(
        config: Arc<AddonConfig>,
        store: Arc<SnapshotStore>,
        api: Arc<ApiManager>,
        host: Arc<dyn PvrHost>,
    ) -> Self {
        Self {
            config,
            store,
            api,
            host,
            epg_state: RefCell::new(EpgLoadState::default()),
        }
    }

    pub(crate) fn run(&self) {
        log::debug!("Worker thread started");

        self.login_loop();
        self.load_playlist();

        let mut keep_alive = CallLimiter::new(|| self.keep_alive_job(), self.config.keep_alive_interval(), true);
        let mut full_refresh =
            CallLimiter::new(|| self.trigger_full_refresh(), self.config.full_refresh_interval(), true);
        let mut recordings_refresh = CallLimiter::new(
            || self.store.set_load_recordings(),
            self.config.recordings_refresh_interval(),
            true,
        );
        // only tells whether the EPG check is due
        let mut epg_check = CallLimiter::new(|| (), self.config.epg_check_interval(), false);

        let mut epg_updated = false;
        while self.store.keep_running() {
            let mut work_done = self.load_recordings_job();
            work_done |= full_refresh.call();
            work_done |= recordings_refresh.call();

            if epg_check.call() || epg_updated {
                // keep loading in the next pass while something changes
                epg_updated = self.load_epg_job();
                work_done = true;
            } else {
                epg_updated = false;
            }

            work_done |= keep_alive.call();

            if !work_done {
                thread::sleep(self.config.poll_interval());
            }
        }

        log::debug!("Worker thread stopped");
    }

    /// Log in, retrying every `login_retry_secs` until it works or the
    /// engine stops.
    pub(crate) fn login_loop(&self) {
        let retry_ticks = self.config.login_retry_ticks();
        let mut delay = 0u64;

        while self.store.keep_running() {
            if delay == 0 {
                match self.api.login() {
                    Ok(()) => {
                        self.host.connection_state_changed(ConnectionState::Connected);
                        return;
                    }
                    Err(e) => {
                        log::warn!("Login failed: {}", e);
                        self.host.connection_state_changed(ConnectionState::Disconnected);
                        delay = retry_ticks;
                    }
                }
            }
            thread::sleep(self.config.poll_interval());
            delay = delay.saturating_sub(1);
        }
    }

    fn keep_alive_job(&self) {
        if !self.store.keep_running() {
            return;
        }

        log::debug!("keepAlive:: trigger");
        if let Err(e) = self.api.keep_alive() {
            log::warn!("Keepalive failed: {}", e);
            self.login_loop();
        }
    }

    pub(crate) fn load_playlist(&self) -> bool {
        if !self.store.keep_running() {
            return false;
        }

        let root = match self
            .api
            .get_playlist(self.config.stream_quality, self.config.use_h265, self.config.use_adaptive)
        {
            Ok(root) => root,
            Err(e) => {
                log::info!("Cannot get/parse playlist: {}", e);
                return false;
            }
        };

        let playlist = parse_playlist(&root, &self.config);
        let count = playlist.channels.len();
        log::info!("Loaded {} channels.", count);
        self.host.notify(&format!("{} channels loaded.", count));

        if self.store.publish_playlist(playlist.channels, playlist.groups) {
            self.host.channels_changed();
            self.host.channel_groups_changed();
        }
        true
    }

    fn trigger_full_refresh(&self) {
        log::info!("Triggering channels/EPG full refresh");
        self.epg_state.borrow_mut().reset();

        let (future_days, past_days) = self.store.epg_max_days();
        self.store.set_epg_max_days(future_days, past_days, unix_now());
        self.load_playlist();
    }

    pub(crate) fn load_recordings_job(&self) -> bool {
        if !self.store.keep_running() || !self.store.take_load_recordings() {
            return false;
        }
        self.load_recordings();
        true
    }

    pub(crate) fn load_recordings(&self) -> bool {
        let root = match self.api.get_pvr() {
            Ok(root) => root,
            Err(e) => {
                log::info!("Cannot parse recordings: {}", e);
                return false;
            }
        };

        let channels = self.store.channels();
        let locked_label = self.host.localized(LocalizedString::Locked);
        let listing = parse_pvr(&root, &channels, &locked_label, unix_now());

        let old_recordings = self.store.recordings();
        let old_timers = self.store.timers();

        let mut recordings = listing.recordings;
        inherit_streams(&mut recordings, &old_recordings);
        let recordings_changed = recordings_changed(&old_recordings, &recordings);
        if recordings_changed {
            for recording in recordings.iter_mut() {
                match self.api.get_recording_url(&recording.record_id) {
                    Ok(stream) => {
                        recording.stream_url = stream.url;
                        recording.stream_type = channel_stream_type(&channels, &stream.channel);
                    }
                    Err(e) => log::warn!("Cannot resolve recording {}: {}", recording.record_id, e),
                }
            }
        }

        let timers = listing.timers;
        let timers_changed = timers_changed(&old_timers, &timers);

        self.store.publish_recordings(
            recordings_changed.then_some(recordings),
            timers_changed.then_some(timers),
            listing.drive_space,
        );

        if recordings_changed {
            self.host.recordings_changed();
        }
        if timers_changed {
            self.host.timers_changed();
        }
        true
    }

    /// One step of filling the EPG window followed by releasing what fell
    /// out of it. Returns whether new data was loaded.
    pub(crate) fn load_epg_job(&self) -> bool {
        log::debug!("Checking if EPG loading is needed");
        if !self.store.keep_running() {
            return false;
        }

        let (window_min, window_max) = self.store.epg_window();
        let next = self
            .epg_state
            .borrow()
            .next_load(unix_now(), window_min, window_max, epg::prague_day_start);

        let updated = match next {
            Some(load) => self.load_epg(load),
            None => false,
        };

        if self.store.keep_running() {
            self.release_unneeded_epg();
        }
        updated
    }

    fn load_epg(&self, load: EpgLoad) -> bool {
        let state = *self.epg_state.borrow();
        log::debug!(
            "EPG last start {}, start {}, last end {}, end {}",
            epg::format_datetime(state.last_start),
            epg::format_datetime(load.start),
            epg::format_datetime(state.last_end),
            epg::format_datetime(load.end)
        );
        if state.covers(&load) {
            return false;
        }

        let root = match self.api.get_epg(load.start, load.small_step, "") {
            Ok(root) => root,
            Err(e) => {
                log::info!("Cannot parse EPG data. EPG not loaded: {}", e);
                self.epg_state.borrow_mut().loaded = true;
                return false;
            }
        };

        let (window_min, window_max) = self.store.epg_window();
        self.epg_state.borrow_mut().extend(&load, window_min, window_max);

        let parsed = parse_epg_response(&root, &self.store.channels());
        let changes = self.store.update_epg(|map| {
            let mut changes = Vec::new();
            for (channel_id, entries) in parsed {
                changes.extend(merge_entries(map, &channel_id, entries));
            }
            changes
        });

        for change in &changes {
            self.host.epg_event(&change.entry, change.state);
        }
        log::info!("EPG Loaded.");
        true
    }

    fn release_unneeded_epg(&self) {
        let (window_min, window_max) = self.store.epg_window();
        log::debug!(
            "Releasing EPG outside {} - {}",
            epg::format_datetime(window_min),
            epg::format_datetime(window_max)
        );

        let removed = self.store.update_epg(|map| release_outside(map, window_min, window_max));
        for change in &removed {
            self.host.epg_event(&change.entry, change.state);
        }

        self.epg_state.borrow_mut().clip(window_min, window_max);
    }

    #[cfg(test)]
    pub(crate) fn epg_state(&self) -> EpgLoadState {
        *self.epg_state.borrow()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
