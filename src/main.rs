//! sledovanitv-pvr - headless PVR backend
//! Logs in, mirrors channels, EPG and recordings, and prints a summary.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sledovanitv_pvr::engine::CHANNELS_TIMEOUT;
use sledovanitv_pvr::host::{ConnectionState, EpgEventState, PvrHost};
use sledovanitv_pvr::models::EpgEntry;
use sledovanitv_pvr::{AddonConfig, Data};

const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

/// Host backed by the terminal
struct ConsoleHost;

impl PvrHost for ConsoleHost {
    fn prompt_pin(&self, heading: &str) -> Option<String> {
        print!("{}: ", heading);
        io::stdout().flush().ok()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let pin = line.trim();
        (!pin.is_empty()).then(|| pin.to_string())
    }

    fn connection_state_changed(&self, state: ConnectionState) {
        match state {
            ConnectionState::Connected => log::info!("Connected"),
            ConnectionState::Disconnected => log::warn!("Disconnected, retrying login"),
        }
    }

    fn channels_changed(&self) {
        log::info!("Channel list changed");
    }

    fn recordings_changed(&self) {
        log::info!("Recordings changed");
    }

    fn timers_changed(&self) {
        log::info!("Timers changed");
    }

    fn epg_event(&self, entry: &EpgEntry, state: EpgEventState) {
        log::trace!("EPG {:?}: {} ({})", state, entry.title, entry.event_id);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AddonConfig::load();
    if config.user_name.is_empty() || config.password.is_empty() {
        log::warn!("No credentials configured, login will fail until user_name and password are set");
    }
    log::info!("Using {} ({:?} quality)", config.service_provider.label(), config.stream_quality);

    let data = Data::new(config, Arc::new(ConsoleHost));
    log::info!("{}", data.backend_name());

    if !data.wait_for_channels(CHANNELS_TIMEOUT) {
        log::warn!("No channels yet, still loading in the background");
    }

    loop {
        let tv = data.channels(false).len();
        let radio = data.channels(true).len();
        let epg = data.epg();
        let events: usize = epg.values().map(|channel| channel.entries.len()).sum();
        let space = data.drive_space();

        log::info!(
            "{} TV / {} radio channels, {} groups, {} EPG events, {} recordings, {} timers, {} of {} KiB used",
            tv,
            radio,
            data.channel_groups_amount(),
            events,
            data.recordings_amount(),
            data.timers_amount(),
            space.used,
            space.total
        );

        thread::sleep(SUMMARY_INTERVAL);
    }
}
