//! Callbacks into the host application
//!
//! The engine never talks to a UI directly. Change notifications, the PIN
//! dialog and localized labels all go through [`PvrHost`].

use crate::models::EpgEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpgEventState {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Strings the host may translate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalizedString {
    /// Directory prefix for locked recordings
    Locked,
    /// Heading of the PIN dialog
    EnterPin,
}

impl LocalizedString {
    pub fn english(&self) -> &'static str {
        match self {
            LocalizedString::Locked => "Locked",
            LocalizedString::EnterPin => "Enter PIN",
        }
    }
}

pub trait PvrHost: Send + Sync {
    fn localized(&self, string: LocalizedString) -> String {
        string.english().to_string()
    }

    /// Ask the user for the parental PIN. `None` means cancelled.
    fn prompt_pin(&self, _heading: &str) -> Option<String> {
        None
    }

    fn connection_state_changed(&self, state: ConnectionState) {
        log::debug!("connection state: {:?}", state);
    }

    fn channels_changed(&self) {}

    fn channel_groups_changed(&self) {}

    fn recordings_changed(&self) {}

    fn timers_changed(&self) {}

    fn epg_event(&self, _entry: &EpgEntry, _state: EpgEventState) {}

    /// Short informational message for the user
    fn notify(&self, message: &str) {
        log::info!("{}", message);
    }
}

/// Host that only logs; used when nothing is listening.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHost;

impl PvrHost for LogHost {}
