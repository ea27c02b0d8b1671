//! Status banner: pure mapping from connectivity state to a display decision

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::{ConnectionSpeed, ConnectivityState};

/// What the status banner should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Banner {
    Hidden,
    OfflineWarning,
    SlowConnectionNotice,
}

impl Banner {
    /// User-facing text, `None` when nothing is shown
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Banner::Hidden => None,
            Banner::OfflineWarning => {
                Some("You are offline. Check your internet connection to keep playing.")
            }
            Banner::SlowConnectionNotice => {
                Some("Your connection is slow. Live odds and games may update with a delay.")
            }
        }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Banner::Hidden => write!(f, "Hidden"),
            Banner::OfflineWarning => write!(f, "OfflineWarning"),
            Banner::SlowConnectionNotice => write!(f, "SlowConnectionNotice"),
        }
    }
}

/// Decide what the banner shows for a reading.
///
/// Offline wins over any speed value. `Hidden` is reserved for an online
/// fast link; an online link of unknown quality is treated as slow.
pub fn render(state: &ConnectivityState) -> Banner {
    if !state.is_online {
        return Banner::OfflineWarning;
    }
    match state.connection_speed {
        ConnectionSpeed::Fast => Banner::Hidden,
        ConnectionSpeed::Slow | ConnectionSpeed::Unknown => Banner::SlowConnectionNotice,
    }
}
