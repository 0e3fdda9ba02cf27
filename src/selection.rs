//! The currently selected operating zone.
use crate::zone::Zone;
use log::info;

/// A change of selected zone, to be passed on to everything that depends on the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneChange {
    /// The zone selected before, if any
    pub previous: Option<Zone>,
    /// The newly selected zone
    pub current: Zone,
}

/// Holds at most one selected zone.
///
/// Starts unselected. Once a zone is selected there is no way back to "unselected" within a
/// session.
#[derive(Debug, Default)]
pub struct ZoneSelection {
    current: Option<Zone>,
}

impl ZoneSelection {
    /// Create an unselected selection
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected zone, if any
    pub fn current(&self) -> Option<Zone> {
        self.current
    }

    /// Select a zone.
    ///
    /// # Returns
    ///
    /// The change to notify dependents of, or `None` if `zone` was already selected
    pub fn select(&mut self, zone: Zone) -> Option<ZoneChange> {
        if self.current == Some(zone) {
            return None;
        }

        let previous = self.current.replace(zone);
        info!("Selected zone {zone}");
        Some(ZoneChange {
            previous,
            current: zone,
        })
    }
}
