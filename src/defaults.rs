//! Resolution of per-zone scenario defaults.
//!
//! Defaults are fetched once per zone and cached for the rest of the session. Each fetch is tagged
//! with a generation; a response is only applied if its generation is still the live one for its
//! zone and that zone is still selected. Moving away from a zone invalidates its outstanding
//! fetch, so a slow response can never overwrite the defaults of a zone selected later.
use crate::client::ClientError;
use crate::scenario::ScenarioDefaults;
use crate::zone::Zone;
use log::debug;
use std::collections::HashMap;

/// Identifies one defaults fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultsTicket {
    /// The zone being fetched
    pub zone: Zone,
    generation: u64,
}

/// The outcome of asking for a zone's defaults
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultsLookup {
    /// The defaults were already known
    Cached(ScenarioDefaults),
    /// A fetch for this zone is already outstanding
    InFlight,
    /// The defaults must be fetched
    Fetch(DefaultsTicket),
}

/// Caches zone defaults and discards stale fetches
#[derive(Debug, Default)]
pub struct DefaultsResolver {
    cache: HashMap<Zone, ScenarioDefaults>,
    /// Live fetch generation for each zone with a fetch outstanding
    pending: HashMap<Zone, u64>,
    current: Option<Zone>,
    next_generation: u64,
}

impl DefaultsResolver {
    /// Create a resolver with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached defaults for a zone, if any
    pub fn cached(&self, zone: Zone) -> Option<&ScenarioDefaults> {
        self.cache.get(&zone)
    }

    /// Whether a fetch for `zone` is outstanding
    pub fn is_pending(&self, zone: Zone) -> bool {
        self.pending.contains_key(&zone)
    }

    /// Ask for the defaults of `zone`, which becomes the zone whose defaults are wanted
    pub fn load_defaults(&mut self, zone: Zone) -> DefaultsLookup {
        self.current = Some(zone);

        if let Some(defaults) = self.cache.get(&zone) {
            return DefaultsLookup::Cached(defaults.clone());
        }
        if self.is_pending(zone) {
            return DefaultsLookup::InFlight;
        }

        self.next_generation += 1;
        self.pending.insert(zone, self.next_generation);
        debug!("Fetching defaults for {zone} (generation {})", self.next_generation);

        DefaultsLookup::Fetch(DefaultsTicket {
            zone,
            generation: self.next_generation,
        })
    }

    /// Invalidate any outstanding fetch for a zone that is no longer selected
    pub fn invalidate(&mut self, zone: Zone) {
        if let Some(generation) = self.pending.remove(&zone) {
            debug!("Invalidated defaults fetch for {zone} (generation {generation})");
        }
        if self.current == Some(zone) {
            self.current = None;
        }
    }

    /// Apply the outcome of a fetch.
    ///
    /// # Returns
    ///
    /// The outcome if it is for the zone currently wanted, or `None` if the fetch was stale and has
    /// been discarded
    pub fn complete(
        &mut self,
        ticket: DefaultsTicket,
        result: Result<ScenarioDefaults, ClientError>,
    ) -> Option<Result<ScenarioDefaults, ClientError>> {
        let live = self.pending.get(&ticket.zone) == Some(&ticket.generation);
        if !live || self.current != Some(ticket.zone) {
            debug!(
                "Discarding stale defaults for {} (generation {})",
                ticket.zone, ticket.generation
            );
            return None;
        }

        self.pending.remove(&ticket.zone);
        if let Ok(defaults) = &result {
            self.cache.insert(ticket.zone, defaults.clone());
        }

        Some(result)
    }
}
