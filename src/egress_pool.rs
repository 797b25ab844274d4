//! The egress pool is the list of alternate addresses a TCP session falls back to when its
//! destination doesn't answer. It is fetched the first time some session needs it and then kept
//! for the life of the process; only an empty pool is fetched again.
//!
//! The fetched list has one candidate per line, as comma-separated fields. The first field is the
//! address, and the second a country code that the `Countries` setting may filter on.

use std::{cell::RefCell, rc::Rc};

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::{
    settings::{Settings, COUNTRIES_KEY, PROXIES_URI_KEY},
    upstream::Upstream,
};

pub struct EgressPool {
    candidates: RefCell<Rc<[String]>>,
}

impl EgressPool {
    pub fn new() -> Self {
        Self {
            candidates: RefCell::new(Rc::from([])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.borrow().is_empty()
    }

    /// Fetches and filters the candidate list, unless the pool already has candidates. Failures
    /// are logged and leave the pool empty.
    ///
    /// Several sessions may fetch at once; the list is swapped in whole, so the pool always holds
    /// the result of exactly one fetch.
    pub async fn populate_if_empty<U: Upstream>(&self, upstream: &U, settings: &Settings) {
        if !self.is_empty() {
            return;
        }

        let uri = match settings.get(PROXIES_URI_KEY) {
            Some(uri) if !uri.trim().is_empty() => uri.trim(),
            _ => {
                debug!("No {PROXIES_URI_KEY} setting, the egress pool stays empty");
                return;
            }
        };

        let text = match upstream.fetch_text(uri).await {
            Ok(text) => text,
            Err(error) => {
                warn!("Could not fetch egress candidates from {uri}: {error}");
                return;
            }
        };

        let countries = parse_countries(settings.get(COUNTRIES_KEY).unwrap_or_default());
        let candidates = filter_candidates(&text, &countries);
        info!("Loaded {} egress candidates from {uri}", candidates.len());

        if self.is_empty() {
            *self.candidates.borrow_mut() = candidates.into();
        }
    }

    /// Picks a candidate uniformly at random.
    pub fn pick_random(&self) -> Option<String> {
        let candidates = Rc::clone(&self.candidates.borrow());
        candidates.choose(&mut rand::thread_rng()).cloned()
    }
}

impl Default for EgressPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits the comma-separated country allow-list, ignoring blank entries.
pub fn parse_countries(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|country| !country.is_empty())
        .map(String::from)
        .collect()
}

/// Turns the fetched list into candidate addresses. Blank lines are skipped, and if `countries`
/// isn't empty only lines whose second field is one of them are kept.
pub fn filter_candidates(text: &str, countries: &[String]) -> Vec<String> {
    text.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            countries.is_empty()
                || line
                    .split(',')
                    .nth(1)
                    .is_some_and(|country| countries.iter().any(|c| c == country.trim()))
        })
        .filter_map(|line| line.split(',').next())
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(String::from)
        .collect()
}
