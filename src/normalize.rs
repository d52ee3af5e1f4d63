use std::collections::{BTreeMap, HashSet};

use clap::ValueEnum;
use log::debug;

use crate::Visit;

/// Which rounded coordinates make two visits the same place.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DedupKey {
    /// Latitude twice, so only latitude is compared. Kept as the default to
    /// match existing record files; it merges distinct places that happen to
    /// share a latitude.
    #[default]
    Latitude,
    /// Latitude and longitude.
    Coordinates,
}

impl DedupKey {
    fn key(&self, visit: &Visit) -> String {
        match self {
            Self::Latitude => format!("{:.4},{:.4}", visit.lat(), visit.lat()),
            Self::Coordinates => format!("{:.4},{:.4}", visit.lat(), visit.lng()),
        }
    }
}

/// Keeps the first visit for each key, dropping later ones outright.
pub fn dedup(visits: Vec<Visit>, key: DedupKey) -> Vec<Visit> {
    let mut seen = HashSet::new();
    visits
        .into_iter()
        .filter(|visit| {
            let fresh = seen.insert(key.key(visit));
            if !fresh {
                debug!("Dropping duplicate visit {visit}");
            }
            fresh
        })
        .collect()
}

pub fn sort(visits: &mut [Visit]) {
    visits.sort_by(|a, b| a.when.cmp(&b.when).then_with(|| a.address.cmp(&b.address)));
}

/// Splits visits by exact purpose, keeping each group in input order.
pub fn partition(visits: &[Visit]) -> BTreeMap<&str, Vec<&Visit>> {
    let mut output: BTreeMap<&str, Vec<&Visit>> = BTreeMap::new();
    for visit in visits {
        output.entry(&visit.purpose).or_default().push(visit);
    }
    output
}
