use std::{io, time::Duration};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use ureq::{Agent, AgentBuilder};

use crate::{utils::progress_bar, Visit};

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

impl Location {
    fn unresolved(address: &str) -> Self {
        Location {
            lat: 0.0,
            lng: 0.0,
            address: address.to_string(),
        }
    }
}

pub trait Geocoder {
    fn lookup(&self, address: &str) -> Result<Location>;
}

/// Geocoder speaking the Google geocoding JSON API over plain blocking HTTP.
pub struct HttpGeocoder {
    agent: Agent,
    url: String,
    key: Option<String>,
}

impl HttpGeocoder {
    pub fn new(url: &str, key: Option<String>, timeout: Option<Duration>) -> Self {
        let mut agent = AgentBuilder::new().user_agent(concat!(
            "travelmap/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            agent = agent.timeout(timeout);
        }

        HttpGeocoder {
            agent: agent.build(),
            url: url.to_string(),
            key,
        }
    }
}

impl Geocoder for HttpGeocoder {
    fn lookup(&self, address: &str) -> Result<Location> {
        let mut request = self.agent.get(&self.url).query("address", address);
        if let Some(key) = &self.key {
            request = request.query("key", key);
        }

        let response = match request.call() {
            Ok(x) => x,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!("geocoder returned HTTP {code}: {}", body.trim());
            }
            Err(err) => return Err(err).context("geocoder request failed"),
        };

        let response: GeocodeResponse = match response.into_json() {
            Ok(x) => x,
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                return Err(err).context("unexpected geocoder response")
            }
            Err(err) => return Err(err).context("failed to read geocoder response"),
        };
        first_result(response)
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    results: Vec<GeocodeResult>,
    status: Option<String>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn first_result(response: GeocodeResponse) -> Result<Location> {
    // later results are ignored, the service already ranks them
    let Some(first) = response.results.into_iter().next() else {
        let status = response.status.as_deref().unwrap_or("no status");
        match response.error_message {
            Some(message) => bail!("no results ({status}): {message}"),
            None => bail!("no results ({status})"),
        }
    };

    Ok(Location {
        lat: first.geometry.location.lat,
        lng: first.geometry.location.lng,
        address: first.formatted_address,
    })
}

/// Looks up `address`, falling back to the `(0, 0)` sentinel and the
/// original address on any failure.
pub fn resolve(geocoder: &dyn Geocoder, address: &str) -> Location {
    match geocoder.lookup(address) {
        Ok(x) => {
            debug!("Geocoded {address:?} to {:?} ({}, {})", x.address, x.lat, x.lng);
            x
        }
        Err(err) => {
            warn!("Failed to geocode {address:?}: {err:#}");
            Location::unresolved(address)
        }
    }
}

/// Fills in coordinates for every visit still at the sentinel. Returns how
/// many are left unresolved afterwards.
pub fn resolve_missing(visits: &mut [Visit], geocoder: &dyn Geocoder) -> usize {
    let missing: Vec<_> = visits.iter_mut().filter(|x| x.is_unresolved()).collect();
    if missing.is_empty() {
        return 0;
    }

    info!("Geocoding {} addresses...", missing.len());
    let progress = progress_bar(missing.len() as u64);
    let mut failed = 0;
    for visit in missing {
        progress.set_message(visit.address.clone());
        let location = resolve(geocoder, &visit.address);
        visit.fill(location);
        if visit.is_unresolved() {
            failed += 1;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    failed
}

impl Visit {
    fn fill(&mut self, location: Location) {
        if !self.is_unresolved() {
            return;
        }
        self.point.set_y(location.lat);
        self.point.set_x(location.lng);
        self.address = location.address;
    }
}
