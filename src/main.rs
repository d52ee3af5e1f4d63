use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use itertools::Itertools;
use log::{info, warn};

use crate::{
    color::ColorAssigner,
    geocode::{HttpGeocoder, GOOGLE_GEOCODE_URL},
    geojson::FeatureCollection,
    normalize::DedupKey,
    visit::Visit,
};

mod color;
mod geocode;
mod geojson;
mod normalize;
mod records;
mod utils;
mod visit;

/// Turn a CSV of visits (date, purpose, address, lat, lng) into GeoJSON
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Record file, rewritten in place in canonical form
    #[arg(long, default_value = "travel.csv")]
    file: PathBuf,

    /// Look up coordinates for rows that have none
    #[arg(long)]
    geocode: bool,

    /// Key sent with every geocoding request
    #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Geocoding endpoint, answering in the Google geocoding JSON format
    #[arg(long, default_value = GOOGLE_GEOCODE_URL)]
    geocode_url: String,

    /// Seconds to wait on each geocoding request
    #[arg(long)]
    geocode_timeout: Option<u64>,

    /// Coordinates compared when dropping duplicate visits
    #[arg(long, value_enum, default_value_t)]
    dedup_key: DedupKey,

    /// Only write date and name properties
    #[arg(long)]
    plain: bool,

    /// Skip the per-purpose GeoJSON files
    #[arg(long)]
    no_partition: bool,

    /// Leave the record file untouched
    #[arg(long)]
    no_rewrite: bool,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .format_timestamp(None)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let mut visits = records::read(&cli.file)?;
    info!("Read {} visits from {}", visits.len(), cli.file.display());

    if cli.geocode {
        if cli.api_key.is_none() {
            warn!("No API key set, the geocoder will likely refuse requests");
        }
        let geocoder = HttpGeocoder::new(
            &cli.geocode_url,
            cli.api_key.clone(),
            cli.geocode_timeout.map(Duration::from_secs),
        );
        let failed = geocode::resolve_missing(&mut visits, &geocoder);
        if failed > 0 {
            warn!("{failed} visits are still missing coordinates");
        }
    }

    let total = visits.len();
    let mut visits = normalize::dedup(visits, cli.dedup_key);
    normalize::sort(&mut visits);
    if visits.len() < total {
        info!("Dropped {} duplicate visits", total - visits.len());
    }

    if !cli.no_rewrite {
        records::write(&cli.file, &visits)?;
    }

    // shared between every output so a year keeps its color across files
    let mut assigner = ColorAssigner::new();
    let mut colors = (!cli.plain).then_some(&mut assigner);

    let primary = records::geojson_path(&cli.file);
    let collection = FeatureCollection::new(&visits, colors.as_deref_mut());
    records::write_collection(&primary, &collection)?;
    info!(
        "Wrote {} features to {}",
        collection.features.len(),
        primary.display()
    );

    if !cli.no_partition {
        let groups = normalize::partition(&visits);
        for (purpose, group) in &groups {
            let path = records::partition_path(&primary, purpose);
            let collection = FeatureCollection::new(group.iter().copied(), colors.as_deref_mut());
            records::write_collection(&path, &collection)?;
        }
        info!(
            "Wrote {} purpose files: {}",
            groups.len(),
            groups.keys().map(|x| format!("{x:?}")).join(", ")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, net::TcpListener, path::Path};

    use assert_fs::{prelude::*, TempDir};
    use clap::CommandFactory;
    use serde_json::Value;

    use super::*;

    fn run_command(args: &[&str]) -> Result<()> {
        let cli = Cli::try_parse_from(["travelmap"].iter().chain(args))?;
        run(&cli)
    }

    fn features(path: &Path) -> Vec<Value> {
        let value: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        value["features"].as_array().unwrap().clone()
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["travelmap"]).unwrap();
        assert_eq!(cli.file, PathBuf::from("travel.csv"));
        assert_eq!(cli.dedup_key, DedupKey::Latitude);
        assert_eq!(cli.geocode_url, GOOGLE_GEOCODE_URL);
        assert!(!cli.geocode && !cli.plain && !cli.no_partition && !cli.no_rewrite);

        let cli = Cli::try_parse_from(["travelmap", "--dedup-key", "coordinates"]).unwrap();
        assert_eq!(cli.dedup_key, DedupKey::Coordinates);
    }

    #[test]
    fn every_flag_is_described() {
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("Key sent with every geocoding request"), "{help}");
        assert!(help.contains("Geocoding endpoint"), "{help}");
    }

    #[test]
    fn duplicate_visits_collapse() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.child("travel.csv");
        file.write_str(concat!(
            "2020-06-15,museum,123 Main St,40.0000,-75.0000\n",
            "2020-01-01,museum,123 Main St,40.0000,-75.0000\n",
        ))?;

        run_command(&["--file", file.path().to_str().unwrap()])?;

        let primary = features(dir.child("travel.geojson").path());
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0]["properties"]["date"], "2020-06-15");
        assert_eq!(primary[0]["properties"]["marker-symbol"], "museum");
        assert_eq!(primary[0]["geometry"]["coordinates"], serde_json::json!([-75.0, 40.0]));

        assert_eq!(features(dir.child("museum-travel.geojson").path()).len(), 1);
        file.assert("2020-06-15,museum,123 Main St,40.0000,-75.0000\n");
        Ok(())
    }

    #[test]
    fn partitions_and_sorting() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.child("trips.csv");
        file.write_str(concat!(
            "2021-02-01,food,Diner,10.5,20.5\n",
            "2019-05-05,museum,Louvre,48.8606,2.3376\n",
            "2021-02-01,food,Cafe,11.5,21.5\n",
            "2020-01-01,,Home,12.5,22.5\n",
            "broken row\n",
        ))?;

        run_command(&[
            "--file",
            file.path().to_str().unwrap(),
            "--dedup-key",
            "coordinates",
        ])?;

        file.assert(concat!(
            "2019-05-05,museum,Louvre,48.8606,2.3376\n",
            "2020-01-01,,Home,12.5000,22.5000\n",
            "2021-02-01,food,Cafe,11.5000,21.5000\n",
            "2021-02-01,food,Diner,10.5000,20.5000\n",
        ));

        let primary = features(dir.child("trips.geojson").path());
        let names: Vec<_> = primary
            .iter()
            .map(|x| x["properties"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Louvre", "Home", "Cafe", "Diner"]);

        let food = features(dir.child("food-trips.geojson").path());
        assert_eq!(food.len(), 2);
        // same year, same color, in every file
        assert_eq!(
            food[0]["properties"]["marker-color"],
            primary[2]["properties"]["marker-color"]
        );
        assert_eq!(features(dir.child("museum-trips.geojson").path()).len(), 1);
        assert_eq!(features(dir.child("-trips.geojson").path()).len(), 1);
        Ok(())
    }

    #[test]
    fn plain_output_without_partitions() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.child("travel.csv");
        file.write_str("2020-01-01,museum,123 Main St,40.12345,-75.12345\n")?;

        run_command(&[
            "--file",
            file.path().to_str().unwrap(),
            "--plain",
            "--no-partition",
            "--no-rewrite",
        ])?;

        let primary = features(dir.child("travel.geojson").path());
        assert_eq!(
            primary[0]["properties"],
            serde_json::json!({ "date": "2020-01-01", "name": "123 Main St" })
        );
        assert_eq!(
            primary[0]["geometry"]["coordinates"],
            serde_json::json!([-75.1234, 40.1234])
        );
        assert!(!dir.child("museum-travel.geojson").path().exists());
        file.assert("2020-01-01,museum,123 Main St,40.12345,-75.12345\n");
        Ok(())
    }

    #[test]
    fn geocoding_failure_is_not_fatal() -> Result<()> {
        let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
        let dir = TempDir::new()?;
        let file = dir.child("travel.csv");
        file.write_str("2020-01-01,work,Nowhere In Particular,,\n")?;

        run_command(&[
            "--file",
            file.path().to_str().unwrap(),
            "--geocode",
            "--api-key",
            "test",
            "--geocode-url",
            &format!("http://127.0.0.1:{port}/"),
        ])?;

        file.assert("2020-01-01,work,Nowhere In Particular,0.0000,0.0000\n");
        assert_eq!(features(dir.child("travel.geojson").path()).len(), 1);
        Ok(())
    }

    #[test]
    fn missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(run_command(&["--file", path.to_str().unwrap()]).is_err());
        assert!(!dir.path().join("absent.geojson").exists());
    }
}
