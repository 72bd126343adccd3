//! Point extraction for the Geospatial Map view.

use serde_json::{json, Value};

use crate::table::{parse_number, Table};
use crate::types::{AppError, AppResult};

pub const MAX_POINTS: usize = 5000;

const LATITUDE_NAMES: &[&str] = &["lat", "latitude"];
const LONGITUDE_NAMES: &[&str] = &["lon", "lng", "long", "longitude"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateColumns {
    pub latitude: usize,
    pub longitude: usize,
}

fn find_column(table: &Table, names: &[&str]) -> Option<usize> {
    table
        .columns
        .iter()
        .position(|c| names.contains(&c.trim().to_lowercase().as_str()))
}

pub fn detect_coordinates(table: &Table) -> Option<CoordinateColumns> {
    Some(CoordinateColumns {
        latitude: find_column(table, LATITUDE_NAMES)?,
        longitude: find_column(table, LONGITUDE_NAMES)?,
    })
}

fn valid_point(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// GeoJSON FeatureCollection of the rows with valid coordinates. Every other
/// column goes into the feature properties.
pub fn to_geojson(dataset: &str, table: &Table) -> AppResult<Value> {
    let coords = detect_coordinates(table).ok_or_else(|| {
        AppError::InvalidRequest(format!(
            "{} has no latitude/longitude columns",
            dataset
        ))
    })?;

    let mut features = Vec::new();
    let mut skipped = 0usize;
    for row in &table.rows {
        let lat = row.get(coords.latitude).and_then(|v| parse_number(v));
        let lon = row.get(coords.longitude).and_then(|v| parse_number(v));
        let (Some(lat), Some(lon)) = (lat, lon) else {
            skipped += 1;
            continue;
        };
        if !valid_point(lat, lon) {
            skipped += 1;
            continue;
        }
        if features.len() >= MAX_POINTS {
            skipped += 1;
            continue;
        }

        let properties: serde_json::Map<String, Value> = table
            .columns
            .iter()
            .zip(row)
            .enumerate()
            .filter(|(idx, _)| *idx != coords.latitude && *idx != coords.longitude)
            .map(|(_, (name, value))| (name.clone(), Value::String(value.clone())))
            .collect();

        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [lon, lat] },
            "properties": properties,
        }));
    }

    if skipped > 0 {
        tracing::debug!(dataset, skipped, "Rows skipped for map");
    }

    Ok(json!({
        "type": "FeatureCollection",
        "dataset": dataset,
        "features": features,
        "skipped": skipped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_coordinates_case_insensitive() {
        let table = Table::parse_csv("Name,Latitude,LNG\na,1,2\n").unwrap();
        assert_eq!(
            detect_coordinates(&table),
            Some(CoordinateColumns { latitude: 1, longitude: 2 })
        );
        let none = Table::parse_csv("name,x,y\na,1,2\n").unwrap();
        assert_eq!(detect_coordinates(&none), None);
    }

    #[test]
    fn test_geojson_skips_invalid_rows() {
        let table = Table::parse_csv(
            "city,lat,lon\nParis,48.85,2.35\nNowhere,,\nBad,123,0\nLima,-12.05,-77.04\n",
        )
        .unwrap();
        let geo = to_geojson("cities.csv", &table).unwrap();
        let features = geo["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(geo["skipped"], 2);
        assert_eq!(features[0]["geometry"]["coordinates"], json!([2.35, 48.85]));
        assert_eq!(features[1]["properties"]["city"], "Lima");
        assert!(features[0]["properties"].get("lat").is_none());
    }

    #[test]
    fn test_geojson_requires_coordinates() {
        let table = Table::parse_csv("id,amount\n1,2\n").unwrap();
        assert!(matches!(
            to_geojson("sales.csv", &table),
            Err(AppError::InvalidRequest(_))
        ));
    }
}
