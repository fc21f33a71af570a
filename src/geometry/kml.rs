//! Minimal KML placemark reader

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use super::PointFeature;
use crate::error::GeometryError;

/// Extracts every `Placemark/.../Point/coordinates` as a point feature
///
/// The placemark `<name>`, when present, becomes the `name` property.
pub fn parse_points(text: &str) -> Result<Vec<PointFeature>, GeometryError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut features = Vec::new();
    let mut in_placemark = false;
    let mut name: Option<String> = None;
    let mut coordinates: Vec<(f64, f64)> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if tag == "Placemark" {
                    in_placemark = true;
                    name = None;
                    coordinates.clear();
                }
                path.push(tag);
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("Placemark") {
                    in_placemark = false;
                    for &(lon, lat) in &coordinates {
                        let mut properties = Map::new();
                        if let Some(name) = &name {
                            properties.insert("name".to_string(), Value::String(name.clone()));
                        }
                        features.push(PointFeature::new(lon, lat, properties));
                    }
                }
            }
            Ok(Event::Text(t)) if in_placemark => {
                let text = t
                    .unescape()
                    .map_err(|e| GeometryError::Parse(format!("invalid KML text: {}", e)))?;
                match path.last().map(String::as_str) {
                    Some("name") if path.len() >= 2 && path[path.len() - 2] == "Placemark" => {
                        name = Some(text.into_owned());
                    }
                    Some("coordinates") if path.len() >= 2 && path[path.len() - 2] == "Point" => {
                        coordinates.push(parse_coordinate(&text)?);
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(GeometryError::Parse(format!(
                    "KML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(features)
}

/// Parses `lon,lat[,alt]`
fn parse_coordinate(text: &str) -> Result<(f64, f64), GeometryError> {
    let mut parts = text.trim().split(',').map(|p| p.trim().parse::<f64>());
    match (parts.next(), parts.next()) {
        (Some(Ok(lon)), Some(Ok(lat))) => Ok((lon, lat)),
        _ => Err(GeometryError::Parse(format!(
            "invalid KML point coordinates '{}'",
            text.trim()
        ))),
    }
}
