use crate::utils::error::{PermitError, Result};
use geo::{BoundingRect, CoordsIter, Geometry, Intersects, Point, Rect};
use geojson::GeoJson;
use std::path::{Path, PathBuf};

/// A municipality outline used to override the Census answer.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub name: String,
    pub geometry: Geometry<f64>,
}

impl Boundary {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.geometry.intersects(&Point::new(lon, lat))
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    pub fn vertex_count(&self) -> usize {
        self.geometry.coords_count()
    }
}

/// Reads a GeoJSON document and keeps the geometry of its first feature.
pub fn load_boundary(name: &str, path: &Path) -> Result<Boundary> {
    let text = std::fs::read_to_string(path)?;
    let document: GeoJson = text.parse()?;

    let geometry = match document {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .next()
            .and_then(|feature| feature.geometry),
        GeoJson::Feature(feature) => feature.geometry,
        GeoJson::Geometry(geometry) => Some(geometry),
    }
    .ok_or_else(|| {
        PermitError::config(
            "boundaries.file",
            format!("{} has no feature geometry", path.display()),
        )
    })?;

    Ok(Boundary {
        name: name.to_string(),
        geometry: Geometry::<f64>::try_from(geometry)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct BoundarySet {
    boundaries: Vec<Boundary>,
}

impl BoundarySet {
    pub fn new(boundaries: Vec<Boundary>) -> Self {
        Self { boundaries }
    }

    /// Loads every boundary it can. Missing or unreadable files are skipped.
    pub fn load<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, PathBuf)>,
    {
        let mut boundaries = Vec::new();
        for (name, path) in entries {
            if !path.is_file() {
                tracing::warn!(
                    "Boundary file not found for {}: {} (skipping)",
                    name,
                    path.display()
                );
                continue;
            }
            match load_boundary(name, &path) {
                Ok(boundary) => boundaries.push(boundary),
                Err(e) => {
                    tracing::warn!(
                        "Failed to load boundary for {} ({}): {}",
                        name,
                        path.display(),
                        e
                    );
                }
            }
        }
        tracing::debug!("Loaded {} boundaries", boundaries.len());
        Self { boundaries }
    }

    /// First boundary, in configuration order, that holds the point.
    pub fn find(&self, lon: f64, lat: f64) -> Option<&Boundary> {
        self.boundaries.iter().find(|b| b.contains(lon, lat))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Boundary> {
        self.boundaries.iter()
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn square_collection(min: (f64, f64), max: (f64, f64)) -> String {
        serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"NAME": "test"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [min.0, min.1], [max.0, min.1], [max.0, max.1], [min.0, max.1], [min.0, min.1]
                    ]]
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn test_point_in_polygon() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("akron.geojson");
        std::fs::write(&path, square_collection((-78.51, 43.01), (-78.48, 43.03))).unwrap();

        let akron = load_boundary("Akron", &path).unwrap();
        assert!(akron.contains(-78.495, 43.02));
        assert!(!akron.contains(-78.80, 42.90));
        assert_eq!(akron.vertex_count(), 5);

        let rect = akron.bounding_rect().unwrap();
        assert_eq!(rect.min().x, -78.51);
        assert_eq!(rect.max().y, 43.03);
    }

    #[test]
    fn test_first_match_in_configuration_order() {
        let dir = TempDir::new().unwrap();
        let outer = dir.path().join("outer.geojson");
        let inner = dir.path().join("inner.geojson");
        std::fs::write(&outer, square_collection((0.0, 0.0), (10.0, 10.0))).unwrap();
        std::fs::write(&inner, square_collection((4.0, 4.0), (6.0, 6.0))).unwrap();

        let set = BoundarySet::load([("Inner", inner.clone()), ("Outer", outer.clone())]);
        assert_eq!(set.find(5.0, 5.0).unwrap().name, "Inner");
        assert_eq!(set.find(1.0, 1.0).unwrap().name, "Outer");
        assert!(set.find(20.0, 20.0).is_none());

        let set = BoundarySet::load([("Outer", outer), ("Inner", inner)]);
        assert_eq!(set.find(5.0, 5.0).unwrap().name, "Outer");
    }

    #[test]
    fn test_missing_and_broken_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("depew.geojson");
        let broken = dir.path().join("sloan.geojson");
        let empty = dir.path().join("derby.geojson");
        std::fs::write(&good, square_collection((0.0, 0.0), (1.0, 1.0))).unwrap();
        std::fs::write(&broken, "{ not json").unwrap();
        std::fs::write(&empty, r#"{"type":"FeatureCollection","features":[]}"#).unwrap();

        let set = BoundarySet::load([
            ("Depew", good),
            ("Sloan", broken),
            ("Derby", empty),
            ("Angola", dir.path().join("angola.geojson")),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().name, "Depew");
    }

    #[test]
    fn test_bare_geometry_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kenmore.geojson");
        std::fs::write(
            &path,
            r#"{"type":"MultiPolygon","coordinates":[[[[0,0],[2,0],[2,2],[0,2],[0,0]]]]}"#,
        )
        .unwrap();
        let kenmore = load_boundary("Kenmore", &path).unwrap();
        assert!(kenmore.contains(1.0, 1.0));
    }
}
