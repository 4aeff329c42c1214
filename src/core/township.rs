use crate::config::toml_config::GeographyPreference;
use crate::core::boundary::BoundarySet;
use crate::domain::model::{GeographyNames, Resolution, TownshipSource};
use crate::domain::ports::{Geocoder, Prompter};
use crate::utils::error::Result;

pub fn pick_geography(
    names: GeographyNames,
    prefer: GeographyPreference,
) -> Option<(String, TownshipSource)> {
    let subdivision = names
        .county_subdivision
        .map(|n| (n, TownshipSource::CountySubdivision));
    let place = names.place.map(|n| (n, TownshipSource::Place));
    match prefer {
        GeographyPreference::CountySubdivision => subdivision.or(place),
        GeographyPreference::Place => place.or(subdivision),
    }
}

pub struct TownshipResolver<'a, G: Geocoder> {
    geocoder: &'a G,
    boundaries: &'a BoundarySet,
    prefer: GeographyPreference,
}

impl<'a, G: Geocoder> TownshipResolver<'a, G> {
    pub fn new(geocoder: &'a G, boundaries: &'a BoundarySet, prefer: GeographyPreference) -> Self {
        Self {
            geocoder,
            boundaries,
            prefer,
        }
    }

    /// Boundary polygons win over the Census answer; any remote failure falls
    /// through to asking the operator.
    pub async fn resolve<P: Prompter + ?Sized>(
        &self,
        address: &str,
        prompter: &mut P,
    ) -> Result<Resolution> {
        let coordinates = match self.geocoder.coordinates(address).await {
            Ok(Some(coords)) => Some(coords),
            Ok(None) => {
                tracing::warn!("Census geocoder found no match for '{}'", address);
                None
            }
            Err(e) => {
                tracing::warn!("Census geocode request failed: {}", e);
                None
            }
        };

        let Some((lon, lat)) = coordinates else {
            prompter.say(&format!("Census geocode failed for address: {}", address));
            return manual(prompter, "Enter the township manually: ", None);
        };
        tracing::debug!("'{}' geocoded to ({}, {})", address, lon, lat);

        if let Some(boundary) = self.boundaries.find(lon, lat) {
            prompter.say(&format!("Township detected from polygon: {}", boundary.name));
            return Ok(Resolution {
                township: boundary.name.clone(),
                source: TownshipSource::Boundary,
                coordinates: Some((lon, lat)),
            });
        }

        match self.geocoder.geographies(lon, lat).await {
            Ok(names) => {
                if let Some((township, source)) = pick_geography(names, self.prefer) {
                    prompter.say(&format!("Township detected from {}: {}", source, township));
                    return Ok(Resolution {
                        township,
                        source,
                        coordinates: Some((lon, lat)),
                    });
                }
                manual(
                    prompter,
                    "Could not determine township from address. Enter the township manually: ",
                    Some((lon, lat)),
                )
            }
            Err(e) => {
                tracing::warn!("Census geography request failed: {}", e);
                manual(prompter, "Enter the township manually: ", Some((lon, lat)))
            }
        }
    }
}

fn manual<P: Prompter + ?Sized>(
    prompter: &mut P,
    question: &str,
    coordinates: Option<(f64, f64)>,
) -> Result<Resolution> {
    let township = loop {
        let answer = prompter.ask(question)?;
        let answer = answer.trim();
        if !answer.is_empty() {
            break answer.to_string();
        }
    };
    prompter.say(&format!("Township entered manually: {}", township));
    Ok(Resolution {
        township,
        source: TownshipSource::Manual,
        coordinates,
    })
}
