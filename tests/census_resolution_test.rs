use anyhow::Result;
use httpmock::prelude::*;
use permit_desk::config::toml_config::{BoundaryEntry, GeographyPreference};
use permit_desk::domain::model::SpecialRule;
use permit_desk::utils::prompt::ScriptedPrompter;
use permit_desk::{AppConfig, BoundarySet, CensusGeocoder, FeeOutcome, FeeTable, PermitDesk};
use serde_json::json;
use tempfile::TempDir;

const FEE_TABLE: &str = "\
Township,Furnace_Cost,AC_New_Cost,AC_Replace_Cost,Boiler_Cost,FAC_Cost,Separate,Special_Calc
Clarence town,60,45,30,55,0,yes,
Williamsville,40,0,0,40,0,,
Hamburg town,0,0,0,0,0,,yes
";

struct Office {
    _dir: TempDir,
    config: AppConfig,
    table: FeeTable,
}

fn office(server: &MockServer, boundaries: Vec<BoundaryEntry>) -> Result<Office> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("Permit_fee_check.txt"), FEE_TABLE)?;

    let mut config = AppConfig::default();
    config.paths.base_dir = dir.path().to_path_buf();
    config.geocoder.base_url = server.url("/geocoder");
    config.boundaries = boundaries;

    let table = FeeTable::from_path(config.fee_table())?;
    Ok(Office {
        _dir: dir,
        config,
        table,
    })
}

fn address_match(lon: f64, lat: f64) -> serde_json::Value {
    json!({
        "result": {
            "input": {"address": {"address": "ignored"}},
            "addressMatches": [{
                "matchedAddress": "ignored",
                "coordinates": {"x": lon, "y": lat}
            }]
        }
    })
}

fn geographies(county_subdivision: &str, place: &str) -> serde_json::Value {
    json!({
        "result": {
            "geographies": {
                "County Subdivisions": [{"NAME": county_subdivision}],
                "Places": [{"NAME": place}]
            }
        }
    })
}

#[tokio::test]
async fn test_quote_from_county_subdivision() -> Result<()> {
    let server = MockServer::start_async().await;
    let locate = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/geocoder/locations/onelineaddress")
                .query_param("address", "8 Sheridan Dr, Clarence, NY 14031")
                .query_param("benchmark", "Public_AR_Current")
                .query_param("format", "json");
            then.status(200).json_body(address_match(-78.59, 43.01));
        })
        .await;
    let lookup = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/geocoder/geographies/coordinates")
                .query_param("vintage", "Current_Current");
            then.status(200)
                .json_body(geographies("Clarence town", "Clarence Center CDP"));
        })
        .await;

    let office = office(&server, Vec::new())?;
    let geocoder = CensusGeocoder::new(office.config.geocoder.clone())?;
    let boundaries = BoundarySet::default();
    let desk = PermitDesk::new(&office.config, &office.table, &boundaries, &geocoder);

    // FAC with differing AC costs on a "separate" row: furnace + chosen AC.
    let mut prompter = ScriptedPrompter::new(["FAC", "R"]);
    let outcome = desk
        .fee("8 Sheridan Dr, Clarence, NY 14031", &mut prompter)
        .await?;

    locate.assert_async().await;
    lookup.assert_async().await;

    let FeeOutcome::Quote(quote) = outcome else {
        panic!("expected a quote");
    };
    assert_eq!(quote.township, "Clarence town");
    assert_eq!(quote.price, 90.0);
    assert!(quote.permit_required);
    assert!(prompter.said("Township detected from Census county subdivision: Clarence town"));
    assert!(prompter.said("Permit price: $90.00"));
    Ok(())
}

#[tokio::test]
async fn test_boundary_polygon_skips_geography_lookup() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/geocoder/locations/onelineaddress");
            then.status(200).json_body(address_match(-78.737, 42.963));
        })
        .await;
    let lookup = server
        .mock_async(|when, then| {
            when.method(GET).path("/geocoder/geographies/coordinates");
            then.status(200)
                .json_body(geographies("Amherst town", "Williamsville village"));
        })
        .await;

    let polygon_dir = TempDir::new()?;
    let polygon = polygon_dir.path().join("williamsville.geojson");
    std::fs::write(
        &polygon,
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-78.75, 42.95], [-78.72, 42.95], [-78.72, 42.97], [-78.75, 42.97], [-78.75, 42.95]
                    ]]
                }
            }]
        })
        .to_string(),
    )?;
    let entries = vec![
        BoundaryEntry {
            name: "Sloan".to_string(),
            file: polygon_dir.path().join("missing.geojson"),
        },
        BoundaryEntry {
            name: "Williamsville".to_string(),
            file: polygon,
        },
    ];

    let office = office(&server, entries)?;
    let geocoder = CensusGeocoder::new(office.config.geocoder.clone())?;
    let boundaries = BoundarySet::load(office.config.boundary_files());
    assert_eq!(boundaries.len(), 1);
    let desk = PermitDesk::new(&office.config, &office.table, &boundaries, &geocoder);

    let mut prompter = ScriptedPrompter::new(["B"]);
    let outcome = desk
        .fee("5565 Main St, Williamsville, NY 14221", &mut prompter)
        .await?;

    lookup.assert_hits_async(0).await;
    let FeeOutcome::Quote(quote) = outcome else {
        panic!("expected a quote");
    };
    assert_eq!(quote.township, "Williamsville");
    assert_eq!(quote.price, 40.0);
    assert!(prompter.said("Township detected from polygon: Williamsville"));
    Ok(())
}

#[tokio::test]
async fn test_geocoder_outage_falls_back_to_operator() -> Result<()> {
    let server = MockServer::start_async().await;
    let locate = server
        .mock_async(|when, then| {
            when.method(GET).path("/geocoder/locations/onelineaddress");
            then.status(500);
        })
        .await;

    let office = office(&server, Vec::new())?;
    let geocoder = CensusGeocoder::new(office.config.geocoder.clone())?;
    let boundaries = BoundarySet::default();
    let desk = PermitDesk::new(&office.config, &office.table, &boundaries, &geocoder);

    let mut prompter = ScriptedPrompter::new(["hamburg town", "F"]);
    let outcome = desk.fee("1 Nowhere Rd", &mut prompter).await?;

    locate.assert_async().await;
    let FeeOutcome::Quote(quote) = outcome else {
        panic!("expected a quote");
    };
    // Zero cost but flagged special in the table.
    assert!(quote.permit_required);
    assert_eq!(quote.price, 0.0);
    assert!(prompter.said("Census geocode failed for address: 1 Nowhere Rd"));
    assert!(prompter.said("Township entered manually: hamburg town"));
    Ok(())
}

#[tokio::test]
async fn test_niagara_falls_special_rule_from_place() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/geocoder/locations/onelineaddress");
            then.status(200).json_body(address_match(-79.05, 43.09));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/geocoder/geographies/coordinates");
            then.status(200)
                .json_body(geographies("Niagara Falls city", "Niagara Falls city"));
        })
        .await;

    let mut office = office(&server, Vec::new())?;
    office.config.geocoder.prefer = GeographyPreference::Place;
    let geocoder = CensusGeocoder::new(office.config.geocoder.clone())?;
    let boundaries = BoundarySet::default();
    let desk = PermitDesk::new(&office.config, &office.table, &boundaries, &geocoder);

    let mut prompter = ScriptedPrompter::new(["F", "-5", "2500"]);
    let outcome = desk
        .fee("300 Pine Ave, Niagara Falls, NY 14301", &mut prompter)
        .await?;

    let FeeOutcome::Quote(quote) = outcome else {
        panic!("expected a quote");
    };
    assert_eq!(quote.special, Some(SpecialRule::NiagaraFallsCity));
    assert_eq!(quote.price, 45.0);
    assert!(prompter.said("Township detected from Census place: Niagara Falls city"));
    assert!(prompter.said("Invalid number, try again."));
    assert!(prompter.said("inspection: send pictures"));
    Ok(())
}

#[tokio::test]
async fn test_check_loop_against_census() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/geocoder/locations/onelineaddress");
            then.status(200).json_body(address_match(-78.59, 43.01));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/geocoder/geographies/coordinates");
            then.status(200).json_body(geographies("Clarence town", ""));
        })
        .await;

    let office = office(&server, Vec::new())?;
    let geocoder = CensusGeocoder::new(office.config.geocoder.clone())?;
    let boundaries = BoundarySet::default();
    let desk = PermitDesk::new(&office.config, &office.table, &boundaries, &geocoder);

    let mut prompter = ScriptedPrompter::new(["8 Sheridan Dr", "AC", "D"]);
    let checked = desk.check_loop(&mut prompter).await?;

    assert_eq!(checked, 1);
    assert!(prompter.said("Permit required? Yes"));
    assert!(!prompter.questions.iter().any(|q| q.contains("New or Replacement")));
    Ok(())
}
