//! The two address workflows: a full fee quote for one job, and a quick
//! "is a permit needed" loop over many addresses.

use crate::config::toml_config::AppConfig;
use crate::core::boundary::BoundarySet;
use crate::core::fee::{ask_work_type, permit_required, render_quote, FeeCalculator, FeeOutcome};
use crate::core::fee_table::FeeTable;
use crate::core::township::TownshipResolver;
use crate::domain::model::WorkType;
use crate::domain::ports::{Geocoder, Prompter};
use crate::utils::error::Result;

const DONE: &str = "D";

pub struct PermitDesk<'a, G: Geocoder> {
    config: &'a AppConfig,
    table: &'a FeeTable,
    boundaries: &'a BoundarySet,
    geocoder: &'a G,
}

impl<'a, G: Geocoder> PermitDesk<'a, G> {
    pub fn new(
        config: &'a AppConfig,
        table: &'a FeeTable,
        boundaries: &'a BoundarySet,
        geocoder: &'a G,
    ) -> Self {
        Self {
            config,
            table,
            boundaries,
            geocoder,
        }
    }

    fn resolver(&self) -> TownshipResolver<'_, G> {
        TownshipResolver::new(self.geocoder, self.boundaries, self.config.geocoder.prefer)
    }

    /// Resolves the township, asks for the work type and prints the quote
    /// followed by any reminders for that township.
    pub async fn fee<P: Prompter + ?Sized>(
        &self,
        address: &str,
        prompter: &mut P,
    ) -> Result<FeeOutcome> {
        prompter.say(&format!("Job address: {}", address));
        let resolution = self.resolver().resolve(address, prompter).await?;
        let work_type = ask_work_type(prompter)?;

        let outcome =
            FeeCalculator::new(self.table).quote(&resolution.township, work_type, prompter)?;
        match &outcome {
            FeeOutcome::Quote(quote) => {
                tracing::info!(
                    "Quoted {} for {} work in {}",
                    quote.price,
                    quote.work_type,
                    quote.township
                );
                for line in render_quote(quote) {
                    prompter.say(&line);
                }
            }
            FeeOutcome::NotFound { township } => {
                prompter.say(&format!("Township '{}' not found in permit list.", township));
            }
        }

        for reminder in self.config.reminders_for(&resolution.township) {
            prompter.say(reminder);
        }
        Ok(outcome)
    }

    /// Whether the fee table requires a permit, `None` for unknown townships.
    pub fn check_permit(&self, township: &str, work_type: WorkType) -> Option<bool> {
        self.table
            .get(township)
            .map(|record| permit_required(record, work_type))
    }

    /// Runs until the operator answers `D`. Returns the number of addresses
    /// checked.
    pub async fn check_loop<P: Prompter + ?Sized>(&self, prompter: &mut P) -> Result<usize> {
        let mut checked = 0;
        loop {
            let address = prompter.ask("Address (or D to done): ")?;
            let address = address.trim();
            if address.eq_ignore_ascii_case(DONE) {
                break;
            }
            if address.is_empty() {
                continue;
            }

            let resolution = self.resolver().resolve(address, prompter).await?;
            let work_type = ask_work_type(prompter)?;
            match self.check_permit(&resolution.township, work_type) {
                Some(required) => {
                    prompter.say(&format!("Township detected: {}", resolution.township));
                    prompter.say(&format!(
                        "Permit required? {}",
                        if required { "Yes" } else { "No" }
                    ));
                }
                None => {
                    prompter.say(&format!(
                        "Township '{}' not found in permit list.",
                        resolution.township
                    ));
                }
            }
            checked += 1;
        }
        tracing::debug!("Checked {} addresses", checked);
        Ok(checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{FeeRecord, GeographyNames};
    use crate::utils::prompt::ScriptedPrompter;
    use async_trait::async_trait;

    struct FixedGeocoder(Option<&'static str>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn coordinates(&self, _address: &str) -> Result<Option<(f64, f64)>> {
            Ok(Some((-78.7, 42.9)))
        }

        async fn geographies(&self, _lon: f64, _lat: f64) -> Result<GeographyNames> {
            Ok(GeographyNames {
                county_subdivision: self.0.map(str::to_string),
                place: None,
            })
        }
    }

    fn table() -> FeeTable {
        FeeTable::from_records([
            FeeRecord {
                township: "Clarence town".to_string(),
                furnace: 50.0,
                ..FeeRecord::default()
            },
            FeeRecord {
                township: "Hamburg town".to_string(),
                boiler: 0.0,
                ..FeeRecord::default()
            },
        ])
    }

    #[tokio::test]
    async fn test_fee_prints_quote_and_reminders() {
        let config = AppConfig::default();
        let table = table();
        let boundaries = BoundarySet::default();
        let geocoder = FixedGeocoder(Some("Clarence town"));
        let desk = PermitDesk::new(&config, &table, &boundaries, &geocoder);
        let mut prompter = ScriptedPrompter::new(["F"]);

        let outcome = desk.fee("1 Main St, Clarence, NY 14031", &mut prompter).await.unwrap();

        let FeeOutcome::Quote(quote) = outcome else {
            panic!("expected a quote");
        };
        assert_eq!(quote.price, 50.0);
        assert!(prompter.said("Permit price: $50.00"));
        assert!(!prompter.said("print signed estimate invoice"));
    }

    #[tokio::test]
    async fn test_fee_reports_unknown_township() {
        let config = AppConfig::default();
        let table = table();
        let boundaries = BoundarySet::default();
        let geocoder = FixedGeocoder(Some("Nowhere town"));
        let desk = PermitDesk::new(&config, &table, &boundaries, &geocoder);
        let mut prompter = ScriptedPrompter::new(["B"]);

        let outcome = desk.fee("addr", &mut prompter).await.unwrap();
        assert!(matches!(outcome, FeeOutcome::NotFound { .. }));
        assert!(prompter.said("not found in permit list"));
    }

    #[tokio::test]
    async fn test_check_loop_until_done() {
        let config = AppConfig::default();
        let table = table();
        let boundaries = BoundarySet::default();
        let geocoder = FixedGeocoder(None);
        let desk = PermitDesk::new(&config, &table, &boundaries, &geocoder);
        let mut prompter = ScriptedPrompter::new([
            "1 Main St",
            "Clarence town",
            "F",
            "",
            "2 Lake St",
            "hamburg town",
            "B",
            "d",
        ]);

        let checked = desk.check_loop(&mut prompter).await.unwrap();

        assert_eq!(checked, 2);
        assert_eq!(prompter.remaining(), 0);
        assert!(prompter.said("Permit required? Yes"));
        assert!(prompter.said("Permit required? No"));
    }
}
