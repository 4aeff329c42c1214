//! Permit fee determination.
//!
//! Most townships charge a flat amount per work type straight from the fee
//! table. Amherst, Niagara Falls City and North Tonawanda City use their own
//! formulas; the last two are driven by the installation cost.

use crate::core::fee_table::FeeTable;
use crate::domain::model::{AcChoice, FeeQuote, FeeRecord, SpecialRule, WorkType};
use crate::domain::ports::Prompter;
use crate::utils::error::{PermitError, Result};
use crate::utils::prompt::ask_parsed;

pub const AMHERST_SURCHARGE: f64 = 1.75;
const AMHERST_KEYS: [&str; 2] = ["amherst", "amherst town"];

pub const NIAGARA_FALLS_FIRST_THOUSAND: f64 = 25.0;
pub const NIAGARA_FALLS_PER_THOUSAND: f64 = 10.0;
pub const NORTH_TONAWANDA_BASE: f64 = 35.0;
pub const NORTH_TONAWANDA_PER_THOUSAND: f64 = 8.0;

pub fn round_up_to_thousand(cost: f64) -> f64 {
    (cost / 1000.0).ceil() * 1000.0
}

/// $25 for the first $1000 of installation cost, $10 per further $1000.
pub fn niagara_falls_fee(cost: f64) -> f64 {
    let rounded = round_up_to_thousand(cost);
    let additional = ((rounded - 1000.0) / 1000.0).floor().max(0.0);
    NIAGARA_FALLS_FIRST_THOUSAND + additional * NIAGARA_FALLS_PER_THOUSAND
}

/// $35 plus $8 for every $1000 of installation cost, the first $1000 included.
pub fn north_tonawanda_fee(cost: f64) -> f64 {
    let units = (round_up_to_thousand(cost) / 1000.0).max(0.0);
    NORTH_TONAWANDA_BASE + units * NORTH_TONAWANDA_PER_THOUSAND
}

pub fn needs_ac_choice(record: &FeeRecord, work_type: WorkType) -> bool {
    work_type.involves_ac() && record.ac_costs_differ()
}

pub fn permit_required(record: &FeeRecord, work_type: WorkType) -> bool {
    let required = match work_type {
        WorkType::Furnace => record.furnace > 0.0,
        WorkType::Ac => record.ac_new > 0.0 || record.ac_replace > 0.0,
        WorkType::FurnaceAc => {
            record.furnace > 0.0 || record.ac_new > 0.0 || record.ac_replace > 0.0
        }
        WorkType::Boiler => record.boiler > 0.0,
    };
    required || record.special
}

fn ac_cost(record: &FeeRecord, choice: Option<AcChoice>) -> f64 {
    match choice {
        Some(AcChoice::New) => record.ac_new,
        Some(AcChoice::Replacement) => record.ac_replace,
        None if record.ac_costs_differ() => record.ac_new.max(record.ac_replace),
        None => record.ac_new,
    }
}

/// Price of a table township. Without an AC choice, differing AC costs charge
/// the higher of the two.
pub fn table_price(record: &FeeRecord, work_type: WorkType, choice: Option<AcChoice>) -> f64 {
    match work_type {
        WorkType::Furnace => record.furnace,
        WorkType::Ac => ac_cost(record, choice),
        WorkType::FurnaceAc if record.separate => record.furnace + ac_cost(record, choice),
        WorkType::FurnaceAc => record.furnace,
        WorkType::Boiler => record.boiler,
    }
}

pub fn amherst_price(record: &FeeRecord, work_type: WorkType, choice: Option<AcChoice>) -> f64 {
    let base = match work_type {
        WorkType::Furnace => record.furnace,
        WorkType::Ac => match choice {
            Some(AcChoice::Replacement) => record.ac_replace,
            _ => record.ac_new,
        },
        WorkType::FurnaceAc => record.combined,
        WorkType::Boiler => record.boiler,
    };
    base + AMHERST_SURCHARGE
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeeOutcome {
    Quote(FeeQuote),
    NotFound { township: String },
}

pub fn ask_work_type<P: Prompter + ?Sized>(prompter: &mut P) -> Result<WorkType> {
    ask_parsed(
        prompter,
        "Enter work type (F = Furnace, AC = AC, FAC = Furnace+AC, B = Boiler): ",
        "Invalid input. Try again.",
    )
}

pub fn ask_ac_choice<P: Prompter + ?Sized>(prompter: &mut P) -> Result<AcChoice> {
    let choice: AcChoice = ask_parsed(
        prompter,
        "Is the AC New or Replacement? (N/R): ",
        "Invalid input. Try again.",
    )?;
    prompter.say(&format!("AC type selected: {}", choice));
    Ok(choice)
}

pub fn ask_installation_cost<P: Prompter + ?Sized>(prompter: &mut P, town: &str) -> Result<f64> {
    let question = format!("Enter installation cost for {}: ", town);
    loop {
        let cost: f64 = ask_parsed(prompter, &question, "Invalid number, try again.")?;
        if cost.is_finite() && cost >= 0.0 {
            return Ok(cost);
        }
        prompter.say("Invalid number, try again.");
    }
}

pub struct FeeCalculator<'a> {
    table: &'a FeeTable,
}

impl<'a> FeeCalculator<'a> {
    pub fn new(table: &'a FeeTable) -> Self {
        Self { table }
    }

    pub fn quote<P: Prompter + ?Sized>(
        &self,
        township: &str,
        work_type: WorkType,
        prompter: &mut P,
    ) -> Result<FeeOutcome> {
        if let Some(rule) = SpecialRule::for_township(township) {
            tracing::debug!("{} uses special rule {:?}", township, rule);
            return self
                .special_quote(rule, township, work_type, prompter)
                .map(FeeOutcome::Quote);
        }

        let Some(record) = self.table.get(township) else {
            tracing::warn!("Township '{}' not found in fee table", township);
            return Ok(FeeOutcome::NotFound {
                township: township.to_string(),
            });
        };

        let ac_choice = if needs_ac_choice(record, work_type) {
            Some(ask_ac_choice(prompter)?)
        } else {
            None
        };

        Ok(FeeOutcome::Quote(FeeQuote {
            township: township.to_string(),
            work_type,
            permit_required: permit_required(record, work_type),
            price: table_price(record, work_type, ac_choice),
            special: None,
            ac_choice,
            explanation: Vec::new(),
            notes: Vec::new(),
        }))
    }

    fn amherst_record(&self, township: &str) -> Result<&FeeRecord> {
        std::iter::once(township)
            .chain(AMHERST_KEYS)
            .find_map(|key| self.table.get(key))
            .ok_or_else(|| PermitError::TownshipNotFound {
                township: township.to_string(),
            })
    }

    fn special_quote<P: Prompter + ?Sized>(
        &self,
        rule: SpecialRule,
        township: &str,
        work_type: WorkType,
        prompter: &mut P,
    ) -> Result<FeeQuote> {
        let mut quote = FeeQuote {
            township: township.to_string(),
            work_type,
            permit_required: true,
            price: 0.0,
            special: Some(rule),
            ac_choice: None,
            explanation: Vec::new(),
            notes: Vec::new(),
        };

        match rule {
            SpecialRule::Amherst => {
                let record = self.amherst_record(township)?;
                if work_type == WorkType::Ac && record.ac_costs_differ() {
                    quote.ac_choice = Some(ask_ac_choice(prompter)?);
                }
                quote.price = amherst_price(record, work_type, quote.ac_choice);
                quote.explanation.push(format!(
                    "calculation = table price plus ${:.2} surcharge",
                    AMHERST_SURCHARGE
                ));
            }
            SpecialRule::NiagaraFallsCity => {
                let cost = ask_installation_cost(prompter, "Niagara Falls City")?;
                quote.price = niagara_falls_fee(cost);
                quote.explanation.push(
                    "calculation = 25 for first $1000 and $10 for each additional $1000"
                        .to_string(),
                );
                quote.explanation.push(format!(
                    "{:.2} plus {:.2} = {:.2}",
                    NIAGARA_FALLS_FIRST_THOUSAND,
                    quote.price - NIAGARA_FALLS_FIRST_THOUSAND,
                    quote.price
                ));
            }
            SpecialRule::NorthTonawandaCity => {
                let cost = ask_installation_cost(prompter, "North Tonawanda")?;
                quote.price = north_tonawanda_fee(cost);
                quote
                    .explanation
                    .push("calculation = 35 base price and $8 * total cost/1000".to_string());
                quote.explanation.push(format!(
                    "{:.2} plus {:.2} = {:.2}",
                    NORTH_TONAWANDA_BASE,
                    quote.price - NORTH_TONAWANDA_BASE,
                    quote.price
                ));
                quote.notes.push(
                    "Check with North Tonawanda whether smoke detectors and COs are needed: if yes, add 75"
                        .to_string(),
                );
            }
        }

        Ok(quote)
    }
}

pub fn render_quote(quote: &FeeQuote) -> Vec<String> {
    let mut lines = quote.explanation.clone();
    if quote.special.is_some() {
        lines.push(format!("Township detected: {} (special calc)", quote.township));
    } else {
        lines.push(format!("Township detected: {}", quote.township));
    }
    lines.push(format!(
        "Permit required? {}",
        if quote.permit_required { "Yes" } else { "No" }
    ));
    lines.push(format!("Permit price: ${:.2}", quote.price));
    lines.extend(quote.notes.iter().cloned());
    lines
}
