use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row of the township fee table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub township: String,
    pub furnace: f64,
    pub ac_new: f64,
    pub ac_replace: f64,
    pub boiler: f64,
    pub combined: f64,
    pub separate: bool,
    pub special: bool,
}

impl FeeRecord {
    pub fn key(&self) -> String {
        normalize_township(&self.township)
    }

    pub fn ac_costs_differ(&self) -> bool {
        self.ac_new != self.ac_replace
    }
}

pub fn normalize_township(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkType {
    Furnace,
    Ac,
    FurnaceAc,
    Boiler,
}

impl WorkType {
    pub fn code(&self) -> &'static str {
        match self {
            WorkType::Furnace => "F",
            WorkType::Ac => "AC",
            WorkType::FurnaceAc => "FAC",
            WorkType::Boiler => "B",
        }
    }

    pub fn involves_ac(&self) -> bool {
        matches!(self, WorkType::Ac | WorkType::FurnaceAc)
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "F" => Ok(WorkType::Furnace),
            "AC" => Ok(WorkType::Ac),
            "FAC" => Ok(WorkType::FurnaceAc),
            "B" => Ok(WorkType::Boiler),
            other => Err(format!("unknown work type '{}'", other)),
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkType::Furnace => "Furnace",
            WorkType::Ac => "AC",
            WorkType::FurnaceAc => "Furnace+AC",
            WorkType::Boiler => "Boiler",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcChoice {
    New,
    Replacement,
}

impl FromStr for AcChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "N" => Ok(AcChoice::New),
            "R" => Ok(AcChoice::Replacement),
            other => Err(format!("unknown AC type '{}'", other)),
        }
    }
}

impl fmt::Display for AcChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcChoice::New => f.write_str("New"),
            AcChoice::Replacement => f.write_str("Replacement"),
        }
    }
}

/// Townships whose fee bypasses the flat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialRule {
    Amherst,
    NiagaraFallsCity,
    NorthTonawandaCity,
}

impl SpecialRule {
    pub fn for_township(township: &str) -> Option<Self> {
        match normalize_township(township).as_str() {
            "amherst" | "amherst town" => Some(SpecialRule::Amherst),
            "niagara falls city" => Some(SpecialRule::NiagaraFallsCity),
            "north tonawanda city" => Some(SpecialRule::NorthTonawandaCity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeQuote {
    pub township: String,
    pub work_type: WorkType,
    pub permit_required: bool,
    pub price: f64,
    pub special: Option<SpecialRule>,
    pub ac_choice: Option<AcChoice>,
    pub explanation: Vec<String>,
    pub notes: Vec<String>,
}

/// Where a township name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TownshipSource {
    Boundary,
    CountySubdivision,
    Place,
    Manual,
}

impl fmt::Display for TownshipSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TownshipSource::Boundary => f.write_str("boundary polygon"),
            TownshipSource::CountySubdivision => f.write_str("Census county subdivision"),
            TownshipSource::Place => f.write_str("Census place"),
            TownshipSource::Manual => f.write_str("manual entry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub township: String,
    pub source: TownshipSource,
    pub coordinates: Option<(f64, f64)>,
}

/// Names returned by a reverse geography lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeographyNames {
    pub county_subdivision: Option<String>,
    pub place: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_type_parsing() {
        assert_eq!("f".parse::<WorkType>().unwrap(), WorkType::Furnace);
        assert_eq!(" ac ".parse::<WorkType>().unwrap(), WorkType::Ac);
        assert_eq!("Fac".parse::<WorkType>().unwrap(), WorkType::FurnaceAc);
        assert_eq!("B".parse::<WorkType>().unwrap(), WorkType::Boiler);
        assert!("X".parse::<WorkType>().is_err());
    }

    #[test]
    fn test_special_rule_lookup_ignores_case() {
        assert_eq!(SpecialRule::for_township("Amherst"), Some(SpecialRule::Amherst));
        assert_eq!(SpecialRule::for_township("Amherst town"), Some(SpecialRule::Amherst));
        assert_eq!(
            SpecialRule::for_township(" NIAGARA FALLS CITY "),
            Some(SpecialRule::NiagaraFallsCity)
        );
        assert_eq!(
            SpecialRule::for_township("North Tonawanda city"),
            Some(SpecialRule::NorthTonawandaCity)
        );
        assert_eq!(SpecialRule::for_township("Tonawanda town"), None);
    }
}
