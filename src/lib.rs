pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{Cli, Commands};

pub use config::cli::{CommandPrinter, LocalStorage};
pub use config::toml_config::AppConfig;
pub use core::{
    boundary::BoundarySet,
    customer::CustomerRecord,
    desk::PermitDesk,
    fee::{FeeCalculator, FeeOutcome},
    fee_table::FeeTable,
    forms::{FormEngine, FormPaths},
    geocoder::CensusGeocoder,
    layout::{FormLayout, LayoutCatalog},
};
pub use utils::error::{PermitError, Result};
