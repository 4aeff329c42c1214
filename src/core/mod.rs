pub mod boundary;
pub mod customer;
pub mod desk;
pub mod fee;
pub mod fee_table;
pub mod forms;
pub mod geocoder;
pub mod layout;
pub mod overlay;
pub mod township;

pub use crate::domain::ports::{Geocoder, Printer, Prompter, Storage};
pub use crate::utils::error::Result;
