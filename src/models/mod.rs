pub mod analysis;
pub mod classification;
pub mod enums;
pub mod lab;

pub use analysis::*;
pub use classification::*;
pub use enums::*;
pub use lab::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },
}
