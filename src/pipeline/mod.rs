pub mod indicators;
pub mod lab_parser;
pub mod normalize;
pub mod units;

pub use indicators::{fold_key, IndicatorDef, IndicatorDictionary};
pub use lab_parser::LabParser;
pub use normalize::normalize;
pub use units::canonical_unit;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("Failed to read indicator dictionary {0}: {1}")]
    Load(String, String),

    #[error("Invalid indicator dictionary: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Indicator dictionary is empty")]
    Empty,
}
