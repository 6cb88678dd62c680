use r_htslib::Hts;

mod cli_model;
mod config;
mod region;
mod samples;

pub use config::{Analysis, Config};
pub use region::Region;
pub use samples::SampleSheet;

use crate::log_utils::init_log;

/// Alignment input for one sample: sample name and open file
pub type SampleInput = (Box<str>, Hts);

pub fn handle_cli() -> anyhow::Result<(Vec<SampleInput>, Config)> {
    let m = cli_model::cli_model().get_matches();
    init_log(&m)?;
    Config::from_matches(&m)
}
