#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

mod classify;
mod cli;
mod consensus;
mod error_model;
mod ld;
mod log_utils;
mod pileup;
mod population;
mod process;
mod reference;
mod sfs;
mod window;

fn main() -> anyhow::Result<()> {
    let (inputs, cfg) = cli::handle_cli()?;
    process::process_data(inputs, cfg)
}
