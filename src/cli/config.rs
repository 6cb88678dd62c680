use std::{fmt, path::PathBuf};

use clap::{ValueEnum, builder::PossibleValue};

use crate::{classify::SiteFilter, ld::LdStat, population::PopulationSet, reference::Reference};

use super::Region;

mod getters;
mod mk_config;

/// Family of statistics calculated per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    Sfs,
    Ld,
}

impl ValueEnum for Analysis {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Sfs, Self::Ld]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        match self {
            Self::Sfs => Some(PossibleValue::new("sfs")),
            Self::Ld => Some(PossibleValue::new("ld")),
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Sfs => write!(f, "sfs"),
            Self::Ld => write!(f, "ld"),
        }
    }
}

pub struct Config {
    region: Region,
    reference: Reference,
    pops: PopulationSet,
    analysis: Analysis,
    ld_stat: LdStat,
    window_size: Option<usize>,
    site_filter: SiteFilter,
    output: Option<PathBuf>,
    dep_corr: f64,
    min_sites: f64,
    seed: u64,
    min_snps: usize,
    min_freq: usize,
    min_mapq: u8,
    min_base_qual: u8,
    resolve_hets: bool,
}
