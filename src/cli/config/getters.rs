use std::path::Path;

use crate::{
    classify::SiteFilter,
    ld::{LdParams, LdStat},
    population::PopulationSet,
    reference::Reference,
};

use super::{Analysis, Config, super::Region};

impl Config {
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn pops(&self) -> &PopulationSet {
        &self.pops
    }

    pub fn analysis(&self) -> Analysis {
        self.analysis
    }

    pub fn ld_stat(&self) -> LdStat {
        self.ld_stat
    }

    /// Window size in bases
    pub fn window_size(&self) -> Option<usize> {
        self.window_size
    }

    pub fn site_filter(&self) -> &SiteFilter {
        &self.site_filter
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn dep_corr(&self) -> f64 {
        self.dep_corr
    }

    pub fn min_sites(&self) -> f64 {
        self.min_sites
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn min_mapq(&self) -> u8 {
        self.min_mapq
    }

    pub fn min_base_qual(&self) -> u8 {
        self.min_base_qual
    }

    pub fn resolve_hets(&self) -> bool {
        self.resolve_hets
    }

    pub fn ld_params(&self) -> LdParams {
        LdParams {
            stat: self.ld_stat,
            min_freq: self.min_freq,
            min_snps: self.min_snps,
            min_sites: self.min_sites,
        }
    }
}
