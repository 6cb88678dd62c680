use crate::{
    classify::{Segregation, SiteFilter, site_type},
    consensus::{BaseCaller, ConsensusRecord},
    pileup::PileupColumn,
    population::PopulationSet,
    window::WindowData,
};

/// Per position pipeline: consensus calling, classification and population encoding
pub struct SiteProcessor<'a> {
    caller: BaseCaller<'a>,
    filter: SiteFilter,
    resolve_hets: bool,
    pops: &'a PopulationSet,
    recs: Vec<ConsensusRecord>,
    non_acgt: usize,
}

impl<'a> SiteProcessor<'a> {
    pub fn new(
        caller: BaseCaller<'a>,
        filter: SiteFilter,
        resolve_hets: bool,
        pops: &'a PopulationSet,
    ) -> Self {
        Self {
            caller,
            filter,
            resolve_hets,
            pops,
            recs: Vec::with_capacity(pops.n_samples()),
            non_acgt: 0,
        }
    }

    /// Positions seen with a reference base outside ACGT
    pub fn non_acgt(&self) -> usize {
        self.non_acgt
    }

    pub fn process(
        &mut self,
        col: &PileupColumn,
        ref_base: u8,
        wd: &mut WindowData,
    ) -> anyhow::Result<()> {
        if col.samples().len() != self.pops.n_samples() {
            return Err(anyhow!(
                "Pileup has {} samples, expected {}",
                col.samples().len(),
                self.pops.n_samples()
            ));
        }
        self.recs.clear();
        for sp in col.samples() {
            self.recs.push(self.caller.call(sp))
        }
        let (cov, seg) = self
            .filter
            .classify(&mut self.recs, ref_base, self.resolve_hets);
        let st = match seg {
            Segregation::Segregating { .. } => Some(site_type(&self.recs)),
            Segregation::UndeterminedAncestor => {
                self.non_acgt += 1;
                None
            }
            _ => None,
        };
        trace!(
            "{}: coverage {:#x}, {:?}, site type {:?}",
            col.pos() + 1,
            cov,
            seg,
            st
        );
        wd.add_position(col.pos(), cov, st, self.pops)
    }
}
