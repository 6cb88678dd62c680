//! Site classification
//!
//! Works on the consensus calls for all samples at one position: quality filtering,
//! optional heterozygote resolution and the infinite-sites segregating-site test.
//! Records are modified in place.

use crate::consensus::{ConsensusRecord, Genotype};

/// Two bit allele code for a reference base, or None if the base is not one of ACGT
pub fn base_code(b: u8) -> Option<u8> {
    match b.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Segregation {
    /// No covered sample carries a confident non-reference allele
    Invariant,
    /// Exactly one derived allele, carried (homozygously) by `carriers` samples
    Segregating { derived: u8, carriers: usize },
    /// More than one derived allele: violates the infinite-sites model
    MultipleDerived,
    /// Reference base outside ACGT, so the ancestral state is unknown
    UndeterminedAncestor,
}

impl Segregation {
    pub fn is_segregating(&self) -> bool {
        matches!(self, Self::Segregating { .. })
    }
}

#[derive(Debug, Copy, Clone)]
pub struct SiteFilter {
    pub min_depth: u16,
    pub max_depth: u16,
    pub min_rms_mapq: u16,
    pub min_snp_qual: u16,
}

impl SiteFilter {
    /// Set the pass flag on every record meeting the depth and mapping quality thresholds.
    /// Returns the coverage mask (bit i set iff sample i passes).
    pub fn quality_filter(&self, recs: &mut [ConsensusRecord]) -> u64 {
        let mut cov = 0;
        for (i, r) in recs.iter_mut().enumerate() {
            r.pass = r.rms_mapq >= self.min_rms_mapq
                && r.depth >= self.min_depth
                && r.depth <= self.max_depth;
            if r.pass {
                cov |= 1 << i
            }
        }
        cov
    }

    /// Collapse heterozygous calls to homozygotes.  All samples are resolved, whether or
    /// not they pass the quality filter.
    ///
    /// Confident heterozygotes carrying the reference allele become homozygous for the other allele,
    /// low confidence heterozygotes become homozygous reference.  Confident heterozygotes with two
    /// non-reference alleles are left alone.
    pub fn resolve_heterozygotes(&self, recs: &mut [ConsensusRecord], ref_allele: u8) {
        for r in recs.iter_mut().filter(|r| !r.genotype.is_homozygous()) {
            let (a1, a2) = r.genotype.alleles();
            if r.snp_qual >= self.min_snp_qual {
                if a1 == ref_allele {
                    r.genotype = Genotype::homozygous(a2)
                } else if a2 == ref_allele {
                    r.genotype = Genotype::homozygous(a1)
                }
            } else {
                r.genotype = Genotype::homozygous(ref_allele)
            }
        }
    }

    /// Check whether the position is a valid segregating site.
    ///
    /// Every sample is scanned, so a confident second derived allele in a sample failing the
    /// quality filter still rejects the site.  Samples confidently homozygous for a non-reference
    /// allele get their variant flag set; those below the confidence threshold are reverted to
    /// homozygous reference.
    pub fn segregating_site(&self, recs: &mut [ConsensusRecord], ref_allele: u8) -> Segregation {
        let mut counts = [0usize; 4];
        for r in recs.iter_mut() {
            let (a1, _) = r.genotype.alleles();
            if r.genotype.is_homozygous() && a1 != ref_allele {
                if r.snp_qual >= self.min_snp_qual {
                    r.variant = true;
                    counts[a1 as usize] += 1;
                } else {
                    r.genotype = Genotype::homozygous(ref_allele)
                }
            }
        }
        let mut derived = counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(a, c)| (a as u8, *c));
        match (derived.next(), derived.next()) {
            (None, _) => Segregation::Invariant,
            (Some((derived, carriers)), None) => Segregation::Segregating { derived, carriers },
            _ => Segregation::MultipleDerived,
        }
    }

    /// Run the full classification for one position.  Returns the coverage mask and the
    /// segregation status.
    pub fn classify(
        &self,
        recs: &mut [ConsensusRecord],
        ref_base: u8,
        resolve_hets: bool,
    ) -> (u64, Segregation) {
        let cov = self.quality_filter(recs);
        let seg = match base_code(ref_base) {
            Some(ref_allele) => {
                if resolve_hets {
                    self.resolve_heterozygotes(recs, ref_allele)
                }
                self.segregating_site(recs, ref_allele)
            }
            None => Segregation::UndeterminedAncestor,
        };
        (cov, seg)
    }
}

/// Bit i set iff sample i passes and carries the derived allele
pub fn site_type(recs: &[ConsensusRecord]) -> u64 {
    recs.iter()
        .enumerate()
        .filter(|(_, r)| r.pass && r.variant)
        .fold(0, |t, (i, _)| t | (1 << i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SiteFilter {
        SiteFilter {
            min_depth: 3,
            max_depth: 255,
            min_rms_mapq: 25,
            min_snp_qual: 25,
        }
    }

    fn rec(a1: u8, a2: u8, depth: u16, snp_qual: u16) -> ConsensusRecord {
        ConsensusRecord {
            genotype: Genotype::new(a1, a2),
            depth,
            snp_qual,
            rms_mapq: 40,
            ..Default::default()
        }
    }

    #[test]
    fn quality_mask() {
        let mut recs = vec![rec(0, 0, 10, 50), rec(0, 0, 2, 50), rec(0, 0, 300, 50), rec(0, 0, 3, 50)];
        recs[3].rms_mapq = 24;
        assert_eq!(filter().quality_filter(&mut recs), 0b0001);
        assert!(recs[0].pass && !recs[1].pass && !recs[3].pass);
        recs[3].rms_mapq = 25;
        assert_eq!(filter().quality_filter(&mut recs), 0b1001);
    }

    #[test]
    fn heterozygote_resolution() {
        let f = filter();
        let mut recs = vec![rec(0, 2, 10, 40), rec(2, 0, 10, 40), rec(0, 2, 10, 10), rec(1, 2, 10, 40)];
        f.quality_filter(&mut recs);
        f.resolve_heterozygotes(&mut recs, 0);
        assert_eq!(recs[0].genotype, Genotype::homozygous(2));
        assert_eq!(recs[1].genotype, Genotype::homozygous(2));
        assert_eq!(recs[2].genotype, Genotype::homozygous(0));
        assert_eq!(recs[3].genotype, Genotype::new(1, 2));
    }

    #[test]
    fn single_derived_allele() {
        let f = filter();
        let mut recs = vec![rec(3, 3, 10, 40), rec(0, 0, 10, 40), rec(3, 3, 10, 40), rec(3, 3, 1, 40)];
        let (cov, seg) = f.classify(&mut recs, b'a', true);
        assert_eq!(cov, 0b0111);
        // Sample 3 fails on depth: it counts as a carrier but not in the site type
        assert_eq!(seg, Segregation::Segregating { derived: 3, carriers: 3 });
        assert_eq!(site_type(&recs), 0b0101);
    }

    #[test]
    fn low_confidence_homozygote_reverted() {
        let f = filter();
        let mut recs = vec![rec(1, 1, 10, 12), rec(0, 0, 10, 40)];
        let (_, seg) = f.classify(&mut recs, b'A', true);
        assert_eq!(seg, Segregation::Invariant);
        assert_eq!(recs[0].genotype, Genotype::homozygous(0));
        assert!(!recs[0].variant);
    }

    #[test]
    fn infinite_sites_violation() {
        let f = filter();
        let mut recs = vec![rec(1, 1, 10, 40), rec(2, 2, 10, 40), rec(0, 0, 10, 40)];
        let (_, seg) = f.classify(&mut recs, b'A', true);
        assert_eq!(seg, Segregation::MultipleDerived);
        assert!(!seg.is_segregating());
    }

    #[test]
    fn failing_sample_second_allele() {
        let f = filter();
        let mut recs = vec![rec(2, 2, 10, 40), rec(1, 1, 2, 40), rec(0, 0, 10, 40)];
        let (cov, seg) = f.classify(&mut recs, b'A', true);
        assert_eq!(cov, 0b101);
        assert_eq!(seg, Segregation::MultipleDerived);
    }

    #[test]
    fn failing_sample_heterozygote_resolved() {
        let f = filter();
        let mut recs = vec![rec(0, 0, 10, 40), rec(0, 1, 2, 40)];
        let (cov, seg) = f.classify(&mut recs, b'A', true);
        assert_eq!(cov, 0b01);
        assert_eq!(recs[1].genotype, Genotype::homozygous(1));
        assert_eq!(seg, Segregation::Segregating { derived: 1, carriers: 1 });
        assert_eq!(site_type(&recs), 0);
    }

    #[test]
    fn ambiguous_reference_is_undetermined() {
        let f = filter();
        let mut recs = vec![rec(0, 2, 10, 40), rec(2, 2, 10, 40)];
        let (cov, seg) = f.classify(&mut recs, b'N', true);
        assert_eq!(cov, 0b11);
        assert_eq!(seg, Segregation::UndeterminedAncestor);
        // Calls are left untouched
        assert_eq!(recs[0].genotype, Genotype::new(0, 2));
        assert_eq!(site_type(&recs), 0);
    }

    #[test]
    fn heterozygotes_kept() {
        let f = filter();
        let mut recs = vec![rec(0, 2, 10, 40), rec(2, 2, 10, 40)];
        let (_, seg) = f.classify(&mut recs, b'A', false);
        assert_eq!(seg, Segregation::Segregating { derived: 2, carriers: 1 });
        assert_eq!(site_type(&recs), 0b10);
    }
}
