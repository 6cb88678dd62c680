//! Per-sample diploid consensus calls
//!
//! A [`ConsensusRecord`] carries everything later stages need to know about one sample at
//! one position.  Its 64 bit packed form is:
//!
//! | bits  | field                            |
//! |-------|----------------------------------|
//! | 0     | passes quality filter            |
//! | 1     | homozygous variant vs. reference |
//! | 8-15  | genotype (`allele1 << 2 \| allele2`) |
//! | 16-31 | read depth                       |
//! | 32-47 | SNP confidence                   |
//! | 48-63 | rms mapping quality              |

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    error_model::{ErrorModel, GenotypeLikelihood},
    pileup::{N_BASES, SamplePileup},
};

const PASS_FLAG: u64 = 1;
const VARIANT_FLAG: u64 = 2;

/// Unordered allele pair.  Calls always have `a1 <= a2` but resolution may produce either order.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Genotype {
    a1: u8,
    a2: u8,
}

impl Genotype {
    pub fn new(a1: u8, a2: u8) -> Self {
        assert!(
            (a1 as usize) < N_BASES && (a2 as usize) < N_BASES,
            "Illegal allele in genotype"
        );
        Self { a1, a2 }
    }

    pub fn homozygous(a: u8) -> Self {
        Self::new(a, a)
    }

    pub fn from_byte(x: u8) -> Self {
        Self {
            a1: (x >> 2) & 3,
            a2: x & 3,
        }
    }

    pub fn to_byte(&self) -> u8 {
        (self.a1 << 2) | self.a2
    }

    pub fn alleles(&self) -> (u8, u8) {
        (self.a1, self.a2)
    }

    pub fn is_homozygous(&self) -> bool {
        self.a1 == self.a2
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ConsensusRecord {
    pub pass: bool,
    pub variant: bool,
    pub genotype: Genotype,
    pub depth: u16,
    pub snp_qual: u16,
    pub rms_mapq: u16,
}

impl ConsensusRecord {
    pub fn pack(&self) -> u64 {
        let mut x = (self.rms_mapq as u64) << 48
            | (self.snp_qual as u64) << 32
            | (self.depth as u64) << 16
            | (self.genotype.to_byte() as u64) << 8;
        if self.pass {
            x |= PASS_FLAG
        }
        if self.variant {
            x |= VARIANT_FLAG
        }
        x
    }

    pub fn unpack(x: u64) -> Self {
        Self {
            pass: (x & PASS_FLAG) != 0,
            variant: (x & VARIANT_FLAG) != 0,
            genotype: Genotype::from_byte(((x >> 8) & 0xff) as u8),
            depth: ((x >> 16) & 0xffff) as u16,
            snp_qual: ((x >> 32) & 0xffff) as u16,
            rms_mapq: ((x >> 48) & 0xffff) as u16,
        }
    }
}

fn clamp_u16(x: f64) -> u16 {
    x.round().clamp(0.0, u16::MAX as f64) as u16
}

/// Pick the most likely genotype.  Ties go to the first pair in (i <= j) scan order.
pub fn call_consensus(gl: &GenotypeLikelihood, depth: usize, rms_mapq: u16) -> ConsensusRecord {
    let mut best = (f64::MAX, Genotype::default());
    let mut next = f64::MAX;
    for i in 0..N_BASES as u8 {
        for j in i..N_BASES as u8 {
            let l = gl.get(i, j);
            if l < best.0 {
                next = best.0;
                best = (l, Genotype::new(i, j));
            } else if l < next {
                next = l
            }
        }
    }
    ConsensusRecord {
        pass: false,
        variant: false,
        genotype: best.1,
        depth: depth.min(u16::MAX as usize) as u16,
        snp_qual: clamp_u16(next - best.0),
        rms_mapq,
    }
}

/// Turns one sample's pileup into a consensus call
pub struct BaseCaller<'a> {
    model: &'a ErrorModel,
    rng: StdRng,
    codes: Vec<u16>,
}

impl<'a> BaseCaller<'a> {
    pub fn new(model: &'a ErrorModel, seed: u64) -> Self {
        Self {
            model,
            rng: StdRng::seed_from_u64(seed),
            codes: Vec::new(),
        }
    }

    pub fn call(&mut self, sp: &SamplePileup) -> ConsensusRecord {
        self.codes.clear();
        self.codes.extend(sp.obs().iter().map(|ob| ob.code()));
        let gl = self.model.likelihoods(&mut self.codes, &mut self.rng);
        call_consensus(&gl, sp.depth(), sp.rms_mapq())
    }
}
