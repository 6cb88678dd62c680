//! Per-position read observations as delivered to the site caller
//!
//! A pileup source walks a window of the reference in ascending order and, for every
//! position covered by at least one sample, hands over one [`PileupColumn`] holding the
//! observed bases for each sample.  The column is only valid for the duration of the
//! callback; the source is free to reuse its storage for the next position.

mod bam;

pub use bam::BamPileup;

pub const N_BASES: usize = 4;
pub const MAX_QUAL: u8 = 63;

/// One base call from one read at one position
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ObservedBase {
    base: u8,
    qual: u8,
    reverse: bool,
}

impl ObservedBase {
    pub fn new(base: u8, qual: u8, reverse: bool) -> Self {
        assert!((base as usize) < N_BASES, "Illegal base code {}", base);
        Self {
            base,
            qual: qual.min(MAX_QUAL),
            reverse,
        }
    }

    /// Packed form used by the error model: quality in bits 5-10, strand in bit 4, base in bits 0-1
    pub(crate) fn code(&self) -> u16 {
        ((self.qual as u16) << 5) | ((self.reverse as u16) << 4) | (self.base as u16)
    }
}

/// Observations for one sample at one position
#[derive(Debug, Default, Clone)]
pub struct SamplePileup {
    obs: Vec<ObservedBase>,
    rms_mapq: u16,
}

impl SamplePileup {
    pub fn new(obs: Vec<ObservedBase>, rms_mapq: u16) -> Self {
        Self { obs, rms_mapq }
    }

    pub fn clear(&mut self) {
        self.obs.clear();
        self.rms_mapq = 0;
    }

    pub fn push(&mut self, ob: ObservedBase) {
        self.obs.push(ob)
    }

    pub fn set_rms_mapq(&mut self, rms: u16) {
        self.rms_mapq = rms
    }

    pub fn obs(&self) -> &[ObservedBase] {
        &self.obs
    }

    pub fn depth(&self) -> usize {
        self.obs.len()
    }

    pub fn rms_mapq(&self) -> u16 {
        self.rms_mapq
    }
}

/// All samples' observations at one reference position (0 offset)
#[derive(Debug, Clone)]
pub struct PileupColumn {
    pos: usize,
    samples: Vec<SamplePileup>,
}

impl PileupColumn {
    pub fn new(n_samples: usize) -> Self {
        Self {
            pos: 0,
            samples: vec![SamplePileup::default(); n_samples],
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos
    }

    pub fn samples(&self) -> &[SamplePileup] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [SamplePileup] {
        &mut self.samples
    }
}

/// Producer of pileup columns for a fixed contig
///
/// Windows are requested in ascending, non-overlapping order.  Within a window,
/// columns must be delivered in strictly ascending position order.
pub trait PileupSource {
    fn n_samples(&self) -> usize;

    fn pileup(
        &mut self,
        start: usize,
        end: usize,
        f: &mut dyn FnMut(&PileupColumn) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>;
}
