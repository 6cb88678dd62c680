use std::collections::VecDeque;

use r_htslib::*;

use super::{ObservedBase, PileupColumn, PileupSource, SamplePileup};

/// Read decoded into the reference positions it covers
pub struct AlignedRead {
    start: usize,
    end: usize, // One past the last reference position touched
    mapq: u8,
    obs: Vec<(usize, ObservedBase)>,
    ix: usize, // Next unused observation
}

impl AlignedRead {
    /// Decode a read from its CIGAR operations and packed sequence/quality bytes
    /// (base in bits 0-1, quality above).  Bases of quality 0 (N calls) or below
    /// `min_base_qual` are dropped.
    pub fn new<I>(
        start: usize,
        ops: I,
        seq_qual: &[u8],
        reverse: bool,
        mapq: u8,
        min_base_qual: u8,
    ) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (CigarOp, usize)>,
    {
        let mismatch = || anyhow!("Mismatch between CIGAR and sequence");
        let mut it = seq_qual.iter();
        let mut obs = Vec::with_capacity(seq_qual.len());
        let mut x = start;
        for (op, l) in ops {
            match op {
                CigarOp::Match | CigarOp::Equal | CigarOp::Diff => {
                    for _ in 0..l {
                        let c = it.next().ok_or_else(mismatch)?;
                        let q = *c >> 2;
                        if q > 0 && q >= min_base_qual {
                            obs.push((x, ObservedBase::new(*c & 3, q, reverse)))
                        }
                        x += 1;
                    }
                }
                CigarOp::Ins | CigarOp::SoftClip => {
                    if l > 0 && it.nth(l - 1).is_none() {
                        return Err(mismatch());
                    }
                }
                CigarOp::Del | CigarOp::RefSkip => x += l,
                _ => (),
            }
        }
        Ok(Self {
            start,
            end: x,
            mapq,
            obs,
            ix: 0,
        })
    }

    fn next_pos(&self) -> Option<usize> {
        self.obs.get(self.ix).map(|(x, _)| *x)
    }

    /// Return observation at `pos` (if any), skipping anything before it
    fn obs_at(&mut self, pos: usize) -> Option<ObservedBase> {
        while let Some((x, _)) = self.obs.get(self.ix) {
            if *x >= pos {
                break;
            }
            self.ix += 1;
        }
        match self.obs.get(self.ix) {
            Some((x, ob)) if *x == pos => {
                self.ix += 1;
                Some(*ob)
            }
            _ => None,
        }
    }
}

/// Supplies the decoded reads of one sample in coordinate order
pub trait ReadSource {
    fn name(&self) -> &str;

    /// Next read, or None when no reads remain for the contig
    fn next_read(&mut self) -> anyhow::Result<Option<AlignedRead>>;
}

/// Unmapped, secondary, QC failed, duplicate and supplementary reads are never piled up
const SKIP_FLAGS: u32 =
    (BAM_FUNMAP | BAM_FSECONDARY | BAM_FQCFAIL | BAM_FDUP | BAM_FSUPPLEMENTARY) as u32;

fn read_filtered(flag: u32, mapq: u8, min_mapq: u8) -> bool {
    (flag & SKIP_FLAGS) != 0 || mapq < min_mapq
}

/// Reads for one contig from a coordinate sorted SAM/BAM/CRAM file
pub struct HtsReads {
    name: Box<str>,
    hts: Hts,
    rec: BamRec,
    tid: usize,
    min_mapq: u8,
    min_base_qual: u8,
    filtered: usize,
    skipped: usize,
    done: bool,
}

impl HtsReads {
    fn decode(&self) -> anyhow::Result<Option<AlignedRead>> {
        let b = &self.rec;
        let (start, cigar) = match (b.pos(), b.cigar()) {
            (Some(x), Some(c)) => (x, c),
            _ => return Ok(None),
        };
        let reverse = (b.flag() & BAM_FREVERSE) != 0;
        let seq_qual = b.get_seq_qual()?;
        AlignedRead::new(
            start,
            cigar.iter().map(|c| (c.op(), c.op_len() as usize)),
            &seq_qual,
            reverse,
            b.qual(),
            self.min_base_qual,
        )
        .map(Some)
    }

    fn finish(&mut self) {
        if !self.done {
            debug!(
                "Sample {}: {} reads removed by flag or mapping quality",
                self.name, self.filtered
            );
            if self.skipped > 0 {
                warn!(
                    "Sample {}: {} reads skipped with missing position or CIGAR",
                    self.name, self.skipped
                )
            }
        }
        self.done = true;
    }
}

impl ReadSource for HtsReads {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_read(&mut self) -> anyhow::Result<Option<AlignedRead>> {
        while !self.done {
            if !self.rec.read(&mut self.hts)? {
                self.finish();
                break;
            }
            match self.rec.tid() {
                Some(t) if t == self.tid => (),
                Some(t) if t < self.tid => continue,
                _ => {
                    // Sorted input: nothing more for this contig
                    self.finish();
                    break;
                }
            }
            if read_filtered(self.rec.flag() as u32, self.rec.qual(), self.min_mapq) {
                self.filtered += 1;
                continue;
            }
            match self.decode()? {
                Some(rd) => return Ok(Some(rd)),
                None => self.skipped += 1,
            }
        }
        Ok(None)
    }
}

/// Reads of one sample overlapping the current position
struct SampleStream<R> {
    src: R,
    pending: Option<AlignedRead>,
    active: VecDeque<AlignedRead>,
    last_start: Option<usize>,
    exhausted: bool,
}

impl<R: ReadSource> SampleStream<R> {
    fn new(src: R) -> Self {
        Self {
            src,
            pending: None,
            active: VecDeque::new(),
            last_start: None,
            exhausted: false,
        }
    }

    /// Make sure every read starting at or before `pos` has been moved to the active list
    fn load_to(&mut self, pos: usize) -> anyhow::Result<()> {
        loop {
            if let Some(rd) = self.pending.take() {
                if rd.start > pos {
                    self.pending = Some(rd);
                    break;
                }
                if rd.end > pos {
                    self.active.push_back(rd)
                }
                continue;
            }
            if self.exhausted {
                break;
            }
            match self.src.next_read()? {
                Some(rd) => {
                    if let Some(x) = self.last_start
                        && rd.start < x
                    {
                        return Err(anyhow!(
                            "Input for sample {} is not coordinate sorted",
                            self.src.name()
                        ));
                    }
                    self.last_start = Some(rd.start);
                    self.pending = Some(rd)
                }
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    fn retire(&mut self, pos: usize) {
        self.active.retain(|rd| rd.end > pos)
    }

    /// Collect observations at `pos`.  Returns the sum of squared mapping qualities
    /// of contributing reads
    fn collect(&mut self, pos: usize, col: &mut SamplePileup) -> u64 {
        let mut ss = 0;
        for rd in self.active.iter_mut() {
            if let Some(ob) = rd.obs_at(pos) {
                col.push(ob);
                ss += (rd.mapq as u64) * (rd.mapq as u64);
            }
        }
        ss
    }

    fn next_pos(&self) -> Option<usize> {
        let a = self.active.iter().filter_map(|rd| rd.next_pos()).min();
        let p = self.pending.as_ref().map(|rd| rd.start);
        match (a, p) {
            (Some(x), Some(y)) => Some(x.min(y)),
            (x, None) => x,
            (None, y) => y,
        }
    }
}

/// Pileup merged from one read stream per sample
pub struct MultiPileup<R> {
    streams: Vec<SampleStream<R>>,
    column: PileupColumn,
}

/// Pileup built from one coordinate sorted SAM/BAM/CRAM file per sample
pub type BamPileup = MultiPileup<HtsReads>;

impl<R: ReadSource> MultiPileup<R> {
    pub fn from_sources(sources: Vec<R>) -> Self {
        let column = PileupColumn::new(sources.len());
        Self {
            streams: sources.into_iter().map(SampleStream::new).collect(),
            column,
        }
    }
}

impl MultiPileup<HtsReads> {
    pub fn new(
        files: Vec<(Box<str>, Hts)>,
        ctg: &str,
        min_mapq: u8,
        min_base_qual: u8,
    ) -> anyhow::Result<Self> {
        let mut sources = Vec::with_capacity(files.len());
        for (name, hts) in files {
            let tid = match hts.header() {
                Some(HtsHdr::Sam(hdr)) => hdr.name2tid(ctg).ok_or_else(|| {
                    anyhow!("Contig {} not present in header of input for sample {}", ctg, name)
                })?,
                _ => {
                    return Err(anyhow!(
                        "Wrong input file type for sample {} (expected SAM/BAM/CRAM)",
                        name
                    ));
                }
            };
            debug!("Sample {}: contig {} has tid {}", name, ctg, tid);
            sources.push(HtsReads {
                name,
                hts,
                rec: BamRec::new()?,
                tid,
                min_mapq,
                min_base_qual,
                filtered: 0,
                skipped: 0,
                done: false,
            })
        }
        Ok(Self::from_sources(sources))
    }
}

impl<R: ReadSource> PileupSource for MultiPileup<R> {
    fn n_samples(&self) -> usize {
        self.streams.len()
    }

    fn pileup(
        &mut self,
        start: usize,
        end: usize,
        f: &mut dyn FnMut(&PileupColumn) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let mut pos = start;
        while pos < end {
            let mut covered = false;
            for (st, sp) in self
                .streams
                .iter_mut()
                .zip(self.column.samples_mut().iter_mut())
            {
                st.load_to(pos)?;
                st.retire(pos);
                sp.clear();
                let ss = st.collect(pos, sp);
                if sp.depth() > 0 {
                    sp.set_rms_mapq(((ss as f64) / (sp.depth() as f64)).sqrt().round() as u16);
                    covered = true;
                }
            }
            if covered {
                self.column.set_pos(pos);
                f(&self.column)?;
                pos += 1;
            } else {
                // Jump over the gap to the next position any sample can cover
                match self.streams.iter().filter_map(|s| s.next_pos()).min() {
                    Some(x) if x > pos => pos = x,
                    Some(_) => pos += 1,
                    None => break,
                }
            }
        }
        Ok(())
    }
}
