use std::rc::Rc;

use regex::{Match, Regex};

use crate::{reference::Reference, window::Window};

pub struct Region {
    tid: usize,
    name: Rc<str>,
    start: usize,
    stop: usize,
    ctg_size: usize,
}

impl Region {
    pub fn from_str(reg_str: &str, reference: &Reference) -> anyhow::Result<Self> {
        let err = |s| Err(anyhow!("Could not parse region string '{}'", s,));

        let parse_x = |s: Match| parse_usize_with_commas(s.as_str());

        let reg = Regex::new(r#"^([^:]+):?([0-9,]+)?-?([0-9,]+)?$"#)?;
        if let Some(cap) = reg.captures(reg_str) {
            match (cap.get(1), cap.get(2), cap.get(3)) {
                (Some(c), None, None) => Self::new(c.as_str(), None, None, reference),
                (Some(c), Some(p), None) => Self::new(c.as_str(), Some(parse_x(p)?), None, reference),
                (Some(c), Some(p), Some(q)) => {
                    Self::new(c.as_str(), Some(parse_x(p)?), Some(parse_x(q)?), reference)
                }
                _ => err(reg_str),
            }
        } else {
            err(reg_str)
        }
    }

    /// Region from 1 based inclusive coordinates
    pub fn new(
        chrom: &str,
        start: Option<usize>,
        stop: Option<usize>,
        reference: &Reference,
    ) -> anyhow::Result<Self> {
        let ctg = reference
            .name2contig(chrom)
            .ok_or_else(|| anyhow!("Contig {} not present in reference", chrom))?;
        let ctg_size = ctg.size();
        if ctg_size == 0 {
            return Err(anyhow!("Contig {} has zero length", chrom));
        }
        let start = start.unwrap_or(1).max(1) - 1;
        let stop = stop.unwrap_or(ctg_size).max(1).min(ctg_size) - 1;
        debug!("Chromosome region: {}:{}-{}", ctg.name(), start + 1, stop + 1);
        if stop >= start {
            Ok(Region {
                tid: ctg.tid(),
                name: Rc::from(ctg.name()),
                start,
                stop,
                ctg_size,
            })
        } else {
            Err(anyhow!("Invalid range - stop < start"))
        }
    }

    pub fn tid(&self) -> usize {
        self.tid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last position of the region (0 offset)
    pub fn end(&self) -> usize {
        self.stop + 1
    }

    pub fn len(&self) -> usize {
        self.stop + 1 - self.start
    }

    pub fn ctg_size(&self) -> usize {
        self.ctg_size
    }

    /// Tile the region with consecutive windows of `size` bases (the last may be shorter).
    /// With no size a single window covers the whole region.
    pub fn windows(&self, size: Option<usize>) -> Vec<Window> {
        let size = size.unwrap_or_else(|| self.len()).max(1);
        let end = self.end();
        (self.start..end)
            .step_by(size)
            .map(|x| Window::new(x, (x + size).min(end)))
            .collect()
    }
}

fn parse_usize_with_commas(s: &str) -> anyhow::Result<usize> {
    s.replace(',', "")
        .parse::<usize>()
        .map_err(|e| anyhow!("Could not parse coordinate {}: {}", s, e))
}
