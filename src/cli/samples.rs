use std::{
    collections::HashSet,
    io::BufRead,
    path::Path,
};

use anyhow::Context;
use compress_io::compress::CompressIo;

use crate::population::{MAX_SAMPLES, Population, PopulationSet};

pub struct SampleEntry {
    name: Box<str>,
    pop: Box<str>,
    file: Box<str>,
}

impl SampleEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pop(&self) -> &str {
        &self.pop
    }

    pub fn file(&self) -> &str {
        &self.file
    }
}

/// Tab separated sample sheet: sample name, population name and alignment file
pub struct SampleSheet {
    entries: Vec<SampleEntry>,
}

impl SampleSheet {
    pub fn from_path<S: AsRef<Path>>(file: S) -> anyhow::Result<Self> {
        let file = file.as_ref();
        let rdr = CompressIo::new().path(file).bufreader()?;
        debug!("Reading sample sheet from {}", file.display());
        Self::from_reader(rdr)
            .with_context(|| format!("Error reading sample sheet {}", file.display()))
    }

    pub fn from_reader<R: BufRead>(mut rdr: R) -> anyhow::Result<Self> {
        let mut buf = String::new();
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut line = 0;
        loop {
            buf.clear();
            if rdr.read_line(&mut buf)? == 0 {
                break;
            }
            line += 1;
            let s = buf.trim_end();
            if s.is_empty() || s.starts_with('#') {
                continue;
            }
            let fields: Vec<_> = s.split('\t').map(|f| f.trim()).collect();
            if fields.len() < 3 || fields[..3].iter().any(|f| f.is_empty()) {
                return Err(anyhow!(
                    "Expected sample, population and file at line {}",
                    line
                ));
            }
            if !seen.insert(fields[0].to_owned()) {
                return Err(anyhow!("Duplicate sample {} at line {}", fields[0], line));
            }
            entries.push(SampleEntry {
                name: fields[0].into(),
                pop: fields[1].into(),
                file: fields[2].into(),
            })
        }
        if entries.is_empty() {
            Err(anyhow!("No samples found"))
        } else if entries.len() > MAX_SAMPLES {
            Err(anyhow!(
                "Too many samples ({}): at most {} are supported",
                entries.len(),
                MAX_SAMPLES
            ))
        } else {
            Ok(Self { entries })
        }
    }

    pub fn entries(&self) -> &[SampleEntry] {
        &self.entries
    }

    /// Build population masks, numbering populations by order of first appearance.
    /// `pop_min` gives per population overrides of the minimum coverage proportion.
    pub fn populations(
        &self,
        min_prop: f64,
        pop_min: &[(Box<str>, f64)],
    ) -> anyhow::Result<PopulationSet> {
        let mut pops: Vec<Population> = Vec::new();
        for (i, e) in self.entries.iter().enumerate() {
            match pops.iter_mut().find(|p| p.name() == e.pop()) {
                Some(p) => *p = Population::new(e.pop(), p.mask() | (1 << i), min_prop),
                None => pops.push(Population::new(e.pop(), 1 << i, min_prop)),
            }
        }
        for (name, x) in pop_min {
            let p = pops
                .iter_mut()
                .find(|p| p.name() == &**name)
                .ok_or_else(|| anyhow!("Unknown population {} in --pop-min", name))?;
            p.set_min_prop(*x)
        }
        for p in pops.iter() {
            debug!(
                "Population {}: {} samples, mask {:#x}, required coverage {}",
                p.name(),
                p.size(),
                p.mask(),
                p.required_coverage()
            );
        }
        let samples = self.entries.iter().map(|e| e.name.clone()).collect();
        PopulationSet::new(samples, pops)
    }
}

/// Parse POP=FLOAT
pub fn parse_pop_min(s: &str) -> anyhow::Result<(Box<str>, f64)> {
    let (name, x) = s
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("Expected POP=FLOAT for --pop-min, found {}", s))?;
    let x = x
        .parse::<f64>()
        .with_context(|| format!("Could not parse proportion in --pop-min {}", s))?;
    Ok((name.into(), x))
}
