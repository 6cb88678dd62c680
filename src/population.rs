//! Populations as sample bitmasks
//!
//! Sample i corresponds to bit i of every mask, so at most 64 samples are supported.

pub const MAX_SAMPLES: usize = 64;

#[derive(Debug, Clone)]
pub struct Population {
    name: Box<str>,
    mask: u64,
    min_prop: f64,
}

impl Population {
    pub fn new(name: &str, mask: u64, min_prop: f64) -> Self {
        Self {
            name: name.into(),
            mask,
            min_prop,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn size(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub fn min_prop(&self) -> f64 {
        self.min_prop
    }

    pub fn set_min_prop(&mut self, p: f64) {
        self.min_prop = p
    }

    /// Number of covered samples needed for a position to count as aligned for this population
    pub fn required_coverage(&self) -> usize {
        (self.min_prop * self.size() as f64 - 1.0e-8).ceil().max(0.0) as usize
    }

    /// Number of samples of this population set in `x`
    pub fn count(&self, x: u64) -> usize {
        (x & self.mask).count_ones() as usize
    }
}

#[derive(Debug, Clone)]
pub struct PopulationSet {
    samples: Vec<Box<str>>,
    pops: Vec<Population>,
    outgroup: Option<usize>,
}

impl PopulationSet {
    pub fn new(samples: Vec<Box<str>>, pops: Vec<Population>) -> anyhow::Result<Self> {
        if samples.is_empty() {
            return Err(anyhow!("No samples specified"));
        }
        if samples.len() > MAX_SAMPLES {
            return Err(anyhow!(
                "Too many samples ({}): at most {} are supported",
                samples.len(),
                MAX_SAMPLES
            ));
        }
        let all = if samples.len() == MAX_SAMPLES {
            u64::MAX
        } else {
            (1u64 << samples.len()) - 1
        };
        let mut seen = 0;
        for p in pops.iter() {
            if p.mask() == 0 || (p.mask() & !all) != 0 {
                return Err(anyhow!("Invalid sample mask for population {}", p.name()));
            }
            if !(0.0..=1.0).contains(&p.min_prop()) {
                return Err(anyhow!(
                    "Minimum coverage proportion for population {} must lie between 0 and 1",
                    p.name()
                ));
            }
            seen |= p.mask();
        }
        if seen != all {
            return Err(anyhow!("Not all samples are assigned to a population"));
        }
        Ok(Self {
            samples,
            pops,
            outgroup: None,
        })
    }

    pub fn set_outgroup(&mut self, name: &str) -> anyhow::Result<()> {
        let ix = self
            .sample_index(name)
            .ok_or_else(|| anyhow!("Outgroup sample {} not found", name))?;
        self.outgroup = Some(ix);
        Ok(())
    }

    pub fn sample_index(&self, name: &str) -> Option<usize> {
        self.samples.iter().position(|s| &**s == name)
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[Box<str>] {
        &self.samples
    }

    pub fn n_pops(&self) -> usize {
        self.pops.len()
    }

    pub fn pops(&self) -> &[Population] {
        &self.pops
    }

    pub fn outgroup(&self) -> Option<usize> {
        self.outgroup
    }

    /// Population coverage flags for a position with sample coverage mask `cov`.
    /// Bit p is set iff population p reaches its required coverage.
    pub fn coverage_flags(&self, cov: u64) -> u64 {
        self.pops
            .iter()
            .enumerate()
            .filter(|(_, p)| p.count(cov) >= p.required_coverage())
            .fold(0, |f, (i, _)| f | (1 << i))
    }
}
