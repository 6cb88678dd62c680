//! Per-window accumulation of aligned and segregating sites

use std::fmt;

use crate::population::PopulationSet;

/// Up-front reservation is capped at this many entries; beyond it storage grows on demand
const MAX_RESERVE: usize = 1 << 20;

/// Half open genomic interval (0 offset)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "Window start after end");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.start + 1, self.end)
    }
}

fn try_push<T>(v: &mut Vec<T>, x: T) -> anyhow::Result<()> {
    if v.len() == v.capacity() {
        v.try_reserve(v.len().max(64))
            .map_err(|e| anyhow!("Could not grow window buffer: {}", e))?
    }
    v.push(x);
    Ok(())
}

fn try_reset<T>(v: &mut Vec<T>, size: usize) -> anyhow::Result<()> {
    v.clear();
    v.try_reserve_exact(size)
        .map_err(|e| anyhow!("Could not allocate window buffer of {} entries: {}", size, e))
}

/// Sites collected for one window.  Storage is reused from window to window.
#[derive(Debug)]
pub struct WindowData {
    window: Window,
    last_pos: Option<usize>,
    // Population coverage flags for every position where at least one population is aligned
    pop_cov: Vec<u64>,
    // For segregating sites, in position order
    site_types: Vec<u64>,
    site_cov: Vec<u64>,
    coverage: Vec<Vec<u16>>,
    aligned: Vec<usize>,
}

impl WindowData {
    pub fn new(n_pops: usize) -> Self {
        Self {
            window: Window::new(0, 0),
            last_pos: None,
            pop_cov: Vec::new(),
            site_types: Vec::new(),
            site_cov: Vec::new(),
            coverage: vec![Vec::new(); n_pops],
            aligned: vec![0; n_pops],
        }
    }

    /// Clear all data and prepare for a new window
    pub fn reset(&mut self, window: Window) -> anyhow::Result<()> {
        let size = window.len().min(MAX_RESERVE);
        self.window = window;
        self.last_pos = None;
        try_reset(&mut self.pop_cov, size)?;
        try_reset(&mut self.site_types, size)?;
        try_reset(&mut self.site_cov, size)?;
        for v in self.coverage.iter_mut() {
            try_reset(v, size)?
        }
        self.aligned.iter_mut().for_each(|x| *x = 0);
        Ok(())
    }

    /// Record one position.  `cov` is the sample coverage mask and `site_type` is present
    /// for segregating sites.  Positions must arrive in ascending order.
    pub fn add_position(
        &mut self,
        pos: usize,
        cov: u64,
        site_type: Option<u64>,
        pops: &PopulationSet,
    ) -> anyhow::Result<()> {
        if !self.window.contains(pos) {
            return Err(anyhow!(
                "Position {} outside of window {}",
                pos + 1,
                self.window
            ));
        }
        if let Some(x) = self.last_pos
            && pos <= x
        {
            return Err(anyhow!(
                "Positions out of order ({} after {})",
                pos + 1,
                x + 1
            ));
        }
        self.last_pos = Some(pos);
        let flags = pops.coverage_flags(cov);
        if flags == 0 {
            return Ok(());
        }
        try_push(&mut self.pop_cov, flags)?;
        for (i, a) in self.aligned.iter_mut().enumerate() {
            if (flags >> i) & 1 != 0 {
                *a += 1
            }
        }
        if let Some(t) = site_type {
            try_push(&mut self.site_types, t)?;
            try_push(&mut self.site_cov, cov)?;
            for (v, p) in self.coverage.iter_mut().zip(pops.pops()) {
                try_push(v, p.count(cov) as u16)?
            }
        }
        Ok(())
    }

    pub fn pop_cov(&self) -> &[u64] {
        &self.pop_cov
    }

    pub fn n_aligned_positions(&self) -> usize {
        self.pop_cov.len()
    }

    pub fn n_sites(&self) -> usize {
        self.site_types.len()
    }

    pub fn site_types(&self) -> &[u64] {
        &self.site_types
    }

    pub fn site_cov(&self) -> &[u64] {
        &self.site_cov
    }

    /// Covered samples of population `pop` at each segregating site
    pub fn coverage(&self, pop: usize) -> &[u16] {
        &self.coverage[pop]
    }

    pub fn aligned(&self, pop: usize) -> usize {
        self.aligned[pop]
    }

    /// Does population `pop` have enough aligned positions in this window?
    pub fn enough_aligned(&self, pop: usize, min_sites: f64) -> bool {
        self.aligned[pop] as f64 >= min_sites * self.window.len() as f64
    }
}
