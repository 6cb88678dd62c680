//! Linkage disequilibrium statistics: ZnS, omega max and Wall's B and Q
//!
//! All three work on the segregating sites of a window that are polymorphic within a
//! population (with both alleles present at least `min_freq` times).  Only samples
//! covered at the sites concerned take part in a comparison.

use std::fmt;

use clap::{ValueEnum, builder::PossibleValue};

use crate::{population::PopulationSet, window::WindowData};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LdStat {
    Zns,
    OmegaMax,
    Wall,
}

impl ValueEnum for LdStat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Zns, Self::OmegaMax, Self::Wall]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        match self {
            Self::Zns => Some(PossibleValue::new("zns")),
            Self::OmegaMax => Some(PossibleValue::new("omega-max")),
            Self::Wall => Some(PossibleValue::new("wall")),
        }
    }
}

impl fmt::Display for LdStat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Zns => "ZnS",
            Self::OmegaMax => "omega max",
            Self::Wall => "Wall's B and Q",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LdValue {
    Zns(f64),
    OmegaMax(f64),
    Wall { b: f64, q: f64 },
}

impl LdValue {
    fn undefined(stat: LdStat) -> Self {
        match stat {
            LdStat::Zns => Self::Zns(f64::NAN),
            LdStat::OmegaMax => Self::OmegaMax(f64::NAN),
            LdStat::Wall => Self::Wall {
                b: f64::NAN,
                q: f64::NAN,
            },
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct LdParams {
    pub stat: LdStat,
    pub min_freq: usize,
    pub min_snps: usize,
    pub min_sites: f64,
}

#[derive(Debug, Copy, Clone)]
pub struct LdResult {
    /// Qualifying sites
    pub n_snps: usize,
    pub value: LdValue,
}

/// Segregating site restricted to one population
#[derive(Debug, Copy, Clone)]
struct PopSite {
    derived: u64, // Covered carriers of the derived allele
    mask: u64,    // Covered samples
}

fn r2(s0: &PopSite, s1: &PopSite) -> f64 {
    let m = s0.mask & s1.mask;
    let n = m.count_ones() as f64;
    let x0 = (s0.derived & m).count_ones() as f64;
    let x1 = (s1.derived & m).count_ones() as f64;
    let x11 = (s0.derived & s1.derived & m).count_ones() as f64;
    let denom = (n - x0) * x0 * (n - x1) * x1;
    if denom > 0.0 {
        let d = x0 * x1 - n * x11;
        d * d / denom
    } else {
        0.0
    }
}

fn binom2(n: usize) -> f64 {
    (n * n.saturating_sub(1)) as f64 / 2.0
}

fn zns(sites: &[PopSite]) -> f64 {
    let k = sites.len();
    if k < 2 {
        return f64::NAN;
    }
    let mut sum = 0.0;
    for (i, s0) in sites[..k - 1].iter().enumerate() {
        for s1 in sites[i + 1..].iter() {
            sum += r2(s0, s1)
        }
    }
    sum / binom2(k)
}

/// Omega max from a full symmetric k x k matrix of r2 values (diagonal ignored).
fn omega_max(r2: &[f64], k: usize) -> anyhow::Result<f64> {
    if k < 3 {
        return Ok(f64::NAN);
    }
    // 2D prefix sums with zeroed diagonal: ps[i][j] = sum of r2[a][b] for a < i, b < j
    let dim = k + 1;
    let mut ps = Vec::new();
    ps.try_reserve_exact(dim * dim)
        .map_err(|e| anyhow!("Could not allocate prefix sum matrix for {} sites: {}", k, e))?;
    ps.resize(dim * dim, 0.0);
    for i in 0..k {
        let mut row = 0.0;
        for j in 0..k {
            if i != j {
                row += r2[i * k + j]
            }
            ps[(i + 1) * dim + j + 1] = ps[i * dim + j + 1] + row;
        }
    }
    let p = |i: usize, j: usize| ps[i * dim + j];
    let mut best: Option<f64> = None;
    for i in 1..k - 1 {
        let (l, r) = (i + 1, k - i - 1);
        let left = p(l, l) / 2.0;
        let right = (p(k, k) - p(l, k) - p(k, l) + p(l, l)) / 2.0;
        let between = p(l, k) - p(l, l);
        if between <= 0.0 {
            continue;
        }
        let omega = ((left + right) / (binom2(l) + binom2(r))) * ((l * r) as f64 / between);
        best = Some(best.map_or(omega, |b| b.max(omega)));
    }
    Ok(best.unwrap_or(f64::NAN))
}

fn omega_max_sites(sites: &[PopSite]) -> anyhow::Result<f64> {
    let k = sites.len();
    if k < 3 {
        return Ok(f64::NAN);
    }
    let mut m = Vec::new();
    m.try_reserve_exact(k * k)
        .map_err(|e| anyhow!("Could not allocate r2 matrix for {} sites: {}", k, e))?;
    m.resize(k * k, 0.0);
    for i in 0..k - 1 {
        for j in i + 1..k {
            let x = r2(&sites[i], &sites[j]);
            m[i * k + j] = x;
            m[j * k + i] = x;
        }
    }
    omega_max(&m, k)
}

/// Wall's B and Q.  Partitions are compared in canonical form (the smaller of the pattern
/// and its complement within the covered samples).
fn wall(sites: &[PopSite]) -> (f64, f64) {
    let k = sites.len();
    if k < 2 {
        return (f64::NAN, f64::NAN);
    }
    let canonical = |s: &PopSite| s.derived.min(!s.derived & s.mask);
    let mut congruent = 0;
    let mut partitions: Vec<u64> = Vec::new();
    for w in sites.windows(2) {
        let (a, b) = (canonical(&w[0]), canonical(&w[1]));
        if a == b && w[0].mask == w[1].mask {
            congruent += 1;
            if !partitions.contains(&a) {
                partitions.push(a)
            }
        }
    }
    (
        congruent as f64 / (k - 1) as f64,
        (congruent + partitions.len()) as f64 / k as f64,
    )
}

fn ld_pop(
    wd: &WindowData,
    pops: &PopulationSet,
    ix: usize,
    par: &LdParams,
) -> anyhow::Result<LdResult> {
    let pop = &pops.pops()[ix];
    let sites: Vec<_> = wd
        .site_types()
        .iter()
        .zip(wd.site_cov())
        .filter_map(|(t, c)| {
            let mask = pop.mask() & c;
            let n = mask.count_ones() as usize;
            let derived = t & mask;
            let x = derived.count_ones() as usize;
            if x >= par.min_freq && x + par.min_freq <= n {
                Some(PopSite { derived, mask })
            } else {
                None
            }
        })
        .collect();
    let n_snps = sites.len();
    let value = if !wd.enough_aligned(ix, par.min_sites) || n_snps < par.min_snps {
        LdValue::undefined(par.stat)
    } else {
        match par.stat {
            LdStat::Zns => LdValue::Zns(zns(&sites)),
            LdStat::OmegaMax => LdValue::OmegaMax(omega_max_sites(&sites)?),
            LdStat::Wall => {
                let (b, q) = wall(&sites);
                LdValue::Wall { b, q }
            }
        }
    };
    trace!(
        "Population {}: {} qualifying sites, {:?}",
        pop.name(),
        n_snps,
        value
    );
    Ok(LdResult { n_snps, value })
}

/// Calculate the selected LD statistic for every population
pub fn calc_ld(
    wd: &WindowData,
    pops: &PopulationSet,
    par: &LdParams,
) -> anyhow::Result<Vec<LdResult>> {
    (0..pops.n_pops())
        .map(|ix| ld_pop(wd, pops, ix, par))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        population::Population,
        window::{Window, WindowData},
    };

    fn site(derived: u64, mask: u64) -> PopSite {
        PopSite { derived, mask }
    }

    fn params(stat: LdStat) -> LdParams {
        LdParams {
            stat,
            min_freq: 1,
            min_snps: 2,
            min_sites: 0.5,
        }
    }

    #[test]
    fn r2_values() {
        let m = 0b1111;
        assert!((r2(&site(0b0011, m), &site(0b0011, m)) - 1.0).abs() < 1e-10);
        assert!((r2(&site(0b0011, m), &site(0b1100, m)) - 1.0).abs() < 1e-10);
        assert!(r2(&site(0b0011, m), &site(0b0101, m)).abs() < 1e-10);
        // (1*2 - 4*1)^2 / (3*1*2*2) = 1/3
        assert!((r2(&site(0b0001, m), &site(0b0011, m)) - 1.0 / 3.0).abs() < 1e-10);
        // Only one covered sample in common: monomorphic in the joint sample
        assert_eq!(r2(&site(0b0001, 0b0011), &site(0b0100, 0b0110)), 0.0);
    }

    #[test]
    fn zns_needs_pairs() {
        assert!(zns(&[]).is_nan());
        assert!(zns(&[site(1, 3)]).is_nan());
        let s = [site(0b0011, 0b1111), site(0b0011, 0b1111), site(0b0101, 0b1111)];
        assert!((zns(&s) - 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn omega_constant_matrix() {
        let c = 0.3;
        let k = 3;
        let mut m = vec![c; k * k];
        for i in 0..k {
            m[i * k + i] = 0.0
        }
        // left = 2, right = 1: (c / 1) * (2 / 2c)
        assert!((omega_max(&m, k).unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn omega_two_blocks() {
        let k = 4;
        let mut m = vec![0.1; k * k];
        for i in 0..k {
            m[i * k + i] = 0.0
        }
        m[1] = 1.0;
        m[k] = 1.0;
        m[2 * k + 3] = 1.0;
        m[3 * k + 2] = 1.0;
        // Split in the middle: (2 / 2) * (4 / 0.4)
        assert!((omega_max(&m, k).unwrap() - 10.0).abs() < 1e-10);
    }

    #[test]
    fn omega_undefined() {
        assert!(omega_max(&[0.0; 4], 2).unwrap().is_nan());
        // No LD across any split
        let k = 3;
        let m = vec![0.0; k * k];
        assert!(omega_max(&m, k).unwrap().is_nan());
    }

    #[test]
    fn wall_statistics() {
        let m = 0b1111;
        let s = [
            site(0b0011, m),
            site(0b1100, m),
            site(0b0011, m),
            site(0b0101, m),
            site(0b0001, m),
        ];
        let (b, q) = wall(&s);
        // Two congruent pairs out of four, one distinct partition
        assert!((b - 0.5).abs() < 1e-10);
        assert!((q - 3.0 / 5.0).abs() < 1e-10);
        let (b, q) = wall(&s[..1]);
        assert!(b.is_nan() && q.is_nan());
    }

    #[test]
    fn wall_bounds() {
        let m = 0b111111;
        let types = [0b000011u64, 0b111100, 0b000111, 0b111000, 0b000111, 0b010101, 0b101010];
        let s: Vec<_> = types.iter().map(|t| site(*t, m)).collect();
        for k in 2..=s.len() {
            let (b, q) = wall(&s[..k]);
            assert!((0.0..=1.0).contains(&b), "B = {}", b);
            assert!((0.0..=1.0).contains(&q), "Q = {}", q);
        }
    }

    #[test]
    fn populations_are_independent() {
        let ps = PopulationSet::new(
            (0..8).map(|i| format!("s{}", i).into()).collect(),
            vec![
                Population::new("a", 0x0f, 1.0),
                Population::new("b", 0xf0, 1.0),
            ],
        )
        .unwrap();
        let mut wd = WindowData::new(2);
        wd.reset(Window::new(0, 4)).unwrap();
        for (i, t) in [0x03u64, 0x03, 0x01].iter().enumerate() {
            wd.add_position(i, 0xff, Some(*t), &ps).unwrap();
        }
        let res = calc_ld(&wd, &ps, &params(LdStat::Zns)).unwrap();
        assert_eq!(res[0].n_snps, 3);
        match res[0].value {
            LdValue::Zns(z) => assert!((z - (1.0 + 1.0 / 3.0 + 1.0 / 3.0) / 3.0).abs() < 1e-10),
            _ => panic!("Wrong statistic"),
        }
        assert_eq!(res[1].n_snps, 0);
        match res[1].value {
            LdValue::Zns(z) => assert!(z.is_nan()),
            _ => panic!("Wrong statistic"),
        }
    }

    #[test]
    fn singletons_excluded() {
        let ps = PopulationSet::new(
            (0..4).map(|i| format!("s{}", i).into()).collect(),
            vec![Population::new("a", 0x0f, 1.0)],
        )
        .unwrap();
        let mut wd = WindowData::new(1);
        wd.reset(Window::new(0, 4)).unwrap();
        for (i, t) in [0x03u64, 0x01, 0x06, 0x08].iter().enumerate() {
            wd.add_position(i, 0x0f, Some(*t), &ps).unwrap();
        }
        let mut par = params(LdStat::Wall);
        assert_eq!(calc_ld(&wd, &ps, &par).unwrap()[0].n_snps, 4);
        par.min_freq = 2;
        let res = calc_ld(&wd, &ps, &par).unwrap();
        assert_eq!(res[0].n_snps, 2);
        // 0b0011 and 0b0110 are different partitions
        assert_eq!(res[0].value, LdValue::Wall { b: 0.0, q: 0.0 });
    }
}
