//! Site frequency spectrum statistics: Tajima's D and normalized Fay & Wu's H
//!
//! Both statistics are sums of per-site weights depending only on the number of covered
//! samples n and the derived allele count i, divided by the square root of a variance
//! estimate that depends on the mean n and the number of contributing sites.

use crate::{population::PopulationSet, window::WindowData};

/// v[n] = sum_{j<n} 1/j^pow, with v[0] = v[1] = 1
fn harmonic(size: usize, pow: i32) -> Vec<f64> {
    let mut v = vec![1.0; size];
    let mut s = 0.0;
    for (i, x) in v.iter_mut().enumerate().skip(2) {
        s += ((i - 1) as f64).powi(-pow);
        *x = s
    }
    v
}

/// Coefficient tables indexed by sample size.  Built once for the maximum sample size.
#[derive(Debug)]
pub struct SfsConstants {
    a1: Vec<f64>,
    a2: Vec<f64>,
    e1: Vec<f64>,
    e2: Vec<f64>,
    dw: Vec<Vec<f64>>,
    hw: Vec<Vec<f64>>,
}

impl SfsConstants {
    pub fn new(max_n: usize) -> Self {
        let a1 = harmonic(max_n + 1, 1);
        // One extra entry needed for Var(H)
        let a2 = harmonic(max_n + 2, 2);

        let mut e1 = vec![1.0; max_n + 1];
        let mut e2 = vec![1.0; max_n + 1];
        let mut dw = vec![Vec::new(); max_n + 1];
        let mut hw = vec![Vec::new(); max_n + 1];
        for n in 2..=max_n {
            let nf = n as f64;
            let b1 = (nf + 1.0) / (3.0 * (nf - 1.0));
            let b2 = 2.0 * (nf * nf + nf + 3.0) / (9.0 * nf * (nf - 1.0));
            e1[n] = (b1 - 1.0 / a1[n]) / a1[n];
            e2[n] = (b2 - (nf + 2.0) / (a1[n] * nf) + a2[n] / (a1[n] * a1[n]))
                / (a1[n] * a1[n] + a2[n]);

            // Per site contributions to theta_pi - theta_W and theta_pi - theta_L
            let pi = |i: f64| 2.0 * i * (nf - i) / (nf * (nf - 1.0));
            dw[n] = (0..n)
                .map(|i| {
                    if i == 0 {
                        0.0
                    } else {
                        pi(i as f64) - 1.0 / a1[n]
                    }
                })
                .collect();
            hw[n] = (0..n)
                .map(|i| {
                    if i == 0 {
                        0.0
                    } else {
                        pi(i as f64) - (i as f64) / (nf - 1.0)
                    }
                })
                .collect();
        }
        Self {
            a1,
            a2,
            e1,
            e2,
            dw,
            hw,
        }
    }

    pub fn a1(&self, n: usize) -> f64 {
        self.a1[n]
    }

    pub fn a2(&self, n: usize) -> f64 {
        self.a2[n]
    }

    pub fn e1(&self, n: usize) -> f64 {
        self.e1[n]
    }

    pub fn e2(&self, n: usize) -> f64 {
        self.e2[n]
    }

    pub fn dw(&self, n: usize, i: usize) -> f64 {
        self.dw[n][i]
    }

    pub fn hw(&self, n: usize, i: usize) -> f64 {
        self.hw[n][i]
    }

    fn var_d(&self, n: usize, s: f64) -> f64 {
        self.e1[n] * s + self.e2[n] * s * (s - 1.0)
    }

    fn var_h(&self, n: usize, s: f64) -> f64 {
        let nf = n as f64;
        let a1 = self.a1[n];
        let theta = s / a1;
        let theta_sq = s * (s - 1.0) / (a1 * a1 + self.a2[n]);
        (nf - 2.0) * theta / (6.0 * (nf - 1.0))
            + theta_sq
                * (18.0 * nf * nf * (3.0 * nf + 2.0) * self.a2[n + 1]
                    - (88.0 * nf * nf * nf + 9.0 * nf * nf - 13.0 * nf + 6.0))
                / (9.0 * nf * (nf - 1.0) * (nf - 1.0))
    }
}

#[derive(Debug, Copy, Clone)]
pub struct SfsResult {
    /// Positions in the window aligned for this population
    pub aligned: usize,
    /// Sites polymorphic within the population
    pub n_snps: usize,
    pub tajima_d: f64,
    pub fay_wu_h: f64,
}

fn sfs_pop(
    wd: &WindowData,
    pops: &PopulationSet,
    k: &SfsConstants,
    ix: usize,
    min_sites: f64,
) -> SfsResult {
    let mut res = SfsResult {
        aligned: wd.aligned(ix),
        n_snps: 0,
        tajima_d: f64::NAN,
        fay_wu_h: f64::NAN,
    };
    if !wd.enough_aligned(ix, min_sites) {
        return res;
    }
    let pop = &pops.pops()[ix];
    let og = pops.outgroup().map(|i| 1u64 << i);
    let (mut td, mut fwh) = (0.0, 0.0);
    let mut sum_n = 0;
    for ((t, c), n) in wd
        .site_types()
        .iter()
        .zip(wd.site_cov())
        .zip(wd.coverage(ix))
    {
        let n = *n as usize;
        let x = pop.count(*t);
        // Polarize by outgroup if it is covered and carries the derived allele
        let freq = match og {
            Some(m) if c & t & m != 0 => n.saturating_sub(x),
            _ => x,
        };
        if freq > 0 && freq < n {
            td += k.dw(n, freq);
            fwh += k.hw(n, freq);
            sum_n += n;
            res.n_snps += 1;
        }
    }
    if res.n_snps > 0 {
        let s = res.n_snps as f64;
        let n = ((sum_n as f64) / s).round() as usize;
        res.tajima_d = td / k.var_d(n, s).sqrt();
        res.fay_wu_h = fwh / k.var_h(n, s).sqrt();
    }
    trace!(
        "Population {}: {} aligned, {} snps, D = {}, H = {}",
        pop.name(),
        res.aligned,
        res.n_snps,
        res.tajima_d,
        res.fay_wu_h
    );
    res
}

/// Tajima's D and Fay & Wu's H for every population.  Populations with too few aligned
/// positions or no polymorphic sites get NaN.
pub fn calc_sfs(
    wd: &WindowData,
    pops: &PopulationSet,
    k: &SfsConstants,
    min_sites: f64,
) -> Vec<SfsResult> {
    (0..pops.n_pops())
        .map(|ix| sfs_pop(wd, pops, k, ix, min_sites))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        population::Population,
        window::{Window, WindowData},
    };

    fn same(a: f64, b: f64) -> bool {
        (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-10
    }

    fn setup(masks: &[u64], n: usize) -> PopulationSet {
        PopulationSet::new(
            (0..n).map(|i| format!("s{}", i).into()).collect(),
            masks
                .iter()
                .enumerate()
                .map(|(i, m)| Population::new(&format!("p{}", i), *m, 1.0))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn constants() {
        let k = SfsConstants::new(10);
        assert!(same(k.a1(4), 11.0 / 6.0));
        assert!(same(k.a2(4), 49.0 / 36.0));
        assert!(same(k.a2(11), (1..=10).map(|j| 1.0 / (j * j) as f64).sum()));
        assert!(same(k.e1(4), 6.0 / 1089.0));
        let e2 = (23.0 / 54.0 - 9.0 / 11.0 + 49.0 / 121.0) / (170.0 / 36.0);
        assert!(same(k.e2(4), e2));
        assert!(same(k.dw(4, 1) + k.dw(4, 2), 5.0 / 66.0));
        assert!(same(k.hw(4, 1), 1.0 / 6.0));
        assert!(same(k.hw(4, 2), 0.0));
    }

    #[test]
    fn single_site_two_populations() {
        let ps = setup(&[0b0011, 0b1100], 4);
        let k = SfsConstants::new(4);
        let mut wd = WindowData::new(2);
        wd.reset(Window::new(0, 1)).unwrap();
        wd.add_position(0, 0b1111, Some(0b0001), &ps).unwrap();
        let res = calc_sfs(&wd, &ps, &k, 0.5);
        assert_eq!(res[0].aligned, 1);
        assert_eq!(res[0].n_snps, 1);
        assert_eq!(res[1].n_snps, 0);
        let expected = k.dw(2, 1) / k.e1(2).sqrt();
        assert!(same(res[0].tajima_d, expected));
        assert!(res[1].tajima_d.is_nan() && res[1].fay_wu_h.is_nan());
    }

    #[test]
    fn two_sites_one_population() {
        let ps = setup(&[0b1111], 4);
        let k = SfsConstants::new(4);
        let mut wd = WindowData::new(1);
        wd.reset(Window::new(0, 4)).unwrap();
        wd.add_position(0, 0b1111, Some(0b0001), &ps).unwrap();
        wd.add_position(1, 0b1111, Some(0b0011), &ps).unwrap();
        wd.add_position(2, 0b1111, None, &ps).unwrap();
        let res = calc_sfs(&wd, &ps, &k, 0.5);
        assert_eq!(res[0].aligned, 3);
        assert_eq!(res[0].n_snps, 2);

        let d = (5.0 / 66.0) / (2.0 * k.e1(4) + 2.0 * k.e2(4)).sqrt();
        assert!(same(res[0].tajima_d, d));

        let a1: f64 = 11.0 / 6.0;
        let a2_5 = 205.0 / 144.0;
        let var_h: f64 = 2.0 * (2.0 / a1) / 18.0
            + (2.0 / (170.0 / 36.0)) * (4032.0 * a2_5 - 5730.0) / 324.0;
        assert!(same(res[0].fay_wu_h, (1.0 / 6.0) / var_h.sqrt()));
    }

    #[test]
    fn insufficient_alignment() {
        let ps = setup(&[0b1111], 4);
        let k = SfsConstants::new(4);
        let mut wd = WindowData::new(1);
        wd.reset(Window::new(0, 10)).unwrap();
        wd.add_position(0, 0b1111, Some(0b0001), &ps).unwrap();
        wd.add_position(1, 0b1111, Some(0b0011), &ps).unwrap();
        let res = calc_sfs(&wd, &ps, &k, 0.5);
        assert_eq!(res[0].aligned, 2);
        assert!(res[0].tajima_d.is_nan() && res[0].fay_wu_h.is_nan());
    }

    #[test]
    fn outgroup_polarization() {
        let mut ps = setup(&[0b0111, 0b1000], 4);
        let k = SfsConstants::new(4);
        let mut wd = WindowData::new(2);
        wd.reset(Window::new(0, 2)).unwrap();
        wd.add_position(0, 0b1111, Some(0b1001), &ps).unwrap();
        wd.add_position(1, 0b1111, Some(0b0010), &ps).unwrap();
        let h0 = calc_sfs(&wd, &ps, &k, 0.5)[0].fay_wu_h;
        ps.set_outgroup("s3").unwrap();
        let h1 = calc_sfs(&wd, &ps, &k, 0.5)[0].fay_wu_h;
        // Unpolarized both sites are singletons; polarized the first becomes a doubleton
        assert!(h0 > 0.0);
        assert!(h1 < h0);
        let fwh = k.hw(3, 2) + k.hw(3, 1);
        assert!(same(h1, fwh / k.var_h(3, 2.0).sqrt()));
    }
}
