//! Dependency-aware base error model
//!
//! Genotype likelihoods are expressed as phred scaled penalties (lower is more likely),
//! one for each unordered pair of alleles.  Errors from the same strand and quality
//! stratum are treated as partially dependent, with the contribution of the k'th
//! repeated observation weighted down by `fk[k]`.

use libc::c_double;
use rand::{Rng, seq::SliceRandom};

use crate::pileup::{MAX_QUAL, N_BASES};

#[link(name = "m")]
unsafe extern "C" {
    unsafe fn lgamma(x: c_double) -> c_double;
}

/// Floor for the error probability of a single read
pub const ETA: f64 = 0.03;

/// Maximum number of observations used per sample and position
pub const MAX_DEPTH: usize = 255;

const MIN_QUAL: u16 = N_BASES as u16;
const TABLE_DIM: usize = MAX_DEPTH + 1;
const TO_PHRED: f64 = 10.0 / std::f64::consts::LN_10;

fn addlog(x1: f64, x2: f64) -> f64 {
    if x1 > x2 {
        let diff = x2 - x1;
        if diff < -745.0 {
            x1
        } else {
            x1 + diff.exp().ln_1p()
        }
    } else {
        let diff = x1 - x2;
        if diff < -745.0 {
            x2
        } else {
            x2 + diff.exp().ln_1p()
        }
    }
}

fn lfact(x: usize) -> f64 {
    unsafe { lgamma((x + 1) as f64) }
}

/// Phred scaled penalties for the 16 ordered allele pairs.  The matrix is symmetric.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct GenotypeLikelihood([[f64; N_BASES]; N_BASES]);

impl GenotypeLikelihood {
    pub fn get(&self, a1: u8, a2: u8) -> f64 {
        self.0[a1 as usize][a2 as usize]
    }

    fn set(&mut self, a1: usize, a2: usize, x: f64) {
        let x = x.max(0.0);
        self.0[a1][a2] = x;
        self.0[a2][a1] = x;
    }
}

pub struct ErrorModel {
    fk: Vec<f64>,
    beta: Vec<f64>,
    lhet: Vec<f64>,
}

impl ErrorModel {
    pub fn new(dep_corr: f64) -> Self {
        Self::with_eta(dep_corr, ETA)
    }

    pub fn with_eta(dep_corr: f64, eta: f64) -> Self {
        let fk: Vec<f64> = (0..TABLE_DIM)
            .map(|n| {
                if n == 0 {
                    1.0
                } else {
                    (1.0 - dep_corr).powi(n as i32) * (1.0 - eta) + eta
                }
            })
            .collect();

        // Log binomial coefficients
        let mut lc = vec![0.0; TABLE_DIM * TABLE_DIM];
        for n in 1..TABLE_DIM {
            let lgn = lfact(n);
            for k in 1..=n {
                lc[(n << 8) | k] = lgn - lfact(k) - lfact(n - k);
            }
        }

        // beta[q][n][k] is the phred scaled probability that there are at least k errors out of n
        // compared to at least k + 1, for error probability 10^(-q/10).  Sums are kept in log space
        // as the upper tail underflows for large n.
        let mut beta = vec![0.0; (MAX_QUAL as usize + 1) << 16];
        for q in 1..=(MAX_QUAL as usize) {
            let e = 10f64.powf(-(q as f64) / 10.0);
            let (le, le1) = (e.ln(), (-e).ln_1p());
            for n in 1..TABLE_DIM {
                let off = (q << 16) | (n << 8);
                let mut lsum1 = f64::NEG_INFINITY;
                for k in (0..=n).rev() {
                    let lterm = lc[(n << 8) | k] + (k as f64) * le + ((n - k) as f64) * le1;
                    let lsum = addlog(lsum1, lterm);
                    beta[off | k] = -TO_PHRED * (lsum1 - lsum);
                    lsum1 = lsum;
                }
            }
        }

        let mut lhet = vec![0.0; TABLE_DIM * TABLE_DIM];
        for n in 0..TABLE_DIM {
            for k in 0..TABLE_DIM {
                lhet[(n << 8) | k] = lc[(n << 8) | k] - std::f64::consts::LN_2 * (n as f64);
            }
        }
        debug!(
            "Error model initialized with dependency correlation {} and eta {}",
            dep_corr, eta
        );
        Self { fk, beta, lhet }
    }

    pub fn fk(&self, k: usize) -> f64 {
        self.fk[k]
    }

    /// Calculate genotype likelihoods from packed observation codes
    /// (see [`crate::pileup::ObservedBase`]).
    ///
    /// If more than [`MAX_DEPTH`] observations are present a random subset is used.
    /// The slice is reordered in place.
    pub fn likelihoods<R: Rng>(&self, codes: &mut [u16], rng: &mut R) -> GenotypeLikelihood {
        let mut gl = GenotypeLikelihood::default();
        if codes.is_empty() {
            return gl;
        }
        let codes = if codes.len() > MAX_DEPTH {
            codes.shuffle(rng);
            &mut codes[..MAX_DEPTH]
        } else {
            codes
        };
        codes.sort_unstable();
        let n = codes.len();

        let mut fsum = [0.0; N_BASES];
        let mut bsum = [0.0; N_BASES];
        let mut cnt = [0usize; N_BASES];
        let mut w = [0usize; 32];

        // Highest quality first
        for &b in codes.iter().rev() {
            let q = (b >> 5).clamp(MIN_QUAL, MAX_QUAL as u16) as usize;
            let k = (b & 0x1f) as usize;
            let base = k & 3;
            let f = self.fk[w[k]];
            fsum[base] += f;
            bsum[base] += f * self.beta[(q << 16) | (n << 8) | cnt[base]];
            cnt[base] += 1;
            w[k] += 1;
        }
        trace!("Allele counts {:?}, fsum {:?}, bsum {:?}", cnt, fsum, bsum);

        for j in 0..N_BASES {
            let hom: f64 = (0..N_BASES).filter(|&k| k != j).map(|k| bsum[k]).sum();
            gl.set(j, j, hom);
            for k in j + 1..N_BASES {
                let cjk = cnt[j] + cnt[k];
                let other: f64 = (0..N_BASES)
                    .filter(|&i| i != j && i != k)
                    .map(|i| bsum[i])
                    .sum();
                gl.set(j, k, other - TO_PHRED * self.lhet[(cjk << 8) | cnt[k]]);
            }
        }
        gl
    }
}
