use std::{
    fmt,
    io::{self, Write},
};

use crate::{
    ld::{LdResult, LdValue},
    population::PopulationSet,
    sfs::SfsResult,
    window::Window,
};

/// Statistic value: 5 decimal places, or NA if undefined
struct Fixed(f64);

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_finite() {
            write!(f, "{:.5}", self.0)
        } else {
            write!(f, "NA")
        }
    }
}

pub enum WindowStats {
    Sfs(Vec<SfsResult>),
    Ld(Vec<LdResult>),
}

/// Write one result line.  Coordinates are 1 based inclusive.
pub fn write_window<W: Write>(
    wrt: &mut W,
    ctg: &str,
    w: Window,
    pops: &PopulationSet,
    stats: &WindowStats,
) -> io::Result<()> {
    write!(wrt, "{}\t{}\t{}", ctg, w.start + 1, w.end)?;
    match stats {
        WindowStats::Sfs(v) => {
            for (p, r) in pops.pops().iter().zip(v) {
                let name = p.name();
                write!(
                    wrt,
                    "\tns[{}]:\t{}\tD[{}]:\t{}\tH[{}]:\t{}",
                    name,
                    r.aligned,
                    name,
                    Fixed(r.tajima_d),
                    name,
                    Fixed(r.fay_wu_h)
                )?
            }
        }
        WindowStats::Ld(v) => {
            for (p, r) in pops.pops().iter().zip(v) {
                let name = p.name();
                write!(wrt, "\tS[{}]:\t{}", name, r.n_snps)?;
                match r.value {
                    LdValue::Zns(x) => write!(wrt, "\tZns[{}]:\t{}", name, Fixed(x))?,
                    LdValue::OmegaMax(x) => write!(wrt, "\tomax[{}]:\t{}", name, Fixed(x))?,
                    LdValue::Wall { b, q } => write!(
                        wrt,
                        "\tB[{}]:\t{}\tQ[{}]:\t{}",
                        name,
                        Fixed(b),
                        name,
                        Fixed(q)
                    )?,
                }
            }
        }
    }
    writeln!(wrt)
}
