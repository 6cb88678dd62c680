use std::io::{self, BufWriter, Write};

use compress_io::compress::CompressIo;

use crate::{
    classify::SiteFilter,
    cli::{Analysis, Config, SampleInput},
    consensus::BaseCaller,
    error_model::ErrorModel,
    ld::{LdParams, calc_ld},
    pileup::{BamPileup, PileupSource},
    population::PopulationSet,
    reference::Contig,
    sfs::{SfsConstants, calc_sfs},
    window::{Window, WindowData},
};

mod output;
mod site;

pub use output::WindowStats;
use output::write_window;
use site::SiteProcessor;

/// Statistic engine selected for the run
pub enum StatEngine {
    Sfs { k: SfsConstants, min_sites: f64 },
    Ld(LdParams),
}

impl StatEngine {
    fn calc(&self, wd: &WindowData, pops: &PopulationSet) -> anyhow::Result<WindowStats> {
        Ok(match self {
            Self::Sfs { k, min_sites } => WindowStats::Sfs(calc_sfs(wd, pops, k, *min_sites)),
            Self::Ld(par) => WindowStats::Ld(calc_ld(wd, pops, par)?),
        })
    }
}

pub struct ProcessParams<'a> {
    pub pops: &'a PopulationSet,
    pub filter: SiteFilter,
    pub resolve_hets: bool,
    pub dep_corr: f64,
    pub seed: u64,
    pub engine: StatEngine,
}

/// Run the per position pipeline over every window and write one line per window
pub fn process_windows<P: PileupSource, W: Write>(
    src: &mut P,
    ctg: &Contig,
    windows: &[Window],
    par: &ProcessParams,
    wrt: &mut W,
) -> anyhow::Result<()> {
    if src.n_samples() != par.pops.n_samples() {
        return Err(anyhow!(
            "Pileup source has {} samples, expected {}",
            src.n_samples(),
            par.pops.n_samples()
        ));
    }
    let model = ErrorModel::new(par.dep_corr);
    let caller = BaseCaller::new(&model, par.seed);
    let mut sp = SiteProcessor::new(caller, par.filter, par.resolve_hets, par.pops);
    let mut wd = WindowData::new(par.pops.n_pops());

    for w in windows.iter() {
        if w.end > ctg.size() {
            return Err(anyhow!(
                "Window {}:{} extends past end of contig",
                ctg.name(),
                w
            ));
        }
        wd.reset(*w)?;
        src.pileup(w.start, w.end, &mut |col| {
            sp.process(col, ctg.base(col.pos()), &mut wd)
        })?;
        debug!(
            "Window {}:{} - {} aligned positions, {} segregating sites",
            ctg.name(),
            w,
            wd.n_aligned_positions(),
            wd.n_sites()
        );
        let stats = par.engine.calc(&wd, par.pops)?;
        write_window(wrt, ctg.name(), *w, par.pops, &stats)?;
    }
    if sp.non_acgt() > 0 {
        warn!(
            "{} positions with a reference base other than A, C, G or T were not classified",
            sp.non_acgt()
        )
    }
    Ok(())
}

pub fn process_data(inputs: Vec<SampleInput>, cfg: Config) -> anyhow::Result<()> {
    let reg = cfg.region();
    let ctg = cfg
        .reference()
        .contig(reg.tid())
        .ok_or_else(|| anyhow!("Contig {} not found in reference", reg.name()))?;
    let windows = reg.windows(cfg.window_size());
    info!(
        "Processing {}:{}-{} in {} window(s)",
        reg.name(),
        reg.start() + 1,
        reg.end(),
        windows.len()
    );

    debug!("Analysis type: {}", cfg.analysis());
    let engine = match cfg.analysis() {
        Analysis::Sfs => StatEngine::Sfs {
            k: SfsConstants::new(cfg.pops().n_samples()),
            min_sites: cfg.min_sites(),
        },
        Analysis::Ld => {
            info!("Calculating {}", cfg.ld_stat());
            StatEngine::Ld(cfg.ld_params())
        }
    };
    let par = ProcessParams {
        pops: cfg.pops(),
        filter: *cfg.site_filter(),
        resolve_hets: cfg.resolve_hets(),
        dep_corr: cfg.dep_corr(),
        seed: cfg.seed(),
        engine,
    };

    let mut src = BamPileup::new(inputs, reg.name(), cfg.min_mapq(), cfg.min_base_qual())?;
    let mut wrt: Box<dyn Write> = match cfg.output() {
        Some(p) => {
            debug!("Opened {} for output", p.display());
            Box::new(CompressIo::new().path(p).bufwriter()?)
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    process_windows(&mut src, ctg, &windows, &par, &mut wrt)?;
    wrt.flush()?;
    info!("Analysis complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ld::{LdStat, LdValue},
        pileup::{ObservedBase, PileupColumn},
        population::Population,
        reference::Reference,
    };

    /// Pileup held in memory: for each position, per sample (base, depth) or nothing
    struct MemPileup {
        n_samples: usize,
        cols: Vec<(usize, Vec<Option<(u8, usize)>>)>,
    }

    impl PileupSource for MemPileup {
        fn n_samples(&self) -> usize {
            self.n_samples
        }

        fn pileup(
            &mut self,
            start: usize,
            end: usize,
            f: &mut dyn FnMut(&PileupColumn) -> anyhow::Result<()>,
        ) -> anyhow::Result<()> {
            let mut col = PileupColumn::new(self.n_samples);
            for (pos, v) in self.cols.iter().filter(|(p, _)| *p >= start && *p < end) {
                col.set_pos(*pos);
                for (sp, x) in col.samples_mut().iter_mut().zip(v) {
                    sp.clear();
                    if let Some((b, d)) = x {
                        for i in 0..*d {
                            sp.push(ObservedBase::new(*b, 35, i & 1 == 0))
                        }
                        sp.set_rms_mapq(60);
                    }
                }
                f(&col)?;
            }
            Ok(())
        }
    }

    fn reference(seq: &str) -> Reference {
        let fasta = format!(">chrT\n{}\n", seq);
        Reference::from_reader(fasta.as_bytes(), |s| (s == "chrT").then_some(0)).unwrap()
    }

    fn pops() -> PopulationSet {
        PopulationSet::new(
            (0..4).map(|i| format!("s{}", i).into()).collect(),
            vec![
                Population::new("A", 0b0011, 1.0),
                Population::new("B", 0b1100, 1.0),
            ],
        )
        .unwrap()
    }

    fn filter() -> SiteFilter {
        SiteFilter {
            min_depth: 3,
            max_depth: 255,
            min_rms_mapq: 25,
            min_snp_qual: 25,
        }
    }

    // Reference AAAAAAAAAA.  Positions 0-7 covered by all samples at depth 10.
    // Position 2: sample 0 is homozygous G.  Position 5: samples 0 and 2 homozygous T.
    fn mem_pileup() -> MemPileup {
        let mut cols = Vec::new();
        for pos in 0..8 {
            let mut v = vec![Some((0u8, 10usize)); 4];
            if pos == 2 {
                v[0] = Some((2, 10))
            }
            if pos == 5 {
                v[0] = Some((3, 10));
                v[2] = Some((3, 10));
            }
            cols.push((pos, v))
        }
        MemPileup { n_samples: 4, cols }
    }

    fn run(engine: StatEngine, windows: &[Window]) -> String {
        let r = reference("AAAAAAAAAA");
        let ctg = r.contig(0).unwrap();
        let ps = pops();
        let par = ProcessParams {
            pops: &ps,
            filter: filter(),
            resolve_hets: true,
            dep_corr: 0.17,
            seed: 0,
            engine,
        };
        let mut out = Vec::new();
        process_windows(&mut mem_pileup(), ctg, windows, &par, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn sfs_pipeline() {
        let k = SfsConstants::new(4);
        let out = run(
            StatEngine::Sfs { k, min_sites: 0.5 },
            &[Window::new(0, 10)],
        );
        let fields: Vec<_> = out.trim_end().split('\t').collect();
        assert_eq!(&fields[..3], &["chrT", "1", "10"]);
        // 8 of 10 positions aligned for both populations
        assert_eq!(fields[3..5], ["ns[A]:", "8"]);
        assert_eq!(fields[9..11], ["ns[B]:", "8"]);
        // Population A has two singleton sites with n = 2: D is undefined (0/0)
        assert_eq!(fields[6], "NA");
        // Population B has a single singleton site with n = 2
        assert_eq!(fields[12], "NA");
    }

    #[test]
    fn uncovered_window_is_na() {
        let k = SfsConstants::new(4);
        let out = run(
            StatEngine::Sfs { k, min_sites: 0.5 },
            &[Window::new(0, 8), Window::new(8, 10)],
        );
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "chrT\t9\t10\tns[A]:\t0\tD[A]:\tNA\tH[A]:\tNA\tns[B]:\t0\tD[B]:\tNA\tH[B]:\tNA"
        );
    }

    #[test]
    fn ld_pipeline() {
        let par = LdParams {
            stat: LdStat::Zns,
            min_freq: 1,
            min_snps: 2,
            min_sites: 0.5,
        };
        let out = run(StatEngine::Ld(par), &[Window::new(0, 10)]);
        // Pop A: sites 2 (0b01) and 5 (0b01) are perfectly linked
        assert_eq!(
            out,
            "chrT\t1\t10\tS[A]:\t2\tZns[A]:\t1.00000\tS[B]:\t1\tZns[B]:\tNA\n"
        );
    }

    #[test]
    fn engine_results() {
        let r = reference("AAAAAAAAAA");
        let ctg = r.contig(0).unwrap();
        let ps = pops();
        let model = ErrorModel::new(0.17);
        let mut sp = SiteProcessor::new(BaseCaller::new(&model, 0), filter(), true, &ps);
        let mut wd = WindowData::new(2);
        wd.reset(Window::new(0, 10)).unwrap();
        let mut src = mem_pileup();
        src.pileup(0, 10, &mut |col| sp.process(col, ctg.base(col.pos()), &mut wd))
            .unwrap();
        assert_eq!(wd.site_types(), &[0b0001, 0b0101]);
        for p in 0..2 {
            let n = wd.pop_cov().iter().filter(|f| (*f >> p) & 1 != 0).count();
            assert_eq!(wd.aligned(p), n);
        }
        let ld = calc_ld(
            &wd,
            &ps,
            &LdParams {
                stat: LdStat::Wall,
                min_freq: 1,
                min_snps: 2,
                min_sites: 0.5,
            },
        )
        .unwrap();
        assert_eq!(ld[0].value, LdValue::Wall { b: 1.0, q: 1.0 });
    }

    #[test]
    fn ambiguous_reference_not_segregating() {
        let r = reference("AANAAAAAAA");
        let ctg = r.contig(0).unwrap();
        let ps = pops();
        let model = ErrorModel::new(0.17);
        let mut sp = SiteProcessor::new(BaseCaller::new(&model, 0), filter(), true, &ps);
        let mut wd = WindowData::new(2);
        wd.reset(Window::new(0, 10)).unwrap();
        let mut src = mem_pileup();
        src.pileup(0, 10, &mut |col| sp.process(col, ctg.base(col.pos()), &mut wd))
            .unwrap();
        // Position 2 still counts as aligned but is not a segregating site
        assert_eq!(wd.aligned(0), 8);
        assert_eq!(wd.site_types(), &[0b0101]);
        assert_eq!(sp.non_acgt(), 1);
    }
}
