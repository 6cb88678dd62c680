use std::path::PathBuf;

use clap::ArgMatches;
use compress_io::compress::CompressIo;
use r_htslib::{Hts, HtsHdr};

use crate::{
    classify::SiteFilter, cli::SampleInput, ld::LdStat, reference::Reference,
};

use super::{
    super::{Region, SampleSheet, samples::parse_pop_min},
    Analysis, Config,
};

fn check_proportion(x: f64, opt: &str) -> anyhow::Result<f64> {
    if (0.0..=1.0).contains(&x) {
        Ok(x)
    } else {
        Err(anyhow!("Value for {} must lie between 0 and 1 (found {})", opt, x))
    }
}

impl Config {
    pub fn from_matches(m: &ArgMatches) -> anyhow::Result<(Vec<SampleInput>, Self)> {
        let min_depth = *m.try_get_one::<u16>("min_depth")?.unwrap();
        let max_depth = *m.try_get_one::<u16>("max_depth")?.unwrap();
        if min_depth > max_depth {
            return Err(anyhow!(
                "Minimum depth ({}) is greater than maximum depth ({})",
                min_depth,
                max_depth
            ));
        }
        let site_filter = SiteFilter {
            min_depth,
            max_depth,
            min_rms_mapq: *m.try_get_one::<u16>("min_rms_mapq")?.unwrap(),
            min_snp_qual: *m.try_get_one::<u16>("min_snp_qual")?.unwrap(),
        };
        let min_mapq = *m.try_get_one::<u8>("min_mapq")?.unwrap();
        let min_base_qual = *m.try_get_one::<u8>("min_base_qual")?.unwrap();
        let dep_corr = check_proportion(*m.try_get_one::<f64>("dep_corr")?.unwrap(), "--dep-corr")?;
        let min_sites =
            check_proportion(*m.try_get_one::<f64>("min_sites")?.unwrap(), "--min-sites")?;
        let min_pop = check_proportion(*m.try_get_one::<f64>("min_pop")?.unwrap(), "--min-pop")?;
        let min_snps = *m.try_get_one::<usize>("min_snps")?.unwrap();
        let seed = *m.try_get_one::<u64>("seed")?.unwrap();
        let analysis = *m.try_get_one::<Analysis>("analysis")?.unwrap();
        let ld_stat = *m.try_get_one::<LdStat>("ld_stat")?.unwrap();
        let resolve_hets = !m.get_flag("keep_heterozygotes");
        let min_freq = if m.get_flag("exclude_singletons") { 2 } else { 1 };
        let window_size = m
            .get_one::<u64>("window_size")
            .map(|x| (*x as usize) * 1000);
        let output = m.get_one::<PathBuf>("output").cloned();

        let pop_min = match m.get_many::<String>("pop_min") {
            Some(v) => v
                .map(|s| parse_pop_min(s))
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        for (name, x) in pop_min.iter() {
            check_proportion(*x, &format!("--pop-min {}", name))?;
        }

        // Sample sheet and populations
        let sample_file = m
            .get_one::<PathBuf>("samples")
            .expect("Missing sample file"); // Should be enforced by clap
        let sheet = SampleSheet::from_path(sample_file)?;
        let mut pops = sheet.populations(min_pop, &pop_min)?;
        if let Some(og) = m.get_one::<String>("outgroup") {
            pops.set_outgroup(og)?;
            debug!("Outgroup sample {}", og);
        }
        info!(
            "Read in {} samples from {} populations",
            pops.n_samples(),
            pops.n_pops()
        );

        // Open alignment files
        let mut inputs = Vec::with_capacity(sheet.entries().len());
        for e in sheet.entries() {
            let hts = Hts::open(Some(e.file()), "r")?;
            debug!("Opened file {} for input (sample {})", e.file(), e.name());
            inputs.push((Box::from(e.name()), hts));
        }

        // The first header defines the target ids used for the reference
        let hdr = if let Some(HtsHdr::Sam(hdr)) = inputs[0].1.header() {
            hdr
        } else {
            return Err(anyhow!(
                "Wrong input file type for {} (expected SAM/BAM/CRAM)",
                sheet.entries()[0].file()
            ));
        };

        let ref_file = m
            .get_one::<PathBuf>("reference")
            .expect("Missing reference"); // Should be enforced by clap

        let rdr = CompressIo::new().path(ref_file).bufreader()?;
        debug!("Opened {} for input", ref_file.display());
        let reference = Reference::from_reader(rdr, |s| hdr.name2tid(s))?;
        if reference.n_contigs() == 0 {
            return Err(anyhow!(
                "No contigs read in from reference file {}",
                ref_file.display()
            ));
        }
        info!(
            "Reference read in successfully with {} contigs",
            reference.n_contigs()
        );

        let region = {
            if let Some(reg_str) = m.get_one::<String>("region") {
                Region::from_str(reg_str, &reference)?
            } else {
                if reference.n_contigs() > 1 {
                    return Err(anyhow!(
                        "Region must be specified when reference file contains multiple contigs"
                    ));
                }
                let ctg = reference
                    .contigs()
                    .values()
                    .next()
                    .ok_or_else(|| anyhow!("Empty reference"))?;
                Region::from_str(ctg.name(), &reference)?
            }
        };

        Ok((
            inputs,
            Config {
                region,
                reference,
                pops,
                analysis,
                ld_stat,
                window_size,
                site_filter,
                output,
                dep_corr,
                min_sites,
                seed,
                min_snps,
                min_freq,
                min_mapq,
                min_base_qual,
                resolve_hets,
            },
        ))
    }
}
