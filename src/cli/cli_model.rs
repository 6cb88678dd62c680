use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, command, value_parser};

use crate::{
    error_model::MAX_DEPTH,
    ld::LdStat,
    log_utils::LogLevel,
    pileup::MAX_QUAL,
};

use super::config::Analysis;

pub(super) fn cli_model() -> Command {
    command!()
    .arg(
        Arg::new("min_depth")
            .short('m')
            .long("min-depth")
            .default_value("3")
            .value_parser(value_parser!(u16))
            .value_name("INT")
            .help("Minimum read depth for a sample to be called"),
    )
    .arg(
        Arg::new("max_depth")
            .short('x')
            .long("max-depth")
            .default_value("255")
            .value_parser(value_parser!(u16).range(1..=MAX_DEPTH as i64))
            .value_name("INT")
            .help("Maximum read depth for a sample to be called"),
    )
    .arg(
        Arg::new("min_rms_mapq")
            .short('q')
            .long("min-rms-mapq")
            .default_value("25")
            .value_parser(value_parser!(u16))
            .value_name("MAPQ")
            .help("Minimum root mean square mapping quality"),
    )
    .arg(
        Arg::new("min_snp_qual")
            .short('S')
            .long("min-snp-qual")
            .default_value("25")
            .value_parser(value_parser!(u16))
            .value_name("QUAL")
            .help("Minimum SNP confidence"),
    )
    .arg(
        Arg::new("min_mapq")
            .short('a')
            .long("min-mapq")
            .default_value("13")
            .value_parser(value_parser!(u8))
            .value_name("MAPQ")
            .help("Minimum mapping quality for a read to be used"),
    )
    .arg(
        Arg::new("min_base_qual")
            .short('b')
            .long("min-base-qual")
            .default_value("13")
            .value_parser(value_parser!(u8).range(..=MAX_QUAL as i64))
            .value_name("QUAL")
            .help("Minimum base quality for a base to be used"),
    )
    .arg(
        Arg::new("dep_corr")
            .long("dep-corr")
            .default_value("0.17")
            .value_parser(value_parser!(f64))
            .value_name("FLOAT")
            .help("Dependency correlation between errors at the same position"),
    )
    .arg(
        Arg::new("keep_heterozygotes")
            .short('H')
            .long("keep-heterozygotes")
            .action(ArgAction::SetTrue)
            .help("Do not resolve heterozygous calls"),
    )
    .next_help_heading("Statistics")
    .arg(
        Arg::new("analysis")
            .short('A')
            .long("analysis")
            .value_parser(value_parser!(Analysis))
            .ignore_case(true)
            .default_value("sfs")
            .value_name("ANALYSIS")
            .help("Statistics to calculate"),
    )
    .arg(
        Arg::new("ld_stat")
            .short('o')
            .long("ld-stat")
            .value_parser(value_parser!(LdStat))
            .ignore_case(true)
            .default_value("zns")
            .value_name("STAT")
            .help("Linkage disequilibrium statistic"),
    )
    .arg(
        Arg::new("window_size")
            .short('w')
            .long("window-size")
            .value_parser(value_parser!(u64).range(1..))
            .value_name("KB")
            .help("Window size in kb [default: whole region]"),
    )
    .arg(
        Arg::new("min_sites")
            .short('k')
            .long("min-sites")
            .default_value("0.5")
            .value_parser(value_parser!(f64))
            .value_name("FLOAT")
            .help("Minimum proportion of aligned sites in a window"),
    )
    .arg(
        Arg::new("min_pop")
            .short('n')
            .long("min-pop")
            .default_value("1.0")
            .value_parser(value_parser!(f64))
            .value_name("FLOAT")
            .help("Minimum proportion of samples covered in a population"),
    )
    .arg(
        Arg::new("pop_min")
            .long("pop-min")
            .action(ArgAction::Append)
            .value_parser(value_parser!(String))
            .value_name("POP=FLOAT")
            .help("Minimum proportion of samples covered for one population"),
    )
    .arg(
        Arg::new("outgroup")
            .short('p')
            .long("outgroup")
            .value_parser(value_parser!(String))
            .value_name("NAME")
            .help("Outgroup sample used to polarize derived alleles"),
    )
    .arg(
        Arg::new("min_snps")
            .short('N')
            .long("min-snps")
            .default_value("10")
            .value_parser(value_parser!(usize))
            .value_name("INT")
            .help("Minimum number of segregating sites per population for LD statistics"),
    )
    .arg(
        Arg::new("exclude_singletons")
            .short('e')
            .long("exclude-singletons")
            .action(ArgAction::SetTrue)
            .help("Exclude singletons from LD statistics"),
    )
    .next_help_heading("Operation")
    .arg(
        Arg::new("region")
            .short('r')
            .long("region")
            .value_parser(value_parser!(String))
            .value_name("REGION")
            .help("Genomic region to consider"),
    )
    .arg(
        Arg::new("seed")
            .long("seed")
            .default_value("0")
            .value_parser(value_parser!(u64))
            .value_name("INT")
            .help("Seed for read subsampling"),
    )
    .next_help_heading("Input/Output")
    .arg(
        Arg::new("reference")
            .short('T')
            .long("reference")
            .value_parser(value_parser!(PathBuf))
            .required(true)
            .value_name("FASTA File")
            .help("Reference FASTA file"),
    )
    .arg(
        Arg::new("samples")
            .short('s')
            .long("samples")
            .value_parser(value_parser!(PathBuf))
            .required(true)
            .value_name("Sample File")
            .help("Sample sheet (sample, population, alignment file)"),
    )
    .arg(
        Arg::new("output")
            .short('O')
            .long("output")
            .value_parser(value_parser!(PathBuf))
            .value_name("FILE")
            .help("Output file [default: stdout]"),
    )
    .arg(
        Arg::new("loglevel")
            .short('l')
            .long("loglevel")
            .value_name("LOGLEVEL")
            .value_parser(value_parser!(LogLevel))
            .ignore_case(true)
            .default_value("info")
            .help("Set log level"),
    )
}
