use clap::{Parser, Subcommand};
use gphmm::common::{sequence_to_string, Quality, Qv, DEFAULT_QV};
use gphmm::io::{fasta, json, table};
use gphmm::{
    compute_probability, generate_training_pairs, AlignmentResult, Mode, ParameterSet,
    TrainConfig, Trainer,
};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(author, about, version)]
struct Opts {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate random references, simulated reads and their pairs table
    Generate {
        /// Number of pairs
        #[clap(short = 'n')]
        n_pairs: usize,
        /// Mean length of references
        #[clap(short = 'l', default_value_t = 1000.0)]
        mean_len: f64,
        /// Standard deviation of the length of references
        #[clap(short = 's', default_value_t = 100.0)]
        sd_len: f64,
        /// Quality value assigned to every read base
        #[clap(short = 'q', long, default_value_t = DEFAULT_QV)]
        qv: Qv,
        /// Seed of the random generator
        #[clap(long, default_value_t = 0)]
        seed: u64,
        /// Parameter artifact to sample reads from.
        /// If not specified, the default parameters are used.
        #[clap(short, long)]
        params: Option<PathBuf>,
        /// Prefix of output files (`.refs.fa`, `.reads.fa`, `.pairs.tsv`)
        output_prefix: PathBuf,
    },
    /// Estimate parameters by Baum-Welch from labeled pairs
    Train {
        /// Query (read) FASTA filename
        query_fasta: PathBuf,
        /// Reference FASTA filename
        reference_fasta: PathBuf,
        /// Pairs table filename
        pairs: PathBuf,
        /// Initial parameter artifact.
        /// If not specified, the default parameters are used.
        #[clap(short, long)]
        init: Option<PathBuf>,
        /// Maximum number of EM iterations
        #[clap(short = 'n', long, default_value_t = 10)]
        max_iterations: usize,
        /// Stop when the log-likelihood improves by less than this
        #[clap(long)]
        tolerance: Option<f64>,
        /// Pseudocount added to every expected count
        #[clap(long, default_value_t = 1e-3)]
        smoothing: f64,
        /// Number of E-step threads (all cores if not specified)
        #[clap(short = 't', long)]
        threads: Option<usize>,
        /// Quality value of rows without one
        #[clap(short = 'q', long, default_value_t = DEFAULT_QV)]
        qv: Qv,
        /// Output parameter artifact filename
        #[clap(short, long)]
        output: PathBuf,
        /// Output log-likelihood artifact filename
        #[clap(long)]
        log_likelihoods: Option<PathBuf>,
    },
    /// Compute the log-probability of every pair
    Score {
        /// Query (read) FASTA filename
        query_fasta: PathBuf,
        /// Reference FASTA filename
        reference_fasta: PathBuf,
        /// Pairs table filename
        pairs: PathBuf,
        /// Parameter artifact.
        /// If not specified, the default parameters are used.
        #[clap(short, long)]
        params: Option<PathBuf>,
        /// `short` (log-probability) or `long` (plus Viterbi path)
        #[clap(short, long, default_value = "short")]
        mode: Mode,
        /// Quality value of rows without one
        #[clap(short = 'q', long, default_value_t = DEFAULT_QV)]
        qv: Qv,
        /// Output scored-pairs table filename (stdout if not specified)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_params_or_default(path: &Option<PathBuf>) -> gphmm::Result<ParameterSet> {
    match path {
        Some(path) => json::load_params(path),
        None => Ok(ParameterSet::default()),
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn load_pairs(
    query_fasta: &Path,
    reference_fasta: &Path,
    pairs: &Path,
    qv: Qv,
) -> gphmm::Result<(Vec<table::PairRow>, Vec<gphmm::SequencePair>)> {
    let queries = fasta::read_sequences(query_fasta)?;
    let references = fasta::read_sequences(reference_fasta)?;
    let rows = table::read_pairs_table(pairs)?;
    info!(
        "n_queries={} n_references={} n_pairs={}",
        queries.len(),
        references.len(),
        rows.len()
    );
    let pairs = table::join_pairs(&rows, &queries, &references, qv)?;
    Ok((rows, pairs))
}

fn run(opts: &Opts) -> gphmm::Result<()> {
    match &opts.command {
        Commands::Generate {
            n_pairs,
            mean_len,
            sd_len,
            qv,
            seed,
            params,
            output_prefix,
        } => {
            let params = load_params_or_default(params)?;
            let pairs = generate_training_pairs(
                *n_pairs,
                *mean_len,
                *sd_len,
                &params,
                &Quality::Scalar(*qv),
                *seed,
            )?;
            let ids: Vec<(String, String)> = (0..pairs.len())
                .map(|k| (format!("read{}", k), format!("ref{}", k)))
                .collect();
            fasta::save_sequences(
                with_suffix(output_prefix, ".refs.fa"),
                ids.iter()
                    .zip(pairs.iter())
                    .map(|((_, ref_id), pair)| (ref_id.as_str(), pair.reference())),
            )?;
            fasta::save_sequences(
                with_suffix(output_prefix, ".reads.fa"),
                ids.iter()
                    .zip(pairs.iter())
                    .map(|((read_id, _), pair)| (read_id.as_str(), pair.query())),
            )?;
            let rows: Vec<table::PairRow> = ids
                .into_iter()
                .map(|(query_id, reference_id)| table::PairRow {
                    query_id,
                    reference_id,
                    qv: Some(*qv),
                })
                .collect();
            table::save_pairs_table(with_suffix(output_prefix, ".pairs.tsv"), &rows)?;
            if let Some(pair) = pairs.first() {
                info!("first read: {}", sequence_to_string(pair.query()));
            }
        }
        Commands::Train {
            query_fasta,
            reference_fasta,
            pairs,
            init,
            max_iterations,
            tolerance,
            smoothing,
            threads,
            qv,
            output,
            log_likelihoods,
        } => {
            let init = load_params_or_default(init)?;
            let (_, pairs) = load_pairs(query_fasta, reference_fasta, pairs, *qv)?;
            let config = TrainConfig {
                max_iterations: *max_iterations,
                tolerance: *tolerance,
                smoothing: *smoothing,
                n_threads: *threads,
            };
            let result = Trainer::new(config).run(&pairs, &init)?;
            println!("# iterations={}", result.iterations);
            println!("# converged={}", result.converged);
            println!("{}", result.params);
            json::save_params(output, &result.params)?;
            if let Some(path) = log_likelihoods {
                json::save_log_likelihoods(path, &result.log_likelihoods)?;
            }
        }
        Commands::Score {
            query_fasta,
            reference_fasta,
            pairs,
            params,
            mode,
            qv,
            output,
        } => {
            let params = load_params_or_default(params)?;
            let (rows, pairs) = load_pairs(query_fasta, reference_fasta, pairs, *qv)?;
            let pb = ProgressBar::new(pairs.len() as u64).with_style(
                ProgressStyle::default_bar()
                    .template("{elapsed_precise} {bar:40} {pos}/{len} {msg}"),
            );
            let results = pairs
                .par_iter()
                .progress_with(pb)
                .map(|pair| compute_probability(pair, &params, *mode))
                .collect::<gphmm::Result<Vec<AlignmentResult>>>()?;
            match output {
                Some(path) => table::save_scored_pairs(path, &rows, &results, *qv)?,
                None => table::write_scored_pairs(std::io::stdout(), &rows, &results, *qv)?,
            }
        }
    }
    Ok(())
}

/// The scored table of `score` without `-o` owns stdout.
fn table_on_stdout(opts: &Opts) -> bool {
    matches!(opts.command, Commands::Score { output: None, .. })
}

fn main() {
    env_logger::init();
    let opts: Opts = Opts::parse();
    let header = |line: String| {
        if table_on_stdout(&opts) {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    };
    header(format!("# started_at={}", chrono::Local::now()));
    header(format!("# n_threads={}", rayon::current_num_threads()));
    header(format!("# opts={:?}", opts));
    if let Err(e) = run(&opts) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
    header(format!("# finished_at={}", chrono::Local::now()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_without_output_keeps_stdout_for_the_table() {
        let opts = Opts::parse_from(["gphmm", "score", "q.fa", "r.fa", "pairs.tsv"]);
        assert!(table_on_stdout(&opts));
        let opts =
            Opts::parse_from(["gphmm", "score", "q.fa", "r.fa", "pairs.tsv", "-o", "out.tsv"]);
        assert!(!table_on_stdout(&opts));
        let opts = Opts::parse_from(["gphmm", "generate", "-n", "3", "out"]);
        assert!(!table_on_stdout(&opts));
    }
}
