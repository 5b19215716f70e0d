// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands and their flags:
//
//   example     train → checkpoint → export → run (default)
//   zero-model  export the zero placeholder
//   run         run an artifact on random inputs
//   pair        drive an artifact through the MD host adapter
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    example_use_case::ExampleConfig,
    pair_use_case::PairConfig,
    run_use_case::RunConfig,
    zero_model_use_case::ZeroModelConfig,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the energy model, checkpoint it, export it and run the export
    Example(ExampleArgs),

    /// Export the zero-energy placeholder model
    ZeroModel(ZeroModelArgs),

    /// Load an exported model and run it on random positions
    Run(RunArgs),

    /// Evaluate an exported model through the pair_style/pair_coeff adapter
    Pair(PairArgs),
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Example(ExampleArgs::default())
    }
}

#[derive(Args, Debug)]
pub struct ExampleArgs {
    /// Directory for model.ckpt and model.pt
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of random records
    #[arg(long, default_value_t = 1000)]
    pub dataset_size: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Loader worker threads (0 loads on the calling thread)
    #[arg(long, default_value_t = 7)]
    pub num_workers: usize,

    /// Shuffle the train, val and test feeds with this seed
    #[arg(long)]
    pub shuffle: Option<u64>,

    /// Seed for the dataset and the sample batch
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = 1)]
    pub max_epochs: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Evaluate without the autodiff tape
    #[arg(long)]
    pub inference_mode: bool,

    #[arg(long, default_value_t = 50)]
    pub log_every_n_steps: usize,

    /// Where metrics.csv goes
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Skip the metrics CSV
    #[arg(long)]
    pub no_metrics: bool,
}

impl Default for ExampleArgs {
    fn default() -> Self {
        let cfg = ExampleConfig::default();
        Self {
            output_dir:        cfg.output_dir,
            dataset_size:      cfg.dataset_size,
            batch_size:        cfg.batch_size,
            num_workers:       cfg.num_workers,
            shuffle:           cfg.shuffle,
            seed:              cfg.seed,
            max_epochs:        cfg.max_epochs,
            lr:                cfg.learning_rate,
            inference_mode:    cfg.inference_mode,
            log_every_n_steps: cfg.log_every_n_steps,
            log_dir:           cfg.log_dir.unwrap_or_else(|| PathBuf::from("logs")),
            no_metrics:        false,
        }
    }
}

/// The application layer never sees clap types.
impl From<ExampleArgs> for ExampleConfig {
    fn from(a: ExampleArgs) -> Self {
        ExampleConfig {
            output_dir:        a.output_dir,
            dataset_size:      a.dataset_size,
            batch_size:        a.batch_size,
            num_workers:       a.num_workers,
            shuffle:           a.shuffle,
            seed:              a.seed,
            max_epochs:        a.max_epochs,
            learning_rate:     a.lr,
            inference_mode:    a.inference_mode,
            log_every_n_steps: a.log_every_n_steps,
            log_dir:           (!a.no_metrics).then_some(a.log_dir),
        }
    }
}

#[derive(Args, Debug)]
pub struct ZeroModelArgs {
    #[arg(long, default_value = "zero_model.pt")]
    pub output: PathBuf,
}

impl From<ZeroModelArgs> for ZeroModelConfig {
    fn from(a: ZeroModelArgs) -> Self {
        ZeroModelConfig { output: a.output }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Exported model to load
    #[arg(long, default_value = "model.pt")]
    pub artifact: PathBuf,

    /// Number of records (atoms) to feed it
    #[arg(long, default_value_t = 2)]
    pub atoms: usize,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<RunArgs> for RunConfig {
    fn from(a: RunArgs) -> Self {
        RunConfig { artifact: a.artifact, atoms: a.atoms, seed: a.seed }
    }
}

#[derive(Args, Debug)]
pub struct PairArgs {
    /// pair_coeff arguments after `* *`: <model>.pt <type1> ... <typeN>
    #[arg(required = true, num_args = 2..)]
    pub coeff: Vec<String>,

    #[arg(long, default_value_t = 4)]
    pub atoms: usize,

    /// Neighbour cutoff distance
    #[arg(long, default_value_t = 1.0)]
    pub cutoff: f32,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<PairArgs> for PairConfig {
    fn from(a: PairArgs) -> Self {
        let mut coeff = a.coeff.into_iter();
        PairConfig {
            artifact: coeff.next().map(PathBuf::from).unwrap_or_default(),
            type_map: coeff.collect(),
            atoms:    a.atoms,
            cutoff:   a.cutoff,
            seed:     a.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    #[test]
    fn test_no_subcommand_runs_example() {
        let cli = Cli::try_parse_from(["forcefield-script"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_example_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "forcefield-script", "example", "--dataset-size", "64", "--num-workers", "0", "--no-metrics",
        ])
        .unwrap();
        let Some(Commands::Example(args)) = cli.command else { panic!("expected example") };
        let cfg: ExampleConfig = args.into();

        assert_eq!(cfg.dataset_size, 64);
        assert_eq!(cfg.num_workers, 0);
        assert_eq!(cfg.batch_size, 32);
        assert!(cfg.log_dir.is_none());
    }

    #[test]
    fn test_pair_args_split_model_and_types() {
        let cli = Cli::try_parse_from(["forcefield-script", "pair", "zero_model.pt", "1", "8"]).unwrap();
        let Some(Commands::Pair(args)) = cli.command else { panic!("expected pair") };
        let cfg: PairConfig = args.into();

        assert_eq!(cfg.artifact, PathBuf::from("zero_model.pt"));
        assert_eq!(cfg.type_map, vec!["1", "8"]);
    }

    #[test]
    fn test_shuffle_help_names_every_feed() {
        use clap::CommandFactory;

        let cmd  = Cli::command();
        let help = cmd
            .find_subcommand("example")
            .and_then(|c| c.get_arguments().find(|a| a.get_id() == "shuffle"))
            .and_then(|a| a.get_help())
            .map(|h| h.to_string())
            .unwrap();

        assert!(help.contains("train, val and test"));
    }

    #[test]
    fn test_default_args_match_config_defaults() {
        let cfg: ExampleConfig = ExampleArgs::default().into();
        let expected = ExampleConfig::default();
        assert_eq!(cfg.dataset_size, expected.dataset_size);
        assert_eq!(cfg.learning_rate, expected.learning_rate);
        assert_eq!(cfg.log_dir, expected.log_dir);
    }
}
