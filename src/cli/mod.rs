// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap, hands a plain config to a use case and prints the
// report it returns. Printing happens here and nowhere else.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ExampleArgs, PairArgs, RunArgs, ZeroModelArgs};

use crate::script::ScriptValue;

#[derive(Parser, Debug)]
#[command(
    name = "forcefield-script",
    version,
    about = "Train a linear energy model, export it with its force computation, and run the export."
)]
pub struct Cli {
    /// Defaults to `example` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command.unwrap_or_default() {
            Commands::Example(args)   => run_example(args),
            Commands::ZeroModel(args) => run_zero_model(args),
            Commands::Run(args)       => run_artifact(args),
            Commands::Pair(args)      => run_pair(args),
        }
    }
}

fn run_example(args: ExampleArgs) -> Result<()> {
    use crate::application::example_use_case::ExampleUseCase;

    let report = ExampleUseCase::new(args.into()).execute()?;

    println!("Test loss: {:.6}", report.test_loss);
    println!("Checkpoint: {}", report.checkpoint_path.display());
    println!("Artifact:   {}", report.artifact_path.display());
    println!("\nState dict:");
    for (name, tensor) in &report.state_dict {
        println!("  {name}: {tensor}");
    }
    println!("\nInput:\n{}", report.sample);
    println!("\nEnergy:\n{}", report.output.energy);
    println!("\nForces:\n{}", report.output.forces);
    println!("\nCode:\n{}", report.code);
    Ok(())
}

fn run_zero_model(args: ZeroModelArgs) -> Result<()> {
    use crate::application::zero_model_use_case::ZeroModelUseCase;

    let report = ZeroModelUseCase::new(args.into()).execute()?;
    println!("Zero model saved to {}", report.path.display());
    println!("\nCode:\n{}", report.code);
    Ok(())
}

fn run_artifact(args: RunArgs) -> Result<()> {
    use crate::application::run_use_case::RunUseCase;

    let report = RunUseCase::new(args.into()).execute()?;
    println!("Model: {}", report.name);
    for (name, value) in &report.inputs {
        match value {
            ScriptValue::Float(t) => println!("\n{name}:\n{t}"),
            ScriptValue::Int(t)   => println!("\n{name}: {:?} shape={:?}", t.values, t.shape),
            ScriptValue::None     => println!("\n{name}: None"),
        }
    }
    println!("\nEnergy:\n{}", report.output.energy);
    println!("\nForces:\n{}", report.output.forces);
    Ok(())
}

fn run_pair(args: PairArgs) -> Result<()> {
    use crate::application::pair_use_case::PairUseCase;

    let report = PairUseCase::new(args.into()).execute()?;
    println!("Atoms: {} ({} neighbour pairs)", report.system.atom_count(), report.system.neighbors.len());
    println!("Energy: {:.6}", report.result.energy);
    for (i, (t, f)) in report.system.types.iter().zip(&report.result.forces).enumerate() {
        let [x, y, z] = f.coords();
        println!("  atom {i:>3} type {t}: f = ({x:.6}, {y:.6}, {z:.6})");
    }
    Ok(())
}
