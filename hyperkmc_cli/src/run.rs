use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use hyperkmc::lattice::{Lattice, LatticeParams};
use hyperkmc::scheduler::{Outcome, DEFAULT_STEP_CAP};
use prettytable::{cell, row};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;

/// Simulate one or more devices and report their internal quantum
/// efficiency.
#[derive(Parser)]
pub struct Opts {
    /// Lattice extent along x, y and z.
    #[arg(default_values_t = [20, 20, 10], long, num_args = 3, value_names = ["X", "Y", "Z"])]
    dimensions: Vec<usize>,
    /// Host, sensitiser and fluorophore shares of the blend.
    #[arg(
        default_values_t = [0.84, 0.15, 0.01],
        long,
        num_args = 3,
        value_names = ["HOST", "TADF", "FLUO"]
    )]
    proportions: Vec<f64>,
    /// Vertical electric field [eV/nm].
    #[arg(default_value_t = 0.1, long)]
    field: f64,
    /// Carriers kept in flight per polarity.
    #[arg(default_value_t = 4, long)]
    charges: usize,
    /// Cumulative exciton recombinations to simulate per device.
    #[arg(default_value_t = 1000, long)]
    recombinations: u64,
    /// Safety ceiling on executed events per device.
    #[arg(default_value_t = DEFAULT_STEP_CAP, long)]
    step_cap: u64,
    /// Seed of the first replica; replica `i` uses `seed + i`. Defaults to
    /// operating-system entropy.
    #[arg(long)]
    seed: Option<u64>,
    /// Number of independently seeded devices, evaluated in parallel.
    #[arg(default_value_t = 1, long, value_parser = clap::value_parser!(u64).range(1..))]
    replicas: u64,
    /// Write the final carrier positions of the last replica as JSON.
    #[arg(long, value_hint = ValueHint::FilePath, value_name = "FILE")]
    positions: Option<PathBuf>,
}

struct Report {
    replica: u64,
    outcome: Outcome,
    iqe: f64,
    recombinations: u64,
    emissions: u64,
    injections: u64,
    captures: u64,
    steps: u64,
    clock: f64,
    wall: f64,
    lattice: Lattice,
}

impl Opts {
    fn simulate(&self, replica: u64) -> Result<Report> {
        let params = LatticeParams {
            dimensions: helpers::dimensions_from(&self.dimensions),
            proportions: helpers::proportions_from(&self.proportions),
            field: self.field,
            charges: self.charges,
            seed: self.seed.map(|seed| seed + replica),
            ..LatticeParams::default()
        };
        let mut lattice = Lattice::new(params).context("failed to construct the lattice")?;
        let start = Instant::now();
        let outcome = lattice.drive(self.recombinations, self.step_cap)?;
        let wall = start.elapsed().as_secs_f64();
        Ok(Report {
            replica,
            outcome,
            iqe: lattice.iqe(),
            recombinations: lattice.recombinations(),
            emissions: lattice.emissions(),
            injections: lattice.injections(),
            captures: lattice.captures(),
            steps: lattice.steps(),
            clock: lattice.clock(),
            wall,
            lattice,
        })
    }
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let reports: Vec<Report> = (0..self.replicas)
            .into_par_iter()
            .map(|replica| self.simulate(replica))
            .collect::<Result<_>>()?;

        let mut table = helpers::create_table();
        table.set_titles(row![c =>
            "replica",
            "IQE [%]",
            "recomb",
            "emissions",
            "injections",
            "captures",
            "steps",
            "simulated [s]",
            "wall [s]",
            "stop"
        ]);
        for report in &reports {
            let stop = match report.outcome {
                Outcome::TargetReached => "target",
                Outcome::EventsExhausted => "exhausted",
                Outcome::StepCapReached => "step cap",
            };
            table.add_row(row![r =>
                report.replica,
                format!("{:.3}", report.iqe),
                report.recombinations,
                report.emissions,
                report.injections,
                report.captures,
                report.steps,
                format!("{:.3e}", report.clock),
                format!("{:.3}", report.wall),
                stop
            ]);
        }
        table.printstd();

        #[allow(clippy::cast_precision_loss)]
        let mean = reports.iter().map(|report| report.iqe).sum::<f64>() / reports.len() as f64;
        println!("mean IQE: {mean:.3} %");
        info!(replicas = reports.len(), mean, "run finished");

        if let Some(path) = &self.positions {
            // the particle readout mirrors the visualisation interface of
            // the engine
            if let Some(report) = reports.last() {
                let (electrons, holes, excitons) = report.lattice.particle_positions();
                let file = File::create(path)
                    .context(format!("unable to write '{}'", path.display()))?;
                serde_json::to_writer_pretty(
                    BufWriter::new(file),
                    &serde_json::json!({
                        "electrons": electrons,
                        "holes": holes,
                        "excitons": excitons,
                    }),
                )?;
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}
