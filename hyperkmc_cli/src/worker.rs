use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use hyperkmc::lattice::{Lattice, LatticeParams, Proportions};
use hyperkmc::scheduler::DEFAULT_STEP_CAP;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

const IN_FILE: &str = "in.json";
const OUT_FILE: &str = "out.json";
const ERROR_FILE: &str = "errors.txt";
const STOP_FILE: &str = "STOP";

/// Driver exit codes of the optimiser file protocol.
const SUCCESS: u8 = 0;
const MISSING_INPUT: u8 = 1;
const MALFORMED_INPUT: u8 = 2;
const INVALID_PARAMETERS: u8 = 3;

/// Evaluate one optimiser candidate through the file exchange protocol.
///
/// Reads the composition parameters `(p_tadf, p_fluo)` from `in.json` in the
/// worker directory, simulates the device and writes the fitness
/// `100 − IQE` to `out.json`. Diagnostics go to `errors.txt`; on failure the
/// `STOP` sentinel is touched next to the worker directory so the controller
/// shuts the whole exchange down.
#[derive(Parser)]
pub struct Opts {
    /// Worker directory holding `in.json`.
    #[arg(default_value = ".", long, value_hint = ValueHint::DirPath)]
    dir: PathBuf,
    /// Lattice extent along x, y and z.
    #[arg(default_values_t = [20, 20, 10], long, num_args = 3, value_names = ["X", "Y", "Z"])]
    dimensions: Vec<usize>,
    /// Carriers kept in flight per polarity.
    #[arg(default_value_t = 4, long)]
    charges: usize,
    /// Cumulative exciton recombinations per evaluation.
    #[arg(default_value_t = 100, long)]
    recombinations: u64,
    /// Safety ceiling on executed events.
    #[arg(default_value_t = DEFAULT_STEP_CAP, long)]
    step_cap: u64,
    /// Seed of the random stream; defaults to operating-system entropy.
    #[arg(long)]
    seed: Option<u64>,
}

impl Opts {
    /// One protocol round. Protocol failures are reported through the exit
    /// code and `errors.txt`; only I/O and scheduler faults escape as hard
    /// errors.
    fn evaluate(&self) -> Result<(u8, String)> {
        let input = self.dir.join(IN_FILE);
        if !input.exists() {
            return Ok((
                MISSING_INPUT,
                format!("missing {IN_FILE} in {}", self.dir.display()),
            ));
        }
        let raw = fs::read_to_string(&input)
            .context(format!("unable to read '{}'", input.display()))?;
        let Ok(values) = serde_json::from_str::<Vec<f64>>(&raw) else {
            return Ok((
                MALFORMED_INPUT,
                format!("{IN_FILE} does not hold an array of numbers"),
            ));
        };
        let &[tadf, fluo] = values.as_slice() else {
            return Ok((
                MALFORMED_INPUT,
                format!("expected 2 composition parameters, got {}", values.len()),
            ));
        };

        let params = LatticeParams {
            dimensions: helpers::dimensions_from(&self.dimensions),
            proportions: Proportions::new(1.0 - tadf - fluo, tadf, fluo),
            charges: self.charges,
            seed: self.seed,
            ..LatticeParams::default()
        };
        let mut lattice = match Lattice::new(params) {
            Ok(lattice) => lattice,
            Err(error) => return Ok((INVALID_PARAMETERS, error.to_string())),
        };
        lattice.drive(self.recombinations, self.step_cap)?;

        let fitness = 100.0 - lattice.iqe();
        let output = self.dir.join(OUT_FILE);
        serde_json::to_writer(
            File::create(&output)
                .context(format!("unable to write '{}'", output.display()))?,
            &fitness,
        )?;
        info!(
            tadf,
            fluo,
            iqe = lattice.iqe(),
            recombinations = lattice.recombinations(),
            "candidate evaluated"
        );
        Ok((SUCCESS, String::new()))
    }

    /// The controller watches for this sentinel next to the worker
    /// directories.
    fn touch_stop(&self) -> Result<()> {
        let home = self
            .dir
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        File::create(home.join(STOP_FILE))?;
        Ok(())
    }

    fn report(&self, code: u8, message: &str) -> Result<()> {
        fs::write(self.dir.join(ERROR_FILE), message)
            .context("unable to write the diagnostic file")?;
        if code != SUCCESS {
            warn!(code, message, "candidate evaluation failed");
            self.touch_stop()?;
        }
        Ok(())
    }
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        match self.evaluate() {
            Ok((code, message)) => {
                self.report(code, &message)?;
                Ok(ExitCode::from(code))
            }
            Err(error) => {
                self.report(u8::MAX, &format!("{error:#}"))?;
                Err(error)
            }
        }
    }
}
