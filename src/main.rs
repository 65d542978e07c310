use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::info;
use pollster::block_on;

use three_body::app::{artifact_lifecycle, print_final_state};
use three_body::{
    load_module_file, load_resource_file, Dispatch, LoadStrategy, Loader, Scenario, Simulation,
};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;

    let module_path = options.module.clone();
    let resource_path = options.resource.clone();
    let loader = Loader::new(
        move || load_module_file(module_path.clone()),
        move || load_resource_file(resource_path.clone()),
    )
    .with_strategy(options.strategy);

    let mut lifecycle = artifact_lifecycle(loader, |line| println!("{line}"));

    info!("content ready; loading artifacts ({:?})", options.strategy);
    match block_on(lifecycle.signal_content_ready()) {
        Dispatch::Completed => {}
        Dispatch::Failed(err) => return Err(err).context("failed to load artifacts"),
        other => return Err(anyhow!("entry point did not run: {other:?}")),
    }

    if options.simulate {
        run_simulation(&options)?;
    }
    Ok(())
}

fn run_simulation(options: &CliOptions) -> Result<()> {
    let mut scenario = match &options.scenario {
        Some(path) => Scenario::from_file(path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?,
        None => Scenario::four_body(),
    };
    if let Some(steps) = options.steps {
        scenario.steps = steps;
    }

    println!(
        "Simulating {} with {} bodies: {} steps of dt={}",
        scenario.name,
        scenario.bodies.len(),
        scenario.steps,
        scenario.dt
    );
    let simulation = Simulation::from_scenario(&scenario)?;
    simulation.step(scenario.steps);
    info!("simulated {:.3} time units", simulation.elapsed());
    print_final_state(&simulation.snapshot());
    Ok(())
}

struct CliOptions {
    module: PathBuf,
    resource: PathBuf,
    strategy: LoadStrategy,
    simulate: bool,
    scenario: Option<PathBuf>,
    steps: Option<u64>,
}

const USAGE: &str = "Usage: three-body <module.wasm> <resource.bin> [--sequential] [--simulate] [--scenario <file.xml>] [--steps <n>]";

impl CliOptions {
    fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let (Some(module), Some(resource)) = (args.next(), args.next()) else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            module: PathBuf::from(module),
            resource: PathBuf::from(resource),
            strategy: LoadStrategy::default(),
            simulate: false,
            scenario: None,
            steps: None,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--sequential" => options.strategy = LoadStrategy::Sequential,
                "--simulate" => options.simulate = true,
                "--scenario" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow!("--scenario requires a file path"))?;
                    options.scenario = Some(PathBuf::from(path));
                    options.simulate = true;
                }
                "--steps" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--steps requires a number"))?;
                    let steps = value
                        .parse::<u64>()
                        .with_context(|| format!("invalid step count: {value}"))?;
                    options.steps = Some(steps);
                    options.simulate = true;
                }
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}
