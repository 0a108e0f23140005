use anyhow::{bail, Context, Result};
use cavity_flow::config::Config;
use cavity_flow::output::sinks_from_config;
use cavity_flow::simulation::Simulation;
use log::info;
use std::io::Write;

fn usage(program: &str) -> String {
    format!("usage: {program} <parameter file> [--pressure-test]")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("cavity-flow");
    let mut config_path = None;
    let mut pressure_test = false;
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--pressure-test" => pressure_test = true,
            "-h" | "--help" => {
                println!("{}", usage(program));
                return Ok(());
            }
            other if config_path.is_none() => config_path = Some(other.to_string()),
            other => bail!("unexpected argument '{other}'\n{}", usage(program)),
        }
    }
    let Some(config_path) = config_path else {
        eprintln!("{}", usage(program));
        std::process::exit(2);
    };

    let config = Config::from_file(&config_path)?;
    config.log_summary();

    let mut sim = Simulation::from_config(&config).context("Failed to set up simulation")?;

    if pressure_test {
        let [uniform, constant_rhs] = sim.pressure_self_test();
        info!(
            "Pressure self test: uniform p {} in {} iterations, constant rhs {} in {} iterations",
            if uniform.converged { "converged" } else { "did not converge" },
            uniform.iterations,
            if constant_rhs.converged { "converged" } else { "did not converge" },
            constant_rhs.iterations
        );
        return Ok(());
    }

    let mut sinks = sinks_from_config(&config.output)
        .with_context(|| format!("Failed to prepare output directory '{}'", config.output.directory))?;
    let summary = sim.run(&mut sinks)?;
    info!(
        "Finished {} steps at t={}, output in '{}'",
        summary.steps, summary.final_time, config.output.directory
    );
    Ok(())
}
