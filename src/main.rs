use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use saucedemo_harness::logging::init_logging;
use saucedemo_harness::sim::Storefront;
use saucedemo_harness::{
    HarnessConfig, PersonaRegistry, Scenario, ScenarioOutcome, ScenarioRunner, SessionFactory,
};

/// Page-object and cross-persona checks for the Sauce Labs demo storefront.
#[derive(Parser)]
#[command(name = "saucedemo-harness")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios and report pass/fail
    Run {
        /// Scenario to run (repeatable); all when omitted
        #[arg(short, long = "scenario", value_name = "NAME")]
        scenarios: Vec<String>,

        /// Run only as this persona
        #[arg(short, long)]
        persona: Option<String>,

        /// Where sessions come from
        #[arg(short, long, value_enum, default_value_t = Backend::Sim)]
        backend: Backend,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the seeded personas and their quirks
    Personas {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// In-process storefront simulator
    Sim,
    /// Real browser via Playwright
    Browser,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

async fn run_all<F: SessionFactory>(
    factory: &F,
    config: &HarnessConfig,
    registry: &PersonaRegistry,
    scenarios: &[Scenario],
    persona: Option<&str>,
) -> anyhow::Result<Vec<ScenarioOutcome>> {
    let requested = persona.map(|id| registry.lookup(id)).transpose()?;
    let runner = ScenarioRunner::new(factory, config);
    info!(
        backend = factory.backend(),
        scenarios = scenarios.len(),
        "starting run"
    );

    let mut outcomes = Vec::new();
    for &scenario in scenarios {
        let personas = scenario.personas(registry, requested);
        outcomes.extend(runner.run(scenario, &personas).await);
    }
    Ok(outcomes)
}

#[cfg(feature = "browser")]
async fn run_in_browser(
    config: &HarnessConfig,
    registry: &PersonaRegistry,
    scenarios: &[Scenario],
    persona: Option<&str>,
) -> anyhow::Result<Vec<ScenarioOutcome>> {
    let browser = saucedemo_harness::browser::PlaywrightBrowser::launch(config.browser).await?;
    let outcomes = run_all(&browser, config, registry, scenarios, persona).await;
    browser.close().await?;
    outcomes
}

#[cfg(not(feature = "browser"))]
async fn run_in_browser(
    _config: &HarnessConfig,
    _registry: &PersonaRegistry,
    _scenarios: &[Scenario],
    _persona: Option<&str>,
) -> anyhow::Result<Vec<ScenarioOutcome>> {
    bail!("this build has no browser backend; rebuild with `--features browser`")
}

fn report(outcomes: &[ScenarioOutcome], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcomes)?);
    } else {
        for outcome in outcomes {
            println!("{outcome}");
        }
    }

    let failed = outcomes.iter().filter(|o| !o.passed).count();
    if failed > 0 {
        bail!("{failed} of {} scenario runs failed", outcomes.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let registry = PersonaRegistry::seeded();

    match cli.command {
        Commands::Run {
            scenarios,
            persona,
            backend,
            config,
            json,
        } => {
            let config = load_config(config.as_ref())?;
            let scenarios = if scenarios.is_empty() {
                Scenario::ALL.to_vec()
            } else {
                scenarios
                    .iter()
                    .map(|name| name.parse())
                    .collect::<Result<Vec<Scenario>, _>>()?
            };

            let outcomes = match backend {
                Backend::Sim => {
                    run_all(
                        &Storefront::default(),
                        &config,
                        &registry,
                        &scenarios,
                        persona.as_deref(),
                    )
                    .await?
                }
                Backend::Browser => {
                    run_in_browser(&config, &registry, &scenarios, persona.as_deref()).await?
                }
            };
            report(&outcomes, json)?;
        }
        Commands::Personas { json } => {
            if json {
                let personas: Vec<_> = registry.iter().collect();
                println!("{}", serde_json::to_string_pretty(&personas)?);
            } else {
                for persona in registry.iter() {
                    println!("{persona}");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_to_simulator_and_all_scenarios() {
        let cli = Cli::try_parse_from(["saucedemo-harness", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                scenarios,
                persona,
                backend,
                json,
                ..
            } => {
                assert!(scenarios.is_empty());
                assert!(persona.is_none());
                assert_eq!(backend, Backend::Sim);
                assert!(!json);
            }
            _ => panic!("Expected Run command"),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn run_accepts_repeated_scenarios() {
        let cli = Cli::try_parse_from([
            "saucedemo-harness",
            "run",
            "--scenario",
            "login",
            "--scenario",
            "sorting",
            "--persona",
            "problem",
            "--backend",
            "browser",
            "-vv",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                scenarios,
                persona,
                backend,
                ..
            } => {
                assert_eq!(scenarios, vec!["login", "sorting"]);
                assert_eq!(persona.as_deref(), Some("problem"));
                assert_eq!(backend, Backend::Browser);
            }
            _ => panic!("Expected Run command"),
        }
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn personas_subcommand_parses() {
        let cli = Cli::try_parse_from(["saucedemo-harness", "personas", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Personas { json: true }));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["saucedemo-harness", "run", "--backend", "selenium"]).is_err());
    }
}
