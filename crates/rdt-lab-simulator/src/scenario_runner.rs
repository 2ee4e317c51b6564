use anyhow::{Context, Result, bail, ensure};
use rdt_lab_abstract::{Packet, SimConfig, TestAction, TestAssertion, TestScenario, TransportProtocol};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))
}

/// Build a simulator for `scenario`: overrides applied to `base`, actions registered.
///
/// `make_entity` receives the final config so entities can pick up e.g. the timeout.
pub fn build_simulator<P, F>(
    scenario: &TestScenario,
    base: SimConfig,
    make_entity: F,
) -> Result<Simulator<P>>
where
    P: TransportProtocol,
    F: Fn(&SimConfig) -> P,
{
    let mut config = base;
    scenario.config.apply_to(&mut config);
    let mut sim = Simulator::new(config.clone(), make_entity(&config), make_entity(&config))
        .with_context(|| format!("Scenario '{}' cannot start", scenario.name))?;
    configure_actions(&mut sim, &scenario.actions)
        .with_context(|| format!("Scenario '{}' has an invalid action", scenario.name))?;
    Ok(sim)
}

pub fn configure_actions<P: TransportProtocol>(
    sim: &mut Simulator<P>,
    actions: &[TestAction],
) -> Result<()> {
    for action in actions {
        match action {
            TestAction::AppSend { time, entity, data } => {
                sim.schedule_app_data(*time, *entity, Packet::from_bytes(data.as_bytes()))
                    .with_context(|| format!("app_send of {data:?} to {entity}"))?;
            }
            TestAction::DropNext { from, seq, ack } => {
                sim.add_drop_rule(*from, *seq, *ack);
            }
        }
    }
    Ok(())
}

/// Run a loaded scenario on top of `base` to completion and check its assertions.
pub fn run_loaded<P, F>(
    scenario: &TestScenario,
    base: SimConfig,
    make_entity: F,
) -> Result<SimulationReport>
where
    P: TransportProtocol,
    F: Fn(&SimConfig) -> P,
{
    info!("Running scenario '{}': {}", scenario.name, scenario.description);
    let mut sim = build_simulator(scenario, base, make_entity)?;
    sim.run_until_complete();
    let report = sim.export_report();
    check_assertions(&report, &scenario.assertions)
        .with_context(|| format!("Scenario '{}' failed", scenario.name))?;
    info!("Scenario '{}' passed", scenario.name);
    Ok(report)
}

pub fn run_scenario<P, F>(path: &str, make_entity: F) -> Result<SimulationReport>
where
    P: TransportProtocol,
    F: Fn(&SimConfig) -> P,
{
    let scenario = load_scenario(Path::new(path))?;
    run_loaded(&scenario, SimConfig::default(), make_entity)
}

pub fn check_assertions(report: &SimulationReport, assertions: &[TestAssertion]) -> Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { to, data } => {
                let delivered = report.delivered_text(*to);
                ensure!(
                    delivered.iter().any(|d| d.starts_with(data.as_str())),
                    "expected {data:?} to be delivered at {to}, got {delivered:?}"
                );
            }
            TestAssertion::DeliveredInOrder { to, data } => {
                let delivered = report.delivered_text(*to);
                let in_order = delivered.len() == data.len()
                    && delivered
                        .iter()
                        .zip(data)
                        .all(|(got, want)| got.starts_with(want.as_str()));
                ensure!(
                    in_order,
                    "expected deliveries {data:?} at {to}, got {delivered:?}"
                );
            }
            TestAssertion::DeliveryCount { to, count } => {
                let got = report.deliveries_at(*to).count();
                ensure!(
                    got == *count,
                    "expected {count} deliveries at {to}, got {got}"
                );
            }
            TestAssertion::FramesSent { min, max } => {
                let sent = report.channel.frames_sent;
                if sent < *min {
                    bail!("expected at least {min} frames sent, got {sent}");
                }
                if let Some(max) = max
                    && sent > *max
                {
                    bail!("expected at most {max} frames sent, got {sent}");
                }
            }
            TestAssertion::MaxDuration { time } => {
                ensure!(
                    report.simulated_time <= *time,
                    "simulation ran until {:.3}, limit was {time}",
                    report.simulated_time
                );
            }
        }
    }
    Ok(())
}
