use xiuxian_game::RiskLevel;

use crate::logic::{NarrativeMode, PlayerPreset, RequestMix, RunSummary, SimulationPlan};

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    fn new(name: &str, description: &str, plan: SimulationPlan) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            plan,
        }
    }
}

const CATALOG: [(&str, &str); 5] = [
    ("smoke", "Mixed excursions from a fresh cultivator"),
    (
        "battle-heavy",
        "High-risk secret realms with battles handed off to an interactive surface",
    ),
    (
        "secret-realm",
        "Extreme zones with every boss gate declined",
    ),
    (
        "ai-flaky",
        "A narrative generator serving fenced, chatty and broken payloads",
    ),
    ("merchant", "A wealthy cultivator buying out every merchant"),
];

pub fn list_scenarios() -> Vec<(String, String)> {
    CATALOG
        .iter()
        .map(|(name, description)| ((*name).to_string(), (*description).to_string()))
        .collect()
}

pub fn all_scenario_names() -> Vec<String> {
    CATALOG.iter().map(|(name, _)| (*name).to_string()).collect()
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let description = CATALOG
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, description)| *description)?;
    let plan = match name {
        "smoke" => SimulationPlan::new(PlayerPreset::Novice, RequestMix::Mixed, 25)
            .with_expectation(something_completed),
        "battle-heavy" => SimulationPlan {
            interactive_battles: true,
            ..SimulationPlan::new(
                PlayerPreset::Veteran,
                RequestMix::SecretRealms(RiskLevel::High),
                40,
            )
        }
        .with_expectation(battles_fought)
        .with_expectation(every_handoff_settled),
        "secret-realm" => SimulationPlan {
            accept_bosses: false,
            ..SimulationPlan::new(
                PlayerPreset::Swift,
                RequestMix::SecretRealms(RiskLevel::Extreme),
                40,
            )
        }
        .with_expectation(realms_entered),
        "ai-flaky" => SimulationPlan {
            narrative: NarrativeMode::Flaky,
            check_determinism: true,
            ..SimulationPlan::new(PlayerPreset::Novice, RequestMix::Excursions, 60)
        }
        .with_expectation(generator_consulted),
        "merchant" => SimulationPlan {
            buy_from_merchant: true,
            ..SimulationPlan::new(PlayerPreset::Wealthy, RequestMix::Excursions, 80)
        }
        .with_expectation(merchant_visited),
        _ => return None,
    };
    Some(TestScenario::new(name, description, plan))
}

fn something_completed(summary: &RunSummary) -> Result<(), String> {
    if summary.counts.completed == 0 {
        return Err(String::from("no adventure completed"));
    }
    Ok(())
}

fn battles_fought(summary: &RunSummary) -> Result<(), String> {
    if summary.counts.battles == 0 {
        return Err(String::from("no battle fought in high-risk zones"));
    }
    Ok(())
}

fn every_handoff_settled(summary: &RunSummary) -> Result<(), String> {
    let counts = summary.counts;
    if counts.handoffs != counts.battles {
        return Err(format!(
            "{} hand-offs but {} settled battles",
            counts.handoffs, counts.battles
        ));
    }
    Ok(())
}

fn realms_entered(summary: &RunSummary) -> Result<(), String> {
    if summary.final_state.statistics.secret_realms_entered == 0 {
        return Err(String::from("no secret realm was recorded"));
    }
    Ok(())
}

fn generator_consulted(summary: &RunSummary) -> Result<(), String> {
    if summary.counts.generator_calls == 0 {
        return Err(String::from("the generator was never consulted"));
    }
    Ok(())
}

fn merchant_visited(summary: &RunSummary) -> Result<(), String> {
    let counts = summary.counts;
    if counts.shops == 0 || counts.purchases == 0 {
        return Err(format!(
            "{} merchant visits and {} purchases",
            counts.shops, counts.purchases
        ));
    }
    Ok(())
}
