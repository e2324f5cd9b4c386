use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::logic::plan::{RunSummary, SimulationPlan, StepCounts};
use crate::logic::runner::PlanRunner;
use crate::scenarios::TestScenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    /// Step counters summed over every iteration.
    pub totals: StepCounts,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester {
    runner: PlanRunner,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(runner: PlanRunner, verbose: bool) -> Self {
        Self { runner, verbose }
    }

    pub async fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (preset: {:?} seed: {})",
                    scenario.name.bright_white(),
                    scenario.plan.preset,
                    seed
                );
            }

            let result = self.run_single_scenario(scenario, seed, iterations).await;
            results.push(result);
        }

        results
    }

    async fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();
        let mut totals = StepCounts::default();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let verdict = match self.runner.run_plan(&scenario.plan, iteration_seed).await {
                Ok(summary) => {
                    totals.absorb(&summary.counts);
                    evaluate(&scenario.plan, &summary).map(|()| summary)
                }
                Err(err) => Err(format!("{err:#}")),
            };

            match verdict {
                Ok(summary) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?}) \
                             realm:{} battles:{} shops:{}",
                            i + 1,
                            iterations,
                            summary.final_state.realm,
                            summary.counts.battles,
                            summary.counts.shops
                        );
                    }
                }
                Err(err) => {
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            err.clone().red()
                        );
                    }
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}): {err}",
                        i + 1
                    ));
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            totals,
            average_duration,
            performance_data,
        }
    }
}

/// Invariant violations first, then the scenario's own expectations.
fn evaluate(plan: &SimulationPlan, summary: &RunSummary) -> Result<(), String> {
    if let Some(first) = summary.violations.first() {
        return Err(format!(
            "{} invariant violation(s), first: {first}",
            summary.violations.len()
        ));
    }
    for expectation in &plan.expectations {
        expectation(summary)?;
    }
    Ok(())
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::get_scenario;
    use std::sync::Arc;
    use xiuxian_game::GameContent;

    fn tester() -> LogicTester {
        LogicTester::new(
            PlanRunner::new(Arc::new(GameContent::default_content().clone()), false),
            false,
        )
    }

    #[tokio::test]
    async fn smoke_scenario_passes_for_two_seeds() {
        let scenario = get_scenario("smoke").unwrap();
        let results = tester().run_scenario(&scenario, &[1, 2], 2).await;
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.passed, "{:?}", result.failures);
            assert_eq!(result.successful_iterations, 2);
            assert!(result.totals.completed > 0);
        }
    }

    #[tokio::test]
    async fn unmet_expectations_are_reported_per_iteration() {
        let mut scenario = get_scenario("smoke").unwrap();
        scenario.plan.steps = 0;
        let results = tester().run_scenario(&scenario, &[5], 3).await;
        let result = &results[0];
        assert!(!result.passed);
        assert_eq!(result.failures.len(), 3);
        assert!(result.failures[0].contains("no adventure completed"));
        assert_eq!(result.average_duration, Duration::ZERO);
    }

    #[test]
    fn durations_serialize_as_millis() {
        let result = ScenarioResult {
            scenario_name: String::from("smoke"),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            totals: StepCounts::default(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.performance_data, vec![Duration::from_millis(12)]);
    }
}
