//! The fixed ten-element scenario tag set used by the challenge oracle (C2).

use serde::{Deserialize, Serialize};

/// One operational scenario a Stage 2 challenge can be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    MarketArbitrage,
    DebugIncident,
    ResourceAllocation,
    RiskAssessment,
    DataPipelineFailure,
    ApiRateLimiting,
    CostOptimisation,
    ServiceDegradation,
    SecurityTriage,
    CapacityPlanning,
}

/// Ordered to match the round-robin index the oracle cycles through.
pub const SCENARIOS: [Scenario; 10] = [
    Scenario::MarketArbitrage,
    Scenario::DebugIncident,
    Scenario::ResourceAllocation,
    Scenario::RiskAssessment,
    Scenario::DataPipelineFailure,
    Scenario::ApiRateLimiting,
    Scenario::CostOptimisation,
    Scenario::ServiceDegradation,
    Scenario::SecurityTriage,
    Scenario::CapacityPlanning,
];

impl Scenario {
    /// Round-robins through `SCENARIOS`, 1-indexed by round number.
    pub fn for_round(round_num: u32) -> Self {
        let idx = (round_num.saturating_sub(1) as usize) % SCENARIOS.len();
        SCENARIOS[idx]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::MarketArbitrage => "market_arbitrage",
            Scenario::DebugIncident => "debug_incident",
            Scenario::ResourceAllocation => "resource_allocation",
            Scenario::RiskAssessment => "risk_assessment",
            Scenario::DataPipelineFailure => "data_pipeline_failure",
            Scenario::ApiRateLimiting => "api_rate_limiting",
            Scenario::CostOptimisation => "cost_optimisation",
            Scenario::ServiceDegradation => "service_degradation",
            Scenario::SecurityTriage => "security_triage",
            Scenario::CapacityPlanning => "capacity_planning",
        }
    }
}
