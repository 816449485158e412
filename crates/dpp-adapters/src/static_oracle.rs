//! Static challenge bank: a fixed set of hand-written challenges cycled by
//! scenario tag. Used as the default oracle and as the fallback target when
//! the remote oracle adapter cannot be reached.

use dpp_domain::{Challenge, Scenario};
use dpp_ports::{ChallengeContext, ChallengeOracle, ChallengeOracleError};

struct Bank {
    scenario: Scenario,
    prompt: &'static str,
    options: &'static [&'static str],
    correct_option: char,
    rationale: &'static str,
}

const BANK: &[Bank] = &[
    Bank {
        scenario: Scenario::MarketArbitrage,
        prompt: "A price discrepancy of 2.4% appears between two venues for the same asset. Latency to both venues is 80ms. What do you do?",
        options: &["A: Execute the arbitrage immediately", "B: Wait for a larger spread", "C: Ignore it", "D: Alert a human trader"],
        correct_option: 'A',
        rationale: "A spread above transaction cost and latency risk should be captured immediately.",
    },
    Bank {
        scenario: Scenario::MarketArbitrage,
        prompt: "You detect an arbitrage opportunity but your position limit is already at 90% utilisation. What is the operationally sound action?",
        options: &["A: Execute anyway, ignoring limits", "B: Skip the trade, limits exist for a reason", "C: Request a limit increase first, then trade", "D: Liquidate unrelated positions to make room"],
        correct_option: 'B',
        rationale: "Position limits are a hard risk control; breaching them for one opportunity is not sound.",
    },
    Bank {
        scenario: Scenario::DebugIncident,
        prompt: "A production service starts returning 500s for 10% of requests immediately after a deploy. What is the first action?",
        options: &["A: Roll back the deploy", "B: Add more replicas", "C: Wait and see if it self-resolves", "D: Restart the database"],
        correct_option: 'A',
        rationale: "A deploy-correlated regression should be rolled back first to restore service.",
    },
    Bank {
        scenario: Scenario::DebugIncident,
        prompt: "Error logs show a spike in timeouts from a downstream dependency, not your own service. What should you do?",
        options: &["A: Roll back your own deploy", "B: Open a circuit breaker to the dependency and degrade gracefully", "C: Ignore since it is not your code", "D: Scale your own service horizontally"],
        correct_option: 'B',
        rationale: "Isolating the failing dependency prevents cascading failure without masking the real cause.",
    },
    Bank {
        scenario: Scenario::ResourceAllocation,
        prompt: "Two jobs request the last available GPU: one is a nightly batch job, the other is a user-facing inference request. Which gets priority?",
        options: &["A: The batch job, first come first served", "B: The user-facing inference request", "C: Split the GPU between both", "D: Deny both and queue"],
        correct_option: 'B',
        rationale: "User-facing latency-sensitive work takes priority over deferrable batch work.",
    },
    Bank {
        scenario: Scenario::ResourceAllocation,
        prompt: "A cluster is at 95% memory utilisation and a new high-priority job needs to schedule. What is the sound action?",
        options: &["A: Evict the lowest-priority running job to make room", "B: Let the new job fail to schedule", "C: Force-schedule and let the OOM killer decide", "D: Restart the whole cluster"],
        correct_option: 'A',
        rationale: "Controlled eviction of low-priority work is the standard way to make room for higher-priority work.",
    },
    Bank {
        scenario: Scenario::RiskAssessment,
        prompt: "A new code change touches authentication logic and has 40% test coverage. Should it ship to production today?",
        options: &["A: Yes, ship as scheduled", "B: No, block until coverage and review are adequate", "C: Ship but disable authentication temporarily", "D: Ship to 100% of users with no rollback plan"],
        correct_option: 'B',
        rationale: "Low test coverage on security-critical code is a blocking risk, not an acceptable one.",
    },
    Bank {
        scenario: Scenario::RiskAssessment,
        prompt: "An automated trading strategy has a backtested Sharpe ratio of 0.3 but the live demo is compelling. Do you deploy it with full capital?",
        options: &["A: Yes, the demo result is what matters", "B: No, deploy with a small capital allocation first", "C: Deploy with 10x leverage to capture more upside", "D: Ignore the backtest entirely"],
        correct_option: 'B',
        rationale: "A weak backtest warrants a conservative, staged capital allocation, not full commitment.",
    },
    Bank {
        scenario: Scenario::DataPipelineFailure,
        prompt: "A nightly ETL job fails at the transform stage, leaving the destination table half-written. What is the right recovery action?",
        options: &["A: Leave the half-written table as is", "B: Truncate and re-run the job from the last good checkpoint", "C: Manually patch individual rows", "D: Disable the pipeline permanently"],
        correct_option: 'B',
        rationale: "Idempotent re-runs from a checkpoint are the standard recovery for partial writes.",
    },
    Bank {
        scenario: Scenario::DataPipelineFailure,
        prompt: "Upstream schema changed without notice, causing silent data corruption downstream for the last six hours. What first step limits damage?",
        options: &["A: Pause downstream consumers and quarantine the corrupted window", "B: Keep consumers running, corruption is rare", "C: Delete all historical data to be safe", "D: Wait for the upstream team to notice"],
        correct_option: 'A',
        rationale: "Halting propagation and isolating the bad window limits blast radius before any fix is applied.",
    },
    Bank {
        scenario: Scenario::ApiRateLimiting,
        prompt: "A client is sending requests at 50x their allotted rate limit. What is the appropriate response?",
        options: &["A: Silently drop their requests", "B: Return 429 with a Retry-After header", "C: Permanently ban the client", "D: Increase their limit to match demand"],
        correct_option: 'B',
        rationale: "Standard rate-limit enforcement communicates the limit and expected retry behavior.",
    },
    Bank {
        scenario: Scenario::ApiRateLimiting,
        prompt: "Legitimate traffic is being throttled because a shared rate-limit bucket is being exhausted by one noisy tenant. What do you do?",
        options: &["A: Raise the global limit for everyone", "B: Partition the limit per-tenant so one tenant cannot starve others", "C: Disable rate limiting entirely", "D: Block all tenants until the noisy one is identified manually"],
        correct_option: 'B',
        rationale: "Per-tenant partitioning is the direct fix for noisy-neighbor exhaustion of a shared limit.",
    },
    Bank {
        scenario: Scenario::CostOptimisation,
        prompt: "A batch workload runs fine on spot instances but a recent run was evicted mid-job, wasting 4 hours of compute. What should change?",
        options: &["A: Abandon spot instances entirely", "B: Add checkpointing so evictions lose minutes, not hours", "C: Ignore it, evictions are rare", "D: Switch to the most expensive instance type available"],
        correct_option: 'B',
        rationale: "Checkpointing preserves most of spot's cost savings while bounding eviction loss.",
    },
    Bank {
        scenario: Scenario::CostOptimisation,
        prompt: "A storage bucket has grown to petabytes, most of it objects untouched for over a year. What is the most sound action?",
        options: &["A: Delete everything older than a year", "B: Move cold objects to an archival storage tier", "C: Leave it as is to avoid any risk", "D: Duplicate it to a second region for safety, doubling cost"],
        correct_option: 'B',
        rationale: "Tiering cold data to archival storage cuts cost without destroying anything.",
    },
    Bank {
        scenario: Scenario::ServiceDegradation,
        prompt: "Your recommendation service's dependency is down, but the checkout flow that calls it must still complete. What is the right fallback?",
        options: &["A: Fail the entire checkout", "B: Serve a cached or generic set of recommendations and let checkout proceed", "C: Retry the dependency indefinitely, blocking checkout", "D: Disable checkout until the dependency recovers"],
        correct_option: 'B',
        rationale: "Graceful degradation preserves the critical path while the non-critical feature degrades.",
    },
    Bank {
        scenario: Scenario::ServiceDegradation,
        prompt: "P99 latency has tripled under load but the service is not yet failing requests. What is the proactive step?",
        options: &["A: Wait until requests start failing before acting", "B: Shed non-critical load now to protect the critical path", "C: Increase the timeout so slow requests do not fail", "D: Take the service offline"],
        correct_option: 'B',
        rationale: "Proactive load shedding prevents a latency problem from becoming an outage.",
    },
    Bank {
        scenario: Scenario::SecurityTriage,
        prompt: "A dependency used in production is flagged with a critical CVE that has a public exploit. What is the priority action?",
        options: &["A: Patch on the next regular release cycle", "B: Patch or mitigate immediately, out of band if necessary", "C: Remove the dependency without a replacement", "D: Take no action since no breach has been observed"],
        correct_option: 'B',
        rationale: "A critical CVE with a public exploit requires immediate, out-of-cycle remediation.",
    },
    Bank {
        scenario: Scenario::SecurityTriage,
        prompt: "An internal service account's credentials were found committed to a public repository one hour ago. What do you do first?",
        options: &["A: Wait to see if the credentials are misused", "B: Rotate the credentials immediately and audit recent access", "C: Delete the repository only", "D: Email the team and move on"],
        correct_option: 'B',
        rationale: "Immediate rotation neutralises the exposed credential regardless of whether it was misused.",
    },
    Bank {
        scenario: Scenario::CapacityPlanning,
        prompt: "Traffic has grown 15% month over month for six months and current capacity runs out in five weeks. What is the sound plan?",
        options: &["A: Wait until capacity is exhausted to act", "B: Begin capacity expansion now, sized to the trend", "C: Throttle all traffic to stay within current capacity indefinitely", "D: Assume growth will stop on its own"],
        correct_option: 'B',
        rationale: "Acting ahead of a clear trend avoids a capacity-driven outage.",
    },
    Bank {
        scenario: Scenario::CapacityPlanning,
        prompt: "A seasonal traffic spike is predictable and 10x normal load, lasting three days per year. What is the most sound provisioning strategy?",
        options: &["A: Permanently run at 10x capacity year-round", "B: Scale up temporarily ahead of the known window and back down after", "C: Do nothing and accept degraded service during the spike", "D: Turn away the extra traffic"],
        correct_option: 'B',
        rationale: "Temporary scaling matched to a known, bounded spike avoids both outages and wasted year-round cost.",
    },
];

/// Default challenge oracle: deterministic, offline, and the fallback
/// target for [`crate::remote_oracle::RemoteChallengeOracle`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticChallengeOracle;

impl StaticChallengeOracle {
    pub fn new() -> Self {
        Self
    }
}

impl ChallengeOracle for StaticChallengeOracle {
    async fn generate(
        &self,
        _context: &ChallengeContext,
        round_num: u32,
        _prev_answer_hash: &str,
    ) -> Result<Challenge, ChallengeOracleError> {
        let idx = (round_num.saturating_sub(1) as usize) % BANK.len();
        let entry = &BANK[idx];

        Ok(Challenge {
            prompt: entry.prompt.to_string(),
            options: entry.options.iter().map(|s| s.to_string()).collect(),
            correct_option: entry.correct_option,
            rationale: entry.rationale.to_string(),
            scenario: Scenario::for_round(round_num),
            round_num,
        })
    }

    async fn validate(&self, challenge: &Challenge, answer: &str) -> bool {
        answer
            .trim()
            .to_uppercase()
            .starts_with(challenge.correct_option)
    }

    fn is_mock(&self) -> bool {
        true
    }
}
