//! Runtime-selected challenge oracle: static bank or remote completion
//! endpoint, chosen once at startup from configuration.
//!
//! `ChallengeOracle::generate`/`validate` return `impl Future`, which is not
//! object-safe, so callers that need one concrete type spanning both
//! adapters (the HTTP/WS server's shared state) use this enum rather than
//! `dyn ChallengeOracle`.

use dpp_domain::Challenge;
use dpp_ports::{ChallengeContext, ChallengeOracle, ChallengeOracleError};

use crate::remote_oracle::RemoteChallengeOracle;
use crate::static_oracle::StaticChallengeOracle;

pub enum AnyChallengeOracle {
    Static(StaticChallengeOracle),
    Remote(RemoteChallengeOracle),
}

impl ChallengeOracle for AnyChallengeOracle {
    async fn generate(
        &self,
        context: &ChallengeContext,
        round_num: u32,
        prev_answer_hash: &str,
    ) -> Result<Challenge, ChallengeOracleError> {
        match self {
            AnyChallengeOracle::Static(o) => o.generate(context, round_num, prev_answer_hash).await,
            AnyChallengeOracle::Remote(o) => o.generate(context, round_num, prev_answer_hash).await,
        }
    }

    async fn validate(&self, challenge: &Challenge, answer: &str) -> bool {
        match self {
            AnyChallengeOracle::Static(o) => o.validate(challenge, answer).await,
            AnyChallengeOracle::Remote(o) => o.validate(challenge, answer).await,
        }
    }

    fn is_mock(&self) -> bool {
        match self {
            AnyChallengeOracle::Static(o) => o.is_mock(),
            AnyChallengeOracle::Remote(o) => o.is_mock(),
        }
    }
}
