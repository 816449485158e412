//! Decision-Proof Protocol adapters: concrete implementations of the ports
//! defined in `dpp-ports`, backed by SQLite, HMAC-signed JWTs, and a static
//! or LLM-backed challenge bank.

pub mod hmac_signer;
pub mod oracle;
pub mod remote_oracle;
pub mod sqlite_store;
pub mod static_oracle;

pub use hmac_signer::HmacTokenSigner;
pub use oracle::AnyChallengeOracle;
pub use remote_oracle::{RemoteChallengeOracle, RemoteOracleConfig};
pub use sqlite_store::SqliteSessionStore;
pub use static_oracle::StaticChallengeOracle;
