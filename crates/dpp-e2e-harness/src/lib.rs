//! End-to-end harness for the Decision-Proof Protocol verifier: drives the
//! WebSocket protocol through a running `dpp-server` the way a real peer
//! would, scripting each of the scenarios named in the acceptance suite and
//! recording a transcript of what happened.

pub mod client;
pub mod harness;
pub mod transcript;

pub use client::{ApiClient, ClientError, DppClient};
pub use harness::{
    run_all, run_happy_path, run_pow_timeout, run_stage2_low_accuracy, run_stage2_timing_variance,
    run_stage3_human_environment, run_stage4_clustered_history, HarnessConfig, HarnessResult,
};
pub use transcript::{HarnessTranscript, TranscriptEntry, TranscriptEntryKind};
