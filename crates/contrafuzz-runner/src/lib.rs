//! contrafuzz-runner: contract extraction, mutation playbooks, and the
//! blocking executor that feeds the verdict engine.

pub mod contract;
pub mod exec;
pub mod playbooks;

pub use contract::{ContractError, Operation, extract_operations, load_spec};
pub use exec::{FuzzRunner, RunOutcome, RunnerError};
pub use playbooks::{Mutation, Playbook, default_playbooks};
