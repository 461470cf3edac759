//! Operation table
//!
//! Maps remote method names to the flow the client runs for them. Names
//! are matched exactly; anything unregistered is a plain request.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// One request, response returned as-is
    Standard,
    /// Request, then sign and finalize any returned signature request
    Withdraw,
    /// Local WIF is swapped for its public key before sending
    Sweep,
}

pub const WITHDRAW_METHODS: [&str; 7] = [
    "withdraw",
    "withdraw_from_address",
    "withdraw_from_addresses",
    "withdraw_from_label",
    "withdraw_from_labels",
    "withdraw_from_user_id",
    "withdraw_from_users",
];

pub const SWEEP_METHODS: [&str; 1] = ["prepare_sweep_transaction"];

#[derive(Debug, Clone)]
pub struct OperationTable {
    kinds: HashMap<&'static str, CallKind>,
}

impl OperationTable {
    pub fn new() -> Self {
        let mut kinds = HashMap::new();
        for name in WITHDRAW_METHODS {
            kinds.insert(name, CallKind::Withdraw);
        }
        for name in SWEEP_METHODS {
            kinds.insert(name, CallKind::Sweep);
        }
        Self { kinds }
    }

    pub fn register(&mut self, method: &'static str, kind: CallKind) {
        self.kinds.insert(method, kind);
    }

    pub fn kind_of(&self, method: &str) -> CallKind {
        self.kinds.get(method).copied().unwrap_or(CallKind::Standard)
    }
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}
