// Credit balances and the gate in front of AI-backed features.
pub mod admin;
pub mod gate;
pub mod handlers;
pub mod ledger;
pub mod services;
