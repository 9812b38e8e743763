pub mod config; // tiergate config file and environment credentials
pub mod dispatcher; // per-user event fan-out between transport and router
pub mod endpoints; // liveness and status HTTP endpoints
pub mod error; // error handling
pub mod generation; // content-generation collaborators
pub mod membership; // membership source and verdict cache
pub mod menu; // user-facing views and choice sets
pub mod observability; // log setup
pub mod router; // conversational state machine
pub mod store; // process-wide state owned by the router
#[cfg(test)]
mod testing;
pub mod transport; // chat transport boundary and the Telegram adapter
pub mod types; // user, group, and feature identifiers
pub mod usage_limit; // daily usage ledger and tiered quota policy
