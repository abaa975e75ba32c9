/// Inbound update classification and pipeline dispatch
pub mod handlers;
/// Outbound prompts, status messages, and message replacement
pub mod presenter;
