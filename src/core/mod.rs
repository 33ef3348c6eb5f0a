//! Scoring state machine and innings summaries.

/// Ball-by-ball state machine.
pub mod scoring;
/// Totals folding and result strings.
pub mod summary;
