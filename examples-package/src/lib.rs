//! Runnable examples for the logtally crates
