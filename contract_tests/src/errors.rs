//! Structured call error contract tests
