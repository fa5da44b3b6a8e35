//! Endpoint address contract tests
//!
//! Addresses travel as plain `/`-separated strings.
