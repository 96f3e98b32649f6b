//! Integration tests for Listing-Tracker
//!
//! These tests run against a wiremock server standing in for the
//! marketplace.

mod fetch_tests;
mod session_tests;
mod support;
