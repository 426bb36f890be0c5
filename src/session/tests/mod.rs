//! Scenario tests for the session navigator, run against in-memory video
//! and discovery fakes and a temporary store directory.

mod navigation_tests;
