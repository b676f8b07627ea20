// Unit tests that exercise the public API from outside the crate
// This file acts as the entry point for all unit tests in tests/unit/

mod unit {
    mod config_tests;
    mod request_tests;
}
