#![doc = r"Testing utilities and harness for hookwire"]

mod event_log;
mod rule;

pub use event_log::EventLog;
pub use rule::{run_test_render, RenderTestRule, RuleError};

#[cfg(test)]
#[path = "tests/rule_tests.rs"]
mod rule_tests;
