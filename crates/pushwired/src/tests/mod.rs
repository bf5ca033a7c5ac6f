//! Cross-module behaviour tests for the push daemon.

mod support;
