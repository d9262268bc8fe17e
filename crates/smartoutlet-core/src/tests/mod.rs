//! Behavioural tests for record resolution.

mod support;
