//! Scenario tests spanning the store and the query pipeline.

mod support;
