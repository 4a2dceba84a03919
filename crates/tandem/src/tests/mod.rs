//! Engine-level tests: single-engine unit tests and behavioural scenarios
//! over a connected pair.

mod behaviour;
mod support;
