//! Behaviour-driven tests for calls between two connected engines.

use std::str::FromStr;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use crate::{CallResult, EngineError};

use super::support::{Peers, echo_builder};

// ---------------------------------------------------------------------------
// Typed wrappers for Gherkin step parameters
// ---------------------------------------------------------------------------

/// A quoted string value from a Gherkin feature file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QuotedString(String);

impl FromStr for QuotedString {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim_matches('"').to_owned()))
    }
}

impl QuotedString {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// A JSON literal from a Gherkin feature file, such as `"hi"` or `5`.
#[derive(Debug, Clone, PartialEq)]
struct JsonLiteral(Value);

impl FromStr for JsonLiteral {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TestWorld {
    peers: Option<Peers>,
    call_result: Option<CallResult>,
    notify_result: Option<Result<(), EngineError>>,
}

impl TestWorld {
    fn peers(&self) -> &Peers {
        self.peers.as_ref().expect("peers should be connected")
    }

    fn call_result(&self) -> &CallResult {
        self.call_result.as_ref().expect("a call should have been made")
    }
}

#[fixture]
fn world() -> TestWorld {
    TestWorld::default()
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("a connected peer with an echo handler")]
fn given_connected_peer(world: &mut TestWorld) {
    world.peers = Some(Peers::connect(echo_builder(), echo_builder()));
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the caller calls {method} with the argument {argument}")]
fn when_call_with_argument(world: &mut TestWorld, method: QuotedString, argument: JsonLiteral) {
    let result = world.peers().local.call(method.as_str(), [argument.0]);
    world.call_result = Some(result);
}

#[when("the caller calls {method} without arguments")]
fn when_call_without_arguments(world: &mut TestWorld, method: QuotedString) {
    let result = world.peers().local.call(method.as_str(), ());
    world.call_result = Some(result);
}

#[when("the caller calls {method} with the arguments {first} and {second}")]
fn when_call_with_two_arguments(
    world: &mut TestWorld,
    method: QuotedString,
    first: JsonLiteral,
    second: JsonLiteral,
) {
    let result = world
        .peers()
        .local
        .call(method.as_str(), [first.0, second.0]);
    world.call_result = Some(result);
}

#[when("the peer calls back {method} with the argument {argument}")]
fn when_peer_calls_back(world: &mut TestWorld, method: QuotedString, argument: JsonLiteral) {
    let result = world.peers().remote.call(method.as_str(), [argument.0]);
    world.call_result = Some(result);
}

#[when("the caller notifies {method} with {argument}")]
fn when_notify(world: &mut TestWorld, method: QuotedString, argument: JsonLiteral) {
    let result = world.peers().local.notify(method.as_str(), [argument.0]);
    world.notify_result = Some(result);
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("the call succeeds with {expected}")]
fn then_call_succeeds(world: &mut TestWorld, expected: JsonLiteral) {
    let result = world.call_result();
    assert_eq!(result.value(), Some(&expected.0), "unexpected outcome: {result:?}");
}

#[then("the call fails with code {code}")]
fn then_call_fails(world: &mut TestWorld, code: i64) {
    let error = world.call_result().error().expect("expected the call to fail");
    assert_eq!(error.code, code, "unexpected error: {error}");
}

#[then("the notification is sent")]
fn then_notification_sent(world: &mut TestWorld) {
    let result = world
        .notify_result
        .as_ref()
        .expect("a notification should have been sent");
    assert!(result.is_ok(), "notification failed: {result:?}");
}

#[then("the peer writes no response to the notification")]
fn then_no_response(world: &mut TestWorld) {
    let peers = world.peers();
    // Frames are handled in order, so the echo reply follows anything the
    // notification produced.
    let probe = peers.local.call("echo", ["probe"]);
    assert!(probe.is_ok(), "probe call failed: {probe:?}");

    let frames = peers.remote_output.frames();
    assert_eq!(frames.len(), 1, "peer wrote {frames:?}");
    assert_eq!(frames.first().map(|frame| &frame["result"]), Some(&Value::from("probe")));
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/engine_calls.feature",
    name = "Echo returns its argument"
)]
fn echo_returns_argument(world: TestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/engine_calls.feature",
    name = "Registered handlers decode positional arguments"
)]
fn handlers_decode_arguments(world: TestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/engine_calls.feature",
    name = "Unknown methods are reported"
)]
fn unknown_methods_reported(world: TestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/engine_calls.feature",
    name = "Arity mismatches are rejected"
)]
fn arity_mismatches_rejected(world: TestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/engine_calls.feature",
    name = "Ill-typed arguments are rejected"
)]
fn ill_typed_arguments_rejected(world: TestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/engine_calls.feature",
    name = "Notifications are never answered"
)]
fn notifications_never_answered(world: TestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/engine_calls.feature",
    name = "The peer can call back over the same connection"
)]
fn peer_calls_back(world: TestWorld) {
    let _ = world;
}
