//! Side channel tests through a live session.
//!
//! Covers outgoing generation on step/reset, incoming dispatch after the
//! state update, unknown channel ids and payload robustness.

mod common;

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use common::{agent, continuous_brain, handshake, step_output, Reply, Scripted};
use ndarray::Array2;
use proptest::prelude::*;
use simlink::protocol::UnityOutput;
use simlink::side_channel::{
    EnvironmentParametersChannel, FloatPropertiesChannel, IncomingMessage, OutgoingMessage,
    RawBytesChannel, SharedSideChannel, SideChannelManager, StatsAggregationMethod,
    StatsSideChannel, MESSAGE_HEADER_SIZE,
};
use simlink::{ActionTensor, BehaviorSpec, Environment, SimLinkError};
use uuid::Uuid;

fn frame(id: Uuid, body: &[u8]) -> Vec<u8> {
    let mut out = id.to_bytes_le().to_vec();
    out.extend_from_slice(&(body.len() as i32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn with_side_channel(mut output: UnityOutput, payload: Vec<u8>) -> UnityOutput {
    output.rl_output.side_channel = payload;
    output
}

fn walker_output() -> UnityOutput {
    step_output(
        vec![continuous_brain("Walker", 1)],
        vec![("Walker", vec![agent(1, 0.0)])],
    )
}

/// Test queued parameters ride on the next reset and the queue is drained
#[test]
fn test_outgoing_messages_sent_with_reset() {
    let params = Arc::new(Mutex::new(EnvironmentParametersChannel::new()));
    let comm = Scripted::new([
        Reply::Output(handshake("1.0.0", vec![])),
        Reply::Output(walker_output()),
        Reply::Output(walker_output()),
    ]);
    let mut env =
        Environment::connect(comm.clone(), vec![params.clone() as SharedSideChannel], 0).unwrap();

    params.lock().unwrap().set_float_parameter("gravity", -9.81);
    env.reset().unwrap();

    let payload = comm.last_sent().rl_input.unwrap().side_channel;
    let messages = SideChannelManager::parse(&payload).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, EnvironmentParametersChannel::id());
    let mut msg = IncomingMessage::new(messages[0].1.clone());
    assert_eq!(msg.read_string(""), "gravity");

    env.step().unwrap();
    assert!(comm.last_sent().rl_input.unwrap().side_channel.is_empty());
}

/// Test incoming messages reach their channels before step returns
#[test]
fn test_incoming_messages_dispatched() {
    let stats = Arc::new(Mutex::new(StatsSideChannel::new()));
    let floats = Arc::new(Mutex::new(FloatPropertiesChannel::new()));

    let mut stat = OutgoingMessage::new();
    stat.write_string("laps").write_f32(3.0).write_i32(2);
    let mut prop = OutgoingMessage::new();
    prop.write_string("speed").write_f32(1.5);

    let mut payload = frame(StatsSideChannel::id(), &stat.into_bytes());
    payload.extend(frame(FloatPropertiesChannel::id(), &prop.into_bytes()));

    let comm = Scripted::new([
        Reply::Output(handshake("1.0.0", vec![])),
        Reply::Output(with_side_channel(walker_output(), payload)),
    ]);
    let mut env = Environment::connect(
        comm,
        vec![stats.clone() as SharedSideChannel, floats.clone() as SharedSideChannel],
        0,
    )
    .unwrap();
    env.reset().unwrap();

    let collected = stats.lock().unwrap().get_and_reset_stats();
    assert_eq!(collected["laps"], vec![(3.0, StatsAggregationMethod::Sum)]);
    assert_eq!(floats.lock().unwrap().get_property("speed"), Some(1.5));
}

/// Test unknown channel ids are skipped while known ones still arrive
#[test]
fn test_unknown_channel_skipped() {
    let raw_id = Uuid::new_v4();
    let raw = Arc::new(Mutex::new(RawBytesChannel::new(raw_id)));

    let mut payload = frame(Uuid::new_v4(), b"nobody listens");
    payload.extend(frame(raw_id, b"hello"));

    let comm = Scripted::new([
        Reply::Output(handshake("1.0.0", vec![])),
        Reply::Output(with_side_channel(walker_output(), payload)),
    ]);
    let mut env =
        Environment::connect(comm, vec![raw.clone() as SharedSideChannel], 0).unwrap();
    env.reset().unwrap();

    let received = raw.lock().unwrap().get_and_clear_received_messages();
    assert_eq!(received, vec![Bytes::from_static(b"hello")]);
}

/// Test a truncated payload fails the step without touching state
#[test]
fn test_truncated_payload_rejected_atomically() {
    let comm = Scripted::new([
        Reply::Output(handshake("1.0.0", vec![])),
        Reply::Output(walker_output()),
    ]);
    let mut env = Environment::connect(comm.clone(), Vec::new(), 0).unwrap();
    env.reset().unwrap();

    let mut payload = frame(Uuid::new_v4(), b"abcdef");
    payload.truncate(payload.len() - 2);
    comm.push(Reply::Output(with_side_channel(
        step_output(vec![], vec![("Walker", vec![agent(8, 0.0), agent(9, 0.0)])]),
        payload,
    )));

    assert!(matches!(env.step(), Err(SimLinkError::SideChannel(_))));
    assert_eq!(env.get_steps("Walker").unwrap().unwrap().0.agent_id, vec![1]);
}

/// Test two channels with the same id are refused at connect time
#[test]
fn test_duplicate_channel_ids_refused() {
    let a = Arc::new(Mutex::new(FloatPropertiesChannel::new())) as SharedSideChannel;
    let b = Arc::new(Mutex::new(FloatPropertiesChannel::new())) as SharedSideChannel;
    let comm = Scripted::new([Reply::Output(handshake("1.0.0", vec![]))]);

    let err = Environment::connect(comm.clone(), vec![a, b], 0).unwrap_err();
    assert!(matches!(err, SimLinkError::SideChannel(_)));
    assert!(comm.sent().is_empty());
}

/// Test float properties flow both ways through one session
#[test]
fn test_float_properties_round_trip_through_session() {
    let floats = Arc::new(Mutex::new(FloatPropertiesChannel::new()));
    let comm = Scripted::new([
        Reply::Output(handshake("1.0.0", vec![])),
        Reply::Output(walker_output()),
    ]);
    let mut env =
        Environment::connect(comm.clone(), vec![floats.clone() as SharedSideChannel], 0).unwrap();

    floats.lock().unwrap().set_property("difficulty", 0.75);
    env.reset().unwrap();

    let payload = comm.last_sent().rl_input.unwrap().side_channel;
    assert_eq!(payload.len(), MESSAGE_HEADER_SIZE + 4 + "difficulty".len() + 4);
    assert_eq!(floats.lock().unwrap().get_property("difficulty"), Some(0.75));
}

fn arb_continuous_batch() -> impl Strategy<Value = (usize, usize)> {
    (0usize..6, 0usize..6)
}

proptest! {
    /// Parsing arbitrary bytes never panics; success means every byte was consumed
    #[test]
    fn prop_parse_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(messages) = SideChannelManager::parse(&data) {
            let consumed: usize = messages
                .iter()
                .map(|(_, body)| MESSAGE_HEADER_SIZE + body.len())
                .sum();
            prop_assert_eq!(consumed, data.len());
        }
    }

    /// Well-formed frames always parse back to the same messages
    #[test]
    fn prop_parse_wellformed_frames(
        bodies in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 0..8)
    ) {
        let id = Uuid::from_u128(0x1234);
        let payload: Vec<u8> = bodies.iter().flat_map(|b| frame(id, b)).collect();
        let messages = SideChannelManager::parse(&payload).unwrap();
        prop_assert_eq!(messages.len(), bodies.len());
        for ((parsed_id, parsed), body) in messages.iter().zip(&bodies) {
            prop_assert_eq!(*parsed_id, id);
            prop_assert_eq!(&parsed[..], body.as_slice());
        }
    }

    /// A batch of the wrong shape is always rejected and never stored
    #[test]
    fn prop_wrong_shape_never_stored((rows, cols) in arb_continuous_batch()) {
        prop_assume!((rows, cols) != (2, 3));
        let comm = Scripted::new([
            Reply::Output(handshake("1.0.0", vec![])),
            Reply::Output(step_output(
                vec![continuous_brain("Walker", 3)],
                vec![("Walker", vec![agent(1, 0.0), agent(2, 0.0)])],
            )),
        ]);
        let mut env = Environment::connect(comm, Vec::new(), 0).unwrap();
        env.reset().unwrap();

        let result = env.set_actions("Walker", ActionTensor::Continuous(Array2::zeros((rows, cols))));
        let is_shape_mismatch = matches!(result, Err(SimLinkError::ActionShapeMismatch { .. }));
        prop_assert!(is_shape_mismatch);
        prop_assert!(env.pending_actions("Walker").is_none());
    }

    /// Random actions always pass validation for their own spec
    #[test]
    fn prop_random_actions_validate(
        branches in proptest::collection::vec(1usize..6, 1..4),
        n_agents in 0usize..5,
        seed in any::<u64>(),
    ) {
        use rand::SeedableRng;
        let spec = BehaviorSpec {
            observation_shapes: vec![vec![1]],
            action_spec: simlink::ActionSpec::Discrete { branches },
        };
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let actions = spec.create_random_action(n_agents, &mut rng);
        prop_assert!(spec.validate_actions("g", n_agents, &actions).is_ok());
    }
}
