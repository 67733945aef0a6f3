//! Integration tests for the session state machine.
//!
//! The remote runtime is played by a scripted in-memory channel: frames are
//! queued before the session polls them and everything the session sends is
//! recorded.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use scriptwire_host::control::LifecycleEvent;
use scriptwire_host::debug::Clock;
use scriptwire_host::handler::{decode_call_buffer, ParamKind};
use scriptwire_host::host::events::WeaponShot;
use scriptwire_host::protocol::{opcodes, Announce, Frame};
use scriptwire_host::session::Intent;
use scriptwire_host::{
    BridgeError, CallbackParam, Channel, Host, Native, Received, Result, Session, SessionBuilder,
    SessionConfig, SessionState,
};

/// Empty polls before the scripted peer hangs up.
const IDLE_POLLS_BEFORE_DEATH: usize = 1000;

#[derive(Default)]
struct ScriptedChannel {
    ready: bool,
    connected: bool,
    /// A peer is waiting to be accepted.
    peer_waiting: bool,
    /// Report death as soon as the inbound queue runs dry.
    die_when_drained: bool,
    inbound: VecDeque<Frame>,
    sent: Vec<Frame>,
    setups: usize,
    disconnects: usize,
    idle_polls: usize,
}

impl ScriptedChannel {
    fn with_peer() -> Self {
        Self {
            peer_waiting: true,
            ..Self::default()
        }
    }

    fn push(&mut self, opcode: u8, payload: &[u8]) {
        self.inbound.push_back(Frame::from_parts(opcode, payload));
    }

    fn sent_with(&self, opcode: u8) -> Vec<&Frame> {
        self.sent.iter().filter(|f| f.opcode == opcode).collect()
    }
}

impl Channel for ScriptedChannel {
    fn setup(&mut self) -> Result<()> {
        self.ready = true;
        self.setups += 1;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn connect(&mut self) -> Result<bool> {
        if !self.ready {
            return Err(BridgeError::ConnectionClosed);
        }
        if self.connected {
            return Ok(true);
        }
        if self.peer_waiting {
            self.peer_waiting = false;
            self.connected = true;
            self.idle_polls = 0;
        }
        Ok(self.connected)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, opcode: u8, payload: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(BridgeError::ConnectionClosed);
        }
        self.sent.push(Frame::from_parts(opcode, payload));
        Ok(())
    }

    fn receive(&mut self) -> Received {
        if !self.connected {
            return Received::Dead;
        }
        if let Some(frame) = self.inbound.pop_front() {
            self.idle_polls = 0;
            return Received::Frame(frame);
        }
        self.idle_polls += 1;
        if self.die_when_drained || self.idle_polls > IDLE_POLLS_BEFORE_DEATH {
            self.connected = false;
            return Received::Dead;
        }
        Received::NoCommand
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.ready = false;
        self.inbound.clear();
        self.disconnects += 1;
    }
}

#[derive(Default)]
struct TestHost {
    natives: HashMap<String, Arc<dyn Native>>,
    commands: Vec<String>,
}

fn health_native(args: &[u8]) -> Result<Vec<u8>> {
    Ok(vec![args.len() as u8, 0, 0, 0])
}

impl TestHost {
    fn new() -> Self {
        let mut host = Self::default();
        host.natives
            .insert("SetPlayerHealth".to_string(), Arc::new(health_native));
        host
    }
}

impl Host for TestHost {
    fn find_native(&self, name: &str) -> Option<Arc<dyn Native>> {
        self.natives.get(name).cloned()
    }

    fn exec_command(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }
}

#[derive(Clone)]
struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}

type Events = Arc<Mutex<Vec<LifecycleEvent>>>;
type TestSession = Session<ScriptedChannel, TestHost>;

fn session_with(builder: SessionBuilder) -> (TestSession, Events) {
    let events: Events = Arc::default();
    let sink = events.clone();
    let session = builder
        .reporter(move |event: LifecycleEvent| sink.lock().unwrap().push(event))
        .build(ScriptedChannel::with_peer(), TestHost::new());
    (session, events)
}

fn connected() -> (TestSession, Events) {
    let (mut session, events) = session_with(SessionBuilder::new());
    assert!(session.connect());
    session.channel_mut().sent.clear();
    (session, events)
}

fn record(name: &str, descriptors: &[u8]) -> Vec<u8> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    bytes.extend_from_slice(descriptors);
    bytes
}

fn caller_and_name(caller: u16, name: &str) -> Vec<u8> {
    let mut bytes = caller.to_le_bytes().to_vec();
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    bytes
}

/// Connected, started with mode 0 and past the init callback.
fn initialized() -> (TestSession, Events) {
    let (mut session, events) = connected();
    session.channel_mut().push(opcodes::START, &[0]);
    session.tick();
    // Unregistered, so nothing is sent, but the init is observed.
    assert_eq!(session.public_call(0, "OnGameModeInit", &[]), None);
    assert_eq!(session.state(), SessionState::Initialized);
    session.channel_mut().sent.clear();
    (session, events)
}

/// Scenario A: a fresh connect sends exactly one announcement.
#[test]
fn test_connect_sends_single_announce() {
    let config = SessionConfig {
        protocol_version: 7,
        build_version: 0x0003_0001,
        working_dir: Some(PathBuf::from("/srv/game")),
        ..SessionConfig::default()
    };
    let (mut session, events) = session_with(SessionBuilder::new().config(config));
    assert!(session.intermission().is_on());

    assert!(session.connect());
    assert!(session.connect());

    let sent = &session.channel().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].opcode, opcodes::ANNOUNCE);
    let announce = Announce::decode(&sent[0].payload).unwrap();
    assert_eq!(announce.protocol_version, 7);
    assert_eq!(announce.build_version, 0x0003_0001);
    assert_eq!(announce.working_dir, "/srv/game");

    assert_eq!(session.state(), SessionState::AwaitingStart);
    assert!(!session.intermission().is_on());
    assert_eq!(
        *events.lock().unwrap(),
        [LifecycleEvent::Starting, LifecycleEvent::Connected]
    );
}

/// Without a peer connect reports false and changes nothing.
#[test]
fn test_connect_without_peer() {
    let (mut session, events) = session_with(SessionBuilder::new());
    session.channel_mut().peer_waiting = false;

    assert!(!session.connect());
    assert!(session.channel().sent.is_empty());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(*events.lock().unwrap(), [LifecycleEvent::Starting]);
}

/// Scenario B: START mode 1 after the host init runs the init command once.
#[test]
fn test_restart_mode_runs_init_command_once() {
    let (mut session, _) = session_with(SessionBuilder::new());
    session.channel_mut().peer_waiting = false;
    assert_eq!(session.public_call(0, "OnGameModeInit", &[]), None);
    assert!(session.status().has_host_init());

    session.channel_mut().peer_waiting = true;
    session.channel_mut().push(opcodes::START, &[1]);
    session.tick();
    session.tick();

    assert_eq!(session.host().commands, ["gmx"]);
    assert!(session.status().is_started());
}

/// START mode 1 before the host init does nothing but start.
#[test]
fn test_restart_mode_without_host_init() {
    let (mut session, _) = connected();
    session.channel_mut().push(opcodes::START, &[1]);
    session.tick();

    assert!(session.host().commands.is_empty());
    assert_eq!(session.state(), SessionState::AwaitingInit);
}

/// Unknown START modes are logged and keep the session started.
#[test]
fn test_unknown_start_mode_keeps_started() {
    let (mut session, _) = connected();
    session.channel_mut().push(opcodes::START, &[9]);
    session.tick();
    assert!(session.status().is_started());
}

/// Scenario C: DISCONNECT followed by death clears start, intent and registries.
#[test]
fn test_declared_disconnect_then_death() {
    let (mut session, events) = connected();
    {
        let channel = session.channel_mut();
        channel.push(opcodes::START, &[0]);
        channel.push(opcodes::REGISTER_CALL, &record("OnFoo", &[1, 1]));
        channel.push(opcodes::FIND_NATIVE, &caller_and_name(1, "SetPlayerHealth"));
    }
    session.tick();
    assert!(session.callbacks().is_registered("OnFoo"));
    assert_eq!(session.natives().len(), 1);

    session.channel_mut().push(opcodes::DISCONNECT, &[]);
    session.channel_mut().die_when_drained = true;
    session.tick();

    let status = session.status();
    assert!(!status.is_started());
    assert_eq!(status.intent(), Intent::None);
    assert!(!status.is_link_up());
    assert!(session.callbacks().is_empty());
    assert!(session.natives().is_empty());
    assert_eq!(session.state(), SessionState::Disconnected);

    assert_eq!(events.lock().unwrap().last(), Some(&LifecycleEvent::Disconnected));
    assert!(session.intermission().is_on());

    // Torn down and armed again.
    assert_eq!(session.channel().disconnects, 1);
    assert!(session.channel().is_ready());
}

/// Death without notice is an unexpected disconnect.
#[test]
fn test_unannounced_death_is_an_error() {
    let (mut session, events) = initialized();
    session
        .channel_mut()
        .push(opcodes::REGISTER_CALL, &record("OnFoo", &[]));
    session.channel_mut().die_when_drained = true;
    session.tick();

    assert!(!session.status().is_started());
    assert!(session.callbacks().is_empty());
    assert_eq!(events.lock().unwrap().last(), Some(&LifecycleEvent::Error));
    // Init is remembered for the next connection.
    assert!(session.status().has_client_init());
}

/// Scenario D: a registered callback is forwarded and its reply returned.
#[test]
fn test_public_call_round_trip() {
    let (mut session, _) = initialized();
    session
        .channel_mut()
        .push(opcodes::REGISTER_CALL, &record("OnFoo", &[1, 1]));
    session.tick();
    session.channel_mut().sent.clear();

    {
        let channel = session.channel_mut();
        channel.push(opcodes::PING, &[]);
        channel.push(opcodes::RESPONSE, &[1, 42, 0, 0, 0]);
    }
    let value = session.public_call(5, "OnFoo", &[1.into(), 2.into()]);
    assert_eq!(value, Some(42));

    let sent = &session.channel().sent;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].opcode, opcodes::PUBLIC_CALL);
    assert_eq!(sent[1].opcode, opcodes::PONG);

    let call = decode_call_buffer(&[ParamKind::Value, ParamKind::Value], &sent[0].payload, true)
        .unwrap();
    assert_eq!(call.caller, Some(5));
    assert_eq!(call.name, "OnFoo");
    assert_eq!(call.params, [CallbackParam::Int(1), CallbackParam::Int(2)]);
}

/// A reply without the success flag carries no value.
#[test]
fn test_public_call_failed_reply() {
    let (mut session, _) = initialized();
    session
        .channel_mut()
        .push(opcodes::REGISTER_CALL, &record("OnFoo", &[]));
    session.tick();

    session.channel_mut().push(opcodes::RESPONSE, &[0, 42, 0, 0, 0]);
    assert_eq!(session.public_call(0, "OnFoo", &[]), None);
    assert!(session.is_client_connected());
}

/// No reply at all ends in a dead connection and `None`.
#[test]
fn test_public_call_without_reply() {
    let (mut session, events) = initialized();
    session
        .channel_mut()
        .push(opcodes::REGISTER_CALL, &record("OnFoo", &[]));
    session.tick();

    assert_eq!(session.public_call(0, "OnFoo", &[]), None);
    assert!(!session.is_client_connected());
    assert_eq!(events.lock().unwrap().last(), Some(&LifecycleEvent::Error));
}

/// Representative host event: the remote cancels a weapon shot.
#[test]
fn test_weapon_shot_prevent_default() {
    let (mut session, _) = initialized();
    session.channel_mut().push(
        opcodes::REGISTER_CALL,
        &record(WeaponShot::CALLBACK, &[1, 1, 1, 1, 1, 1, 1]),
    );
    session.tick();

    let mut shot = WeaponShot {
        player_id: 0,
        weapon: 24,
        hit_type: 1,
        hit_id: 2,
        position: [0.5, 1.0, 2.0],
        prevent_default: false,
    };
    session.channel_mut().push(opcodes::RESPONSE, &[1, 0, 0, 0, 0]);
    let value = session.public_call(0, WeaponShot::CALLBACK, &shot.params());
    shot.apply_result(value);
    assert!(shot.prevent_default);
}

/// Public calls are dropped unless connected, started, initialized and settled.
#[test]
fn test_public_call_gates() {
    // Disconnected.
    let (mut session, _) = session_with(SessionBuilder::new());
    assert_eq!(session.public_call(0, "OnFoo", &[]), None);
    assert!(session.channel().sent.is_empty());

    // Connected, not started.
    let (mut session, _) = connected();
    session
        .channel_mut()
        .push(opcodes::REGISTER_CALL, &record("OnFoo", &[]));
    session.tick();
    session.channel_mut().push(opcodes::RESPONSE, &[1, 1, 0, 0, 0]);
    assert_eq!(session.public_call(0, "OnFoo", &[]), None);
    assert!(session.channel().sent.is_empty());

    // Started, init not seen yet.
    session.channel_mut().inbound.clear();
    session.channel_mut().push(opcodes::START, &[0]);
    session.tick();
    assert_eq!(session.public_call(0, "OnFoo", &[]), None);
    assert!(session.channel().sent.is_empty());

    // Remote announced its departure.
    assert_eq!(session.public_call(0, "OnGameModeInit", &[]), None);
    session.channel_mut().push(opcodes::DISCONNECT, &[]);
    session.tick();
    session.channel_mut().sent.clear();
    assert_eq!(session.public_call(0, "OnFoo", &[]), None);
    assert!(session.channel().sent.is_empty());
    assert_eq!(session.state(), SessionState::Disconnecting);
}

/// A reply showing up during a tick is discarded and the drain continues.
#[test]
fn test_reply_during_tick_is_discarded() {
    let (mut session, _) = connected();
    {
        let channel = session.channel_mut();
        channel.push(opcodes::RESPONSE, &[1, 7, 0, 0, 0]);
        channel.push(opcodes::PING, &[]);
    }
    session.tick();

    assert_eq!(session.channel().sent_with(opcodes::PONG).len(), 1);
    assert!(session.channel().inbound.is_empty());
    assert!(session.is_client_connected());
}

/// Only an initialized session gets heartbeats.
#[test]
fn test_tick_heartbeat_requires_init() {
    let (mut session, _) = connected();
    session.tick();
    assert!(session.channel().sent_with(opcodes::TICK).is_empty());

    let (mut session, _) = initialized();
    session.tick();
    assert_eq!(session.channel().sent_with(opcodes::TICK).len(), 1);
}

/// Scenario E: native handles are stable; unknown natives get -1.
#[test]
fn test_find_native_handles() {
    let (mut session, _) = connected();
    {
        let channel = session.channel_mut();
        channel.push(opcodes::FIND_NATIVE, &caller_and_name(3, "SetPlayerHealth"));
        channel.push(opcodes::FIND_NATIVE, &caller_and_name(4, "SetPlayerHealth"));
        channel.push(opcodes::FIND_NATIVE, &caller_and_name(5, "NoSuchNative"));
    }
    session.tick();

    let replies = session.channel().sent_with(opcodes::REPLY);
    assert_eq!(replies.len(), 3);
    assert_eq!(&replies[0].payload[..2], &[3, 0]);
    let first = i32::from_le_bytes(replies[0].payload[2..6].try_into().unwrap());
    let second = i32::from_le_bytes(replies[1].payload[2..6].try_into().unwrap());
    let missing = i32::from_le_bytes(replies[2].payload[2..6].try_into().unwrap());
    assert!(first >= 0);
    assert_eq!(first, second);
    assert_eq!(missing, -1);
}

/// Native invocations reply with the caller id and the result bytes.
#[test]
fn test_invoke_native_replies() {
    let (mut session, _) = connected();
    session
        .channel_mut()
        .push(opcodes::FIND_NATIVE, &caller_and_name(1, "SetPlayerHealth"));
    session.tick();

    let mut request = 9u16.to_le_bytes().to_vec();
    request.extend_from_slice(&0i32.to_le_bytes());
    request.extend_from_slice(&[0xAA; 8]);
    session.channel_mut().push(opcodes::INVOKE_NATIVE, &request);

    let mut unknown = 2u16.to_le_bytes().to_vec();
    unknown.extend_from_slice(&77i32.to_le_bytes());
    session.channel_mut().push(opcodes::INVOKE_NATIVE, &unknown);
    session.tick();

    let replies = session.channel().sent_with(opcodes::REPLY);
    assert_eq!(&replies[1].payload[..], &[9, 0, 8, 0, 0, 0]);
    assert_eq!(&replies[2].payload[..], &[2, 0]);
}

/// RECONNECT keeps the registries and the start; the next connect resumes.
#[test]
fn test_reconnect_keeps_session() {
    let (mut session, events) = initialized();
    {
        let channel = session.channel_mut();
        channel.push(opcodes::REGISTER_CALL, &record("OnFoo", &[]));
        channel.push(opcodes::RECONNECT, &[]);
    }
    session.tick();

    assert_eq!(session.state(), SessionState::Reconnecting);
    assert!(session.callbacks().is_registered("OnFoo"));
    assert!(session.channel().is_ready());
    assert_eq!(events.lock().unwrap().last(), Some(&LifecycleEvent::Disconnected));

    session.channel_mut().peer_waiting = true;
    session.tick();
    assert_eq!(session.state(), SessionState::Initialized);
    assert_eq!(session.channel().sent_with(opcodes::ANNOUNCE).len(), 1);
    assert_eq!(events.lock().unwrap().last(), Some(&LifecycleEvent::Connected));
}

/// START mode 2 delivers the init callback inside the start handler.
#[test]
fn test_fake_init_handshake() {
    let (mut session, _) = session_with(SessionBuilder::new());
    session.channel_mut().peer_waiting = false;
    session.public_call(0, "OnGameModeInit", &[]);

    session.channel_mut().peer_waiting = true;
    assert!(session.connect());
    {
        let channel = session.channel_mut();
        channel.push(opcodes::REGISTER_CALL, &record("OnGameModeInit", &[]));
        channel.push(opcodes::START, &[2]);
        // A nested fake init is refused.
        channel.push(opcodes::START, &[2]);
        channel.push(opcodes::RESPONSE, &[1, 1, 0, 0, 0]);
    }
    session.tick();

    let calls = session.channel().sent_with(opcodes::PUBLIC_CALL);
    assert_eq!(calls.len(), 1);
    let call = decode_call_buffer(&[], &calls[0].payload, true).unwrap();
    assert_eq!(call.caller, Some(0));
    assert_eq!(call.name, "OnGameModeInit");
    assert_eq!(session.state(), SessionState::Initialized);
}

/// Every disconnect re-arms the channel and clears the link.
#[test]
fn test_disconnect_rearms_channel_in_every_state() {
    let setups: [fn() -> (TestSession, Events); 2] = [connected, initialized];
    for make in setups {
        for expected in [true, false] {
            for declare in [false, true] {
                let (mut session, _) = make();
                if declare {
                    session.channel_mut().push(opcodes::DISCONNECT, &[]);
                    session.tick();
                }
                let setups_before = session.channel().setups;

                session.disconnect(Some("test"), expected);

                assert!(!session.status().is_link_up());
                assert!(!session.is_client_connected());
                assert!(session.channel().is_ready());
                assert_eq!(session.channel().setups, setups_before + 1);
                assert_eq!(session.channel().disconnects, 1);

                // A second disconnect is a no-op.
                session.disconnect(Some("test"), expected);
                assert_eq!(session.channel().disconnects, 1);
            }
        }
    }
}

/// terminate is an unexpected disconnect.
#[test]
fn test_terminate() {
    let (mut session, events) = initialized();
    session.terminate("host shutting down");
    assert!(!session.status().is_started());
    assert_eq!(events.lock().unwrap().last(), Some(&LifecycleEvent::Error));
}

/// Heartbeats stop while the remote looks paused and resume on traffic.
#[test]
fn test_paused_remote_gets_no_heartbeats() {
    let clock = ManualClock::new();
    let (mut session, _) = session_with(SessionBuilder::new().clock(clock.clone()));
    assert!(session.connect());
    session.channel_mut().push(opcodes::START, &[0]);
    session.tick();
    session.public_call(0, "OnGameModeInit", &[]);
    session
        .channel_mut()
        .push(opcodes::REGISTER_CALL, &record("OnFoo", &[]));
    session.tick();
    session.channel_mut().sent.clear();

    // Heard from just now: heartbeat goes out.
    clock.advance(Duration::from_secs(6));
    session.tick();
    assert_eq!(session.channel().sent_with(opcodes::TICK).len(), 1);

    // Last heartbeat is 6s newer than the last interaction.
    clock.advance(Duration::from_secs(1));
    session.tick();
    assert_eq!(session.channel().sent_with(opcodes::TICK).len(), 1);
    assert!(session.debug_detector().is_paused());
    assert_eq!(session.public_call(0, "OnFoo", &[]), None);
    assert!(session.channel().sent_with(opcodes::PUBLIC_CALL).is_empty());

    // Traffic from the remote ends the pause.
    session.channel_mut().push(opcodes::ALIVE, &[]);
    session.tick();
    session.tick();
    assert_eq!(session.channel().sent_with(opcodes::TICK).len(), 2);
    assert!(!session.debug_detector().is_paused());
}

/// Remote PRINT text and malformed commands never disturb the session.
#[test]
fn test_print_and_malformed_commands() {
    let (mut session, _) = connected();
    {
        let channel = session.channel_mut();
        channel.push(opcodes::PRINT, b"hello from the remote\0");
        channel.push(opcodes::FIND_NATIVE, &[1]);
        channel.push(opcodes::REGISTER_CALL, &record("OnBad", &[0x08]));
        channel.push(opcodes::PING, &[]);
    }
    session.tick();

    assert!(session.callbacks().is_empty());
    assert_eq!(session.channel().sent.len(), 1);
    assert_eq!(session.channel().sent[0].opcode, opcodes::PONG);
}
