//! End-to-end tests of the client and coordinator against a scripted
//! specMech.

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use specmech_client::bus::Severity;
use specmech_client::codec::MechCommand;
use specmech_client::mech::{check_reply, MechCoordinator, MoveRequest};
use specmech_client::types::{
    MechError, Mechanism, MotorAxis, PneumaticState, ReplyCode, Status, StatusKind,
};
use specmech_client::{dispatch, MechClient, MechOp};

use support::{reply, spawn_mock, test_config, Recorder};

async fn connected_pair<F>(handler: F) -> (Arc<MechClient>, MechCoordinator)
where
    F: FnMut(&str) -> Vec<u8> + Send + 'static,
{
    let addr = spawn_mock(handler).await;
    let config = test_config(addr);

    let client = Arc::new(MechClient::new(&config.spec_mech));
    client.start().await.unwrap();

    let coordinator = MechCoordinator::new(Arc::clone(&client), &config);
    (client, coordinator)
}

#[tokio::test(start_paused = true)]
async fn test_pneumatics_status() {
    let (client, _) = connected_pair(|command| {
        assert_eq!(command, "rp;1");
        reply(command, &["PNU,,o,,c,,o,,1"])
    })
    .await;

    let status = client.get_stat(StatusKind::Pneumatics).await.unwrap();
    match status {
        Status::Pneumatics(pneumatics) => {
            assert_eq!(pneumatics.shutter, PneumaticState::Open);
            assert_eq!(pneumatics.hartmann_left, PneumaticState::Closed);
            assert_eq!(pneumatics.hartmann_right, PneumaticState::Open);
            assert_eq!(pneumatics.air_pressure.to_string(), "on");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_reboot_then_ack() {
    let (client, coordinator) = connected_pair(|command| {
        if command == "!" {
            b">".to_vec()
        } else {
            b"!".to_vec()
        }
    })
    .await;

    let rt = client
        .send(MechCommand::Report(StatusKind::Time), None)
        .await;
    assert_eq!(rt.code, ReplyCode::ControllerRebooted);
    assert!(client.reboot_pending());

    // Further operations are refused until the reboot is acknowledged.
    let error = coordinator.fan(true).await.unwrap_err();
    assert!(matches!(error, MechError::ControllerRebooted));

    coordinator.ack().await.unwrap();
    assert!(!client.reboot_pending());
}

#[tokio::test(start_paused = true)]
async fn test_error_sentence_raises_reply_error() {
    let (client, _) = connected_pair(|command| reply(command, &["ERR,42,Bad arg"])).await;

    let response = client
        .send(MechCommand::Raw("oX".to_string()), None)
        .await;
    assert_eq!(response.code, ReplyCode::ErrInReply);

    match check_reply(&response) {
        Err(MechError::Reply { code, message }) => {
            assert_eq!(code, "42");
            assert_eq!(message, "Bad arg");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_pneumatic_move_reaches_target() {
    let (_, coordinator) = connected_pair(|command| {
        if command.starts_with("os") {
            reply(command, &[])
        } else {
            reply(command, &["PNU,,o,,c,,c,,1"])
        }
    })
    .await;

    let recorder = Recorder::new();
    let state = coordinator
        .pneumatic_move(Mechanism::Shutter, true, Some(recorder.as_ref()))
        .await
        .unwrap();

    assert_eq!(state, PneumaticState::Open);
    assert_eq!(recorder.count(Severity::Warning), 0);
    assert_eq!(recorder.count(Severity::Info), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pneumatic_move_timeout() {
    // The shutter never leaves the transitioning state.
    let (_, coordinator) = connected_pair(|command| {
        if command.starts_with("os") {
            reply(command, &[])
        } else {
            reply(command, &["PNU,,t,,c,,c,,1"])
        }
    })
    .await;

    let recorder = Recorder::new();
    let error = coordinator
        .pneumatic_move(Mechanism::Shutter, true, Some(recorder.as_ref()))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        MechError::MechanismTransition(Mechanism::Shutter)
    ));
    // Exactly one warning, emitted between the two polls.
    assert_eq!(recorder.count(Severity::Warning), 1);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_move_issues_no_command() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let log = Arc::clone(&seen);

    let (_, coordinator) = connected_pair(move |command| {
        log.lock().unwrap().push(command.to_string());
        match &command[..2] {
            "ra" => reply(command, &["MTR,,a,500,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
            "rb" => reply(command, &["MTR,,b,500,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
            "rc" => reply(command, &["MTR,,c,500,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
            _ => reply(command, &[]),
        }
    })
    .await;

    let request = MoveRequest {
        motor: Some(MotorAxis::A),
        ..MoveRequest::absolute(3000)
    };
    let error = coordinator.collimator_move(&request).await.unwrap_err();

    assert!(matches!(
        error,
        MechError::OutOfRange {
            axis: MotorAxis::A,
            position: 3000,
            ..
        }
    ));

    // Only the three motor reports hit the wire.
    let commands = seen.lock().unwrap();
    assert_eq!(commands.len(), 3);
    assert!(commands.iter().all(|command| command.starts_with('r')));
}

#[tokio::test(start_paused = true)]
async fn test_motor_busy_and_limit_switch() {
    let (_, coordinator) = connected_pair(|command| match &command[..2] {
        "ra" => reply(command, &["MTR,,a,500,microns,100,rpm,0,mA,up,,N,,0,,20000"]),
        _ => reply(command, &[]),
    })
    .await;

    let error = coordinator
        .collimator_move(&MoveRequest::offset(100))
        .await
        .unwrap_err();
    assert!(matches!(error, MechError::MotorBusy(MotorAxis::A)));

    let (_, coordinator) = connected_pair(|command| match &command[..2] {
        "ra" => reply(command, &["MTR,,a,500,microns,0,rpm,0,mA,up,,Y,,0,,20000"]),
        _ => reply(command, &[]),
    })
    .await;

    let error = coordinator
        .collimator_move(&MoveRequest::offset(100))
        .await
        .unwrap_err();
    assert!(matches!(error, MechError::LimitSwitch(MotorAxis::A)));
}

#[tokio::test(start_paused = true)]
async fn test_encoder_bounds_mismatch() {
    let (_, coordinator) = connected_pair(|command| match &command[..2] {
        "ra" => reply(command, &["MTR,,a,500,microns,0,rpm,0,mA,up,,N,,0,,15000"]),
        _ => reply(command, &[]),
    })
    .await;

    let error = coordinator
        .collimator_move(&MoveRequest::offset(100))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        MechError::OutOfRange {
            axis: MotorAxis::A,
            position: 15000,
            min: 0,
            max: 20000,
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_collimator_move_converges() {
    let (_, coordinator) = connected_pair(|command| match &command[..2] {
        "ra" => reply(command, &["MTR,,a,1000,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
        "rb" => reply(command, &["MTR,,b,1000,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
        "rc" => reply(command, &["MTR,,c,1000,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
        "rd" => reply(
            command,
            &[
                "MTR,,a,1201,microns",
                "MTR,,b,1199,microns",
                "MTR,,c,1200,microns",
            ],
        ),
        "md" => reply(command, &[]),
        _ => reply(command, &[]),
    })
    .await;

    let positions = coordinator
        .collimator_move(&MoveRequest::offset(200))
        .await
        .unwrap();

    assert_eq!(positions.a, 1201);
    assert_eq!(positions.b, 1199);
    assert_eq!(positions.c, 1200);
}

#[tokio::test(start_paused = true)]
async fn test_collimator_move_does_not_converge() {
    let (_, coordinator) = connected_pair(|command| match &command[..2] {
        "ra" => reply(command, &["MTR,,a,1000,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
        "rb" => reply(command, &["MTR,,b,1000,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
        "rc" => reply(command, &["MTR,,c,1000,microns,0,rpm,0,mA,up,,N,,0,,20000"]),
        "rd" => reply(
            command,
            &[
                "MTR,,a,1150,microns",
                "MTR,,b,1150,microns",
                "MTR,,c,1150,microns",
            ],
        ),
        _ => reply(command, &[]),
    })
    .await;

    let error = coordinator
        .collimator_move(&MoveRequest::offset(200))
        .await
        .unwrap_err();

    match error {
        MechError::MoveDidNotConverge { positions, targets } => {
            assert_eq!(positions, [1150, 1150, 1150]);
            assert_eq!(targets, [1200, 1200, 1200]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_send_timeout_drops_the_stream() {
    let (client, _) = connected_pair(|command| {
        if command.starts_with("rt") {
            // Starve the client.
            Vec::new()
        } else {
            reply(command, &[])
        }
    })
    .await;

    let response = client
        .send(
            MechCommand::Report(StatusKind::Time),
            Some(Duration::from_secs(3)),
        )
        .await;
    assert_eq!(response.code, ReplyCode::ConnectionFailed);
    assert!(!client.is_connected());

    // Sending again without reconnecting keeps failing.
    let response = client.send(MechCommand::Raw("rp".to_string()), None).await;
    assert_eq!(response.code, ReplyCode::ConnectionFailed);

    // A new start() recovers.
    client.start().await.unwrap();
    assert!(client.is_connected());
    let response = client.send(MechCommand::Raw("rp".to_string()), None).await;
    assert_eq!(response.code, ReplyCode::Valid);
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_echo_id() {
    let (client, _) = connected_pair(|command| {
        let verb = command.split(';').next().unwrap().to_string();
        reply(&format!("{};9", verb), &[])
    })
    .await;

    let response = client.send(MechCommand::Raw("rt".to_string()), None).await;
    assert_eq!(response.code, ReplyCode::MismatchedId);
}

#[tokio::test(start_paused = true)]
async fn test_sends_are_serialized() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let log = Arc::clone(&seen);

    let (client, _) = connected_pair(move |command| {
        log.lock().unwrap().push(command.to_string());
        reply(command, &[])
    })
    .await;

    let first = client.send(MechCommand::Raw("rt".to_string()), None);
    let second = client.send(MechCommand::Raw("rp".to_string()), None);
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.code, ReplyCode::Valid);
    assert_eq!(second.code, ReplyCode::Valid);

    // Both frames arrived whole, with the ids in lock-acquisition order.
    let commands = seen.lock().unwrap();
    assert_eq!(commands.len(), 2);
    assert!(commands[0] == "rt;1" || commands[0] == "rp;1");
    assert!(commands[1] == "rt;2" || commands[1] == "rp;2");
    assert_ne!(commands[0][..2], commands[1][..2]);
}

#[tokio::test(start_paused = true)]
async fn test_talk_strips_telnet() {
    let (_, coordinator) = connected_pair(|command| {
        let mut out = b"\xFF\xFA\x18\xFF\xF0".to_vec();
        out.extend(reply(command, &[]));
        out
    })
    .await;

    let raw = coordinator.talk("rt").await.unwrap();
    assert!(raw.starts_with("$S2CMD,rt;1"));
    assert!(raw.ends_with('>'));
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_terminates_commands() {
    let (_, coordinator) = connected_pair(|command| match &command[..2] {
        "rp" => reply(command, &["PNU,,c,,c,,c,,1"]),
        _ => reply(command, &[]),
    })
    .await;

    // A status command emits the keyed record and finishes.
    let recorder = Recorder::new();
    dispatch(
        &coordinator,
        MechOp::Status(Some(StatusKind::Pneumatics)),
        recorder.as_ref(),
    )
    .await;
    assert_eq!(recorder.count(Severity::Info), 1);
    assert_eq!(recorder.finishes.lock().unwrap().len(), 1);
    assert!(recorder.failures.lock().unwrap().is_empty());

    // A failing operation terminates with a single fail and no finish.
    let recorder = Recorder::new();
    dispatch(
        &coordinator,
        MechOp::Move(MoveRequest::absolute(9999)),
        recorder.as_ref(),
    )
    .await;
    assert!(recorder.finishes.lock().unwrap().is_empty());
    assert_eq!(recorder.failures.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_check_controller() {
    let (client, coordinator) = connected_pair(|command| {
        if command.starts_with("rt") {
            Vec::new()
        } else {
            reply(command, &[])
        }
    })
    .await;

    // The sanity check times out on `rt` and reports the controller dead.
    assert!(!coordinator.check_controller().await);
    assert!(!client.is_connected());
    assert!(!coordinator.check_controller().await);
}
