use focuskit_communication::{
    spawn_receiver, ExhaustPolarity, PeripheralCommand, TelemetryLayout, TelemetryReceiver,
    TelemetryRecord, TelemetryUpdate,
};
use focuskit_core::{Axes, EventBus, MachineState};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn record(state: MachineState, b: f32) -> [u8; 28] {
    TelemetryLayout::Rev1.encode(&TelemetryRecord {
        axes: Axes::new(0.0, 0.0, 0.0, b),
        state,
        played: 1,
        total: 3,
    })
}

async fn next(rx: &mut mpsc::Receiver<TelemetryUpdate>) -> TelemetryUpdate {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("update in time")
        .expect("channel open")
}

#[tokio::test]
async fn test_datagrams_and_liveness() {
    let receiver = TelemetryReceiver::bind(
        "127.0.0.1:0",
        TelemetryLayout::Rev1,
        Duration::from_millis(150),
    )
    .await
    .expect("bind");
    let target = receiver.local_addr().expect("addr");

    let (tx, mut rx) = mpsc::channel(16);
    let task = spawn_receiver(receiver, EventBus::shared(), tx);

    let machine = UdpSocket::bind("127.0.0.1:0").await.expect("bind machine");

    // Garbage first: silently dropped
    machine.send_to(&[1, 2, 3], target).await.expect("send");
    machine
        .send_to(&record(MachineState::Playing, 10.0), target)
        .await
        .expect("send");

    assert_eq!(next(&mut rx).await, TelemetryUpdate::Connection(true));
    match next(&mut rx).await {
        TelemetryUpdate::Record(r) => {
            assert_eq!(r.state, MachineState::Playing);
            assert_eq!(r.axes.b, 10.0);
        }
        other => panic!("unexpected {:?}", other),
    }

    // Silence beyond the window: exactly one falling edge
    assert_eq!(next(&mut rx).await, TelemetryUpdate::Connection(false));
    assert!(timeout(Duration::from_millis(400), rx.recv()).await.is_err());

    machine
        .send_to(&record(MachineState::Paused, 11.0), target)
        .await
        .expect("send");
    assert_eq!(next(&mut rx).await, TelemetryUpdate::Connection(true));
    assert!(matches!(
        next(&mut rx).await,
        TelemetryUpdate::Record(r) if r.state == MachineState::Paused
    ));

    task.abort();
}

#[tokio::test]
async fn test_peripheral_tokens_reach_peer() {
    let receiver = TelemetryReceiver::bind(
        "127.0.0.1:0",
        TelemetryLayout::Rev1,
        Duration::from_millis(500),
    )
    .await
    .expect("bind");

    let peer = UdpSocket::bind("127.0.0.1:0").await.expect("bind peer");
    let sender = receiver.peripheral(
        peer.local_addr().expect("addr"),
        ExhaustPolarity::ActiveLow,
        EventBus::shared(),
    );

    sender
        .send(PeripheralCommand::LaserPower(0.25))
        .await
        .expect("send");
    sender
        .send(PeripheralCommand::TopExhaust(true))
        .await
        .expect("send");

    let mut buf = [0u8; 32];
    let (n, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
        .await
        .expect("in time")
        .expect("recv");
    assert_eq!(&buf[..n], b"l(1023)");

    let (n, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
        .await
        .expect("in time")
        .expect("recv");
    assert_eq!(&buf[..n], b"t(0)");
}
