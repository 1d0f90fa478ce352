use focuskit_communication::{spawn_connect, CommandSequence, CommandStreamer, LinkInput};
use focuskit_core::{DisconnectReason, EventBus, LineStatus, LinkState, SequenceState};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn next_input(rx: &mut mpsc::Receiver<LinkInput>) -> LinkInput {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("input in time")
        .expect("channel open")
}

/// Apply link inputs to the streamer until `done` holds
async fn drive(
    streamer: &mut CommandStreamer,
    rx: &mut mpsc::Receiver<LinkInput>,
    done: impl Fn(&CommandStreamer) -> bool,
) {
    while !done(streamer) {
        match next_input(rx).await {
            LinkInput::Data { bytes, .. } => streamer.handle_bytes(&bytes),
            LinkInput::Closed { reason, .. } => streamer.detach(reason),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_stream_against_fake_controller() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr").to_string();

    // Controller: ack every line, reject the one containing "bad"
    let controller = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = if line.contains("bad") {
                "error:20\r\n"
            } else {
                "ok\r\n"
            };
            received.push(line);
            if write.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
        received
    });

    let (tx, mut rx) = mpsc::channel(64);
    let mut streamer = CommandStreamer::new(EventBus::shared());
    streamer.set_connecting();
    spawn_connect(1, address, Duration::from_secs(2), tx);

    match next_input(&mut rx).await {
        LinkInput::Connected { handle, .. } => streamer.attach(Box::new(handle)),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(streamer.link_state(), LinkState::Connected);

    streamer
        .load(CommandSequence::from_text("G21\nG1 bad\nG0 Z5\n"))
        .expect("load");
    streamer.play().expect("play");

    drive(&mut streamer, &mut rx, |s| s.state() == SequenceState::Stopped).await;

    let statuses: Vec<LineStatus> = streamer.sequence().iter().map(|l| l.status).collect();
    assert_eq!(
        statuses,
        vec![LineStatus::Ok, LineStatus::Warning, LineStatus::Ok]
    );
    assert_eq!(
        streamer.sequence().get(1).map(|l| l.response.as_str()),
        Some("error:20")
    );

    streamer.detach(DisconnectReason::UserRequested);
    let received = timeout(Duration::from_secs(2), controller)
        .await
        .expect("controller done")
        .expect("join");
    assert_eq!(received, vec!["G21", "G1 bad", "G0 Z5"]);
}

#[tokio::test]
async fn test_remote_close_during_playback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr").to_string();

    // Controller: read one line and hang up without answering
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let mut lines = BufReader::new(socket).lines();
        let _ = lines.next_line().await;
    });

    let (tx, mut rx) = mpsc::channel(64);
    let mut streamer = CommandStreamer::new(EventBus::shared());
    spawn_connect(2, address, Duration::from_secs(2), tx);
    match next_input(&mut rx).await {
        LinkInput::Connected { handle, .. } => streamer.attach(Box::new(handle)),
        other => panic!("unexpected {:?}", other),
    }

    streamer
        .load(CommandSequence::from_text("G0 X1\nG0 X2\n"))
        .expect("load");
    streamer.play().expect("play");

    drive(&mut streamer, &mut rx, |s| {
        s.link_state() == LinkState::Disconnected
    })
    .await;
    assert_eq!(streamer.state(), SequenceState::Error);
}
