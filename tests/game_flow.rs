//! End-to-end flows through the spawned coordinator, with tokio time paused so
//! turn timers can be driven deterministically.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use quizturn::config::GameSettings;
use quizturn::game::{self, GameHandle};
use quizturn::hub::Hub;
use quizturn::questions::QuestionBank;
use quizturn::types::*;

fn question(text: &str, correct_answer: usize) -> Question {
    Question {
        text: text.to_string(),
        answers: vec!["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()],
        correct_answer,
    }
}

fn setup(questions: Vec<Question>) -> (GameHandle, Arc<Hub>) {
    let hub = Arc::new(Hub::new());
    let (handle, _task) = game::spawn(
        QuestionBank::new(questions),
        hub.clone(),
        GameSettings::default(),
    );
    (handle, hub)
}

fn drain(rx: &mut UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn question_updates(msgs: &[ServerMsg]) -> Vec<&QuestionUpdate> {
    msgs.iter()
        .filter_map(|m| match m {
            ServerMsg::QuestionUpdate(u) => Some(u),
            _ => None,
        })
        .collect()
}

fn scores(players: &[Player]) -> Vec<(&str, u32)> {
    players.iter().map(|p| (p.name.as_str(), p.score)).collect()
}

/// Creates a game as Alice and joins Bob. Returns the game code.
async fn lobby(handle: &GameHandle, alice: &mut UnboundedReceiver<ServerMsg>) -> String {
    handle
        .client_event("alice", ClientMsg::CreateGame("Alice".to_string()))
        .await;
    // Round-trip through the mailbox so the create has been processed.
    handle.snapshot("").await;
    let code = match drain(alice).first() {
        Some(ServerMsg::GameCode(code)) => code.clone(),
        other => panic!("expected game code, got {other:?}"),
    };

    handle
        .client_event(
            "bob",
            ClientMsg::JoinGame(JoinRequest {
                game_code: code.clone(),
                player_name: "Bob".to_string(),
            }),
        )
        .await;
    code
}

#[tokio::test(start_paused = true)]
async fn full_game_with_answer_and_timeout() {
    let (handle, hub) = setup(vec![
        question("Q0", 1),
        question("Q1", 2),
        question("Q2", 0),
    ]);
    let mut alice = hub.register("alice");
    let mut bob = hub.register("bob");

    let code = lobby(&handle, &mut alice).await;
    let snapshot = handle.snapshot(&code).await.unwrap();
    assert_eq!(scores(&snapshot.players), vec![("Alice", 0), ("Bob", 0)]);
    drain(&mut alice);
    drain(&mut bob);

    handle.client_event("alice", ClientMsg::StartGame).await;
    handle.snapshot(&code).await;
    let msgs = drain(&mut bob);
    assert_eq!(msgs[0], ServerMsg::GameState(GameStatus::Playing));
    let updates = question_updates(&msgs);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].question.text, "Q0");
    assert_eq!(updates[0].current_player.name, "Alice");
    assert_eq!(updates[0].time_left, 10);

    // Bob cannot answer for Alice.
    handle.client_event("bob", ClientMsg::Answer(1)).await;
    let snapshot = handle.snapshot(&code).await.unwrap();
    assert_eq!(snapshot.current_question, Some(0));
    assert_eq!(scores(&snapshot.players), vec![("Alice", 0), ("Bob", 0)]);

    handle.client_event("alice", ClientMsg::Answer(1)).await;
    let snapshot = handle.snapshot(&code).await.unwrap();
    assert_eq!(scores(&snapshot.players), vec![("Alice", 1), ("Bob", 0)]);
    assert_eq!(snapshot.players[snapshot.current_player].name, "Bob");
    assert_eq!(snapshot.current_question, Some(1));
    drain(&mut alice);

    // Bob lets the clock run out.
    tokio::time::sleep(Duration::from_secs(11)).await;
    let snapshot = handle.snapshot(&code).await.unwrap();
    assert_eq!(snapshot.current_question, Some(2));
    assert_eq!(snapshot.players[snapshot.current_player].name, "Alice");
    assert_eq!(scores(&snapshot.players), vec![("Alice", 1), ("Bob", 0)]);

    let msgs = drain(&mut alice);
    let updates = question_updates(&msgs);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].question.text, "Q2");

    handle.client_event("alice", ClientMsg::Answer(0)).await;
    assert!(handle.snapshot(&code).await.is_none());

    let msgs = drain(&mut bob);
    assert_eq!(
        msgs.iter()
            .filter(|m| **m == ServerMsg::GameState(GameStatus::Finished))
            .count(),
        1
    );
    match msgs.iter().rev().find(|m| matches!(m, ServerMsg::PlayerList(_))) {
        Some(ServerMsg::PlayerList(list)) => assert_eq!(scores(list), vec![("Alice", 2), ("Bob", 0)]),
        other => panic!("expected final roster, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unanswered_turns_cycle_until_game_ends() {
    let (handle, hub) = setup(vec![question("Q0", 0), question("Q1", 0)]);
    let mut alice = hub.register("alice");
    let mut bob = hub.register("bob");

    let code = lobby(&handle, &mut alice).await;
    handle.client_event("bob", ClientMsg::StartGame).await;
    handle.snapshot(&code).await;
    drain(&mut bob);

    tokio::time::sleep(Duration::from_secs(11)).await;
    let snapshot = handle.snapshot(&code).await.unwrap();
    assert_eq!(snapshot.current_question, Some(1));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(handle.snapshot(&code).await.is_none());

    let msgs = drain(&mut bob);
    assert_eq!(msgs.last(), Some(&ServerMsg::GameState(GameStatus::Finished)));
    assert!(msgs.iter().all(|m| !matches!(m, ServerMsg::PlayerList(_))));
}

#[tokio::test(start_paused = true)]
async fn current_player_disconnect_moves_turn_without_waiting() {
    let (handle, hub) = setup(vec![question("Q0", 0), question("Q1", 0), question("Q2", 0)]);
    let mut alice = hub.register("alice");
    let mut bob = hub.register("bob");

    let code = lobby(&handle, &mut alice).await;
    handle.client_event("alice", ClientMsg::StartGame).await;
    handle.snapshot(&code).await;
    drain(&mut bob);

    tokio::time::sleep(Duration::from_secs(6)).await;
    hub.unregister("alice");
    handle.disconnect("alice").await;

    let snapshot = handle.snapshot(&code).await.unwrap();
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.players[snapshot.current_player].name, "Bob");
    assert_eq!(snapshot.current_question, Some(1));

    let msgs = drain(&mut bob);
    assert_eq!(msgs[0], ServerMsg::PlayerList(vec![Player::new("bob", "Bob")]));
    assert_eq!(question_updates(&msgs)[0].current_player.name, "Bob");

    // Alice's timer would have fired at the 10 second mark.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = handle.snapshot(&code).await.unwrap();
    assert_eq!(snapshot.current_question, Some(1));

    handle.disconnect("bob").await;
    assert!(handle.snapshot(&code).await.is_none());
    assert_eq!(hub.room_size(&code), 0);
}
