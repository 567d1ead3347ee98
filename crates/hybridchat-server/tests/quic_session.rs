//! End-to-end tests over a real QUIC connection
//!
//! Binds the server on a loopback port with a self-signed certificate and
//! talks to it through the client transport.

use std::{net::SocketAddr, time::Duration};

use hybridchat_client::{
    ChatMessage, Client, ClientAction, ClientConfig, MessageBody,
    transport::{self, run_session},
};
use hybridchat_crypto::KeyPair;
use hybridchat_proto::{Content, Message, ProjectedContent, Request, Response};
use hybridchat_server::{Server, ServerRuntimeConfig, SystemEnv};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio::{sync::mpsc, time::timeout};

const WAIT: Duration = Duration::from_secs(20);

fn start_server() -> SocketAddr {
    let config =
        ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), ..Default::default() };
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

fn key_pair(seed: u64) -> KeyPair {
    KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed)).unwrap()
}

async fn next_matching<T>(
    rx: &mut mpsc::Receiver<ClientAction>,
    mut pick: impl FnMut(ClientAction) -> Option<T>,
) -> T {
    timeout(WAIT, async {
        loop {
            let action = rx.recv().await.expect("session ended");
            if let Some(found) = pick(action) {
                return found;
            }
        }
    })
    .await
    .expect("timed out waiting for action")
}

#[tokio::test(flavor = "multi_thread")]
async fn join_send_and_poll_over_quic() {
    let addr = start_server();
    let connection = transport::connect(&addr.to_string()).await.unwrap();

    let alice = key_pair(1);
    let joined = connection
        .request(&Request::Join {
            username: "alice".to_string(),
            public_key: alice.export_public().into_string(),
        })
        .await
        .unwrap();
    assert!(matches!(
        joined,
        Response::Joined { ref users, ref public_keys, cursor: 0 }
            if users == &["alice"] && public_keys.is_empty()
    ));

    let message = Message {
        id: "m1".to_string(),
        sender: "alice".to_string(),
        content: Content::Plaintext("hello".to_string()),
        timestamp: 1,
    };
    let sent = connection.request(&Request::Message(message)).await.unwrap();
    let Response::Sent { id, timestamp } = sent else {
        panic!("expected sent, got {sent:?}");
    };
    assert_eq!(id, "m1");

    let polled = connection
        .request(&Request::Poll { since: 0, username: "alice".to_string() })
        .await
        .unwrap();
    let Response::Messages { messages, users, .. } = polled else {
        panic!("expected messages, got {polled:?}");
    };
    assert_eq!(users, vec!["alice".to_string()]);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].timestamp, timestamp);
    assert_eq!(messages[0].content, ProjectedContent::Plaintext("hello".to_string()));

    connection.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_join_is_answered_with_error() {
    let addr = start_server();
    let connection = transport::connect(&addr.to_string()).await.unwrap();

    let response = connection
        .request(&Request::Join { username: "   ".to_string(), public_key: "key".to_string() })
        .await
        .unwrap();

    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn sessions_exchange_encrypted_hello() {
    let addr = start_server().to_string();
    let config = ClientConfig { poll_interval: Duration::from_millis(100), ..Default::default() };

    let alice = Client::new(SystemEnv::new(), "alice", key_pair(1), config.clone());
    let bob = Client::new(SystemEnv::new(), "bob", key_pair(2), config);

    let (alice_in, alice_in_rx) = mpsc::channel(8);
    let (alice_out_tx, mut alice_out) = mpsc::channel(64);
    let (bob_in, bob_in_rx) = mpsc::channel::<String>(8);
    let (bob_out_tx, mut bob_out) = mpsc::channel(64);

    let alice_addr = addr.clone();
    let alice_task = tokio::spawn(async move {
        run_session(&alice_addr, alice, alice_in_rx, alice_out_tx).await
    });
    let bob_task =
        tokio::spawn(async move { run_session(&addr, bob, bob_in_rx, bob_out_tx).await });

    // Alice only encrypts for bob once a poll has told her about him
    next_matching(&mut alice_out, |action| match action {
        ClientAction::UsersChanged { users } if users.len() == 2 => Some(()),
        _ => None,
    })
    .await;

    alice_in.send("hello".to_string()).await.unwrap();

    let received: ChatMessage = next_matching(&mut bob_out, |action| match action {
        ClientAction::DeliverMessage(message) if message.sender == "alice" => Some(message),
        _ => None,
    })
    .await;

    assert_eq!(received.body, MessageBody::Text("hello".to_string()));
    assert!(received.encrypted);

    drop(alice_in);
    drop(bob_in);
    let alice = alice_task.await.unwrap().unwrap();
    let bob = bob_task.await.unwrap().unwrap();
    assert!(alice.is_joined());
    assert!(bob.cursor() >= received.timestamp);
}
