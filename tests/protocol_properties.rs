//! End-to-end protocol behaviour against a live daemon.

mod integration;

use checksums::sha256_hex;
use integration::helpers::*;
use protocol::{acceptance_signature, encode_filename, login_signature, verify_acceptance};

#[tokio::test]
async fn greeting_and_quit() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    assert_eq!(client.call("quit").await, "221 bye");
    assert_eq!(client.recv().await, "");
}

#[tokio::test]
async fn wrong_password_is_refused_with_the_generic_text() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    let salt = client.challenge("alice").await;
    let reply = client
        .call(&format!("pass {}", login_signature(b"not the key", &salt)))
        .await;
    assert_eq!(reply, "401 invalid username or password");
}

#[tokio::test]
async fn unknown_user_gets_the_same_refusal() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    let salt = client.challenge("mallory").await;
    let reply = client.call(&format!("pass {}", login_signature(KEY, &salt))).await;
    assert_eq!(reply, "401 invalid username or password");
}

#[tokio::test]
async fn replayed_login_response_is_refused() {
    let server = TestServer::spawn().await;

    let mut first = RawClient::connect(server.addr()).await;
    let salt = first.challenge("alice").await;
    let response = login_signature(KEY, &salt);
    assert_eq!(first.call(&format!("pass {response}")).await, "250 OK");

    let mut second = RawClient::connect(server.addr()).await;
    let fresh = second.challenge("alice").await;
    assert_ne!(fresh, salt);
    assert_eq!(
        second.call(&format!("pass {response}")).await,
        "401 invalid username or password"
    );
}

#[tokio::test]
async fn commands_before_login_are_refused() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    assert_eq!(client.call("put notes.txt").await, "500 not authenticated");
    assert_eq!(client.call("get notes.txt").await, "500 not authenticated");
}

#[tokio::test]
async fn get_is_not_implemented() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;
    assert_eq!(client.call("get notes.txt").await, "500 not implemented");
}

#[tokio::test]
async fn declared_upload_is_stored_and_acknowledged() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;

    let payload = b"quarterly numbers\n";
    let salt = client.put("report.txt").await;
    assert_eq!(
        client.call(&data_line(&salt, "report.txt", payload)).await,
        format!("253 send {} bytes now", payload.len())
    );
    client.send_bytes(payload).await;

    let reply = client.recv().await;
    assert!(reply.starts_with("255 accepted "), "{reply}");
    let hash = sha256_hex(payload);
    assert!(verify_acceptance(KEY, CLIENT_SALT, hash.as_str(), signature_of(&reply)));

    let current = server.current("alice", "report.txt").unwrap();
    assert_eq!(current.digest(), &hash);
    assert_eq!(std::fs::read(current.version_path()).unwrap(), payload);
    assert_eq!(server.pending(), 0);
}

#[tokio::test]
async fn identical_reupload_is_deduplicated_without_payload() {
    let server = TestServer::spawn().await;
    let payload = b"same bytes every time";

    for _ in 0..2 {
        let mut client = RawClient::connect(server.addr()).await;
        client.login("bob").await;
        let salt = client.put("report.txt").await;
        let reply = client.call(&data_line(&salt, "report.txt", payload)).await;
        if reply.starts_with("253 ") {
            client.send_bytes(payload).await;
            assert!(client.recv().await.starts_with("255 accepted "));
        } else {
            let expected = acceptance_signature(KEY, CLIENT_SALT, sha256_hex(payload).as_str());
            assert_eq!(reply, format!("255 accepted {expected}"));
        }
    }

    let repository = server.storage().repository("bob", false);
    assert_eq!(repository.versions("report.txt").unwrap().len(), 1);
}

#[tokio::test]
async fn versioned_upload_moves_current_and_keeps_history() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;

    for payload in [&b"first draft"[..], &b"second draft"[..]] {
        let salt = client.put("draft.txt").await;
        assert!(client
            .call(&data_line(&salt, "draft.txt", payload))
            .await
            .starts_with("253 "));
        client.send_bytes(payload).await;
        assert!(client.recv().await.starts_with("255 accepted "));
    }

    let current = server.current("alice", "draft.txt").unwrap();
    assert_eq!(std::fs::read(current.version_path()).unwrap(), b"second draft");

    let versions = server.storage().repository("alice", true).versions("draft.txt").unwrap();
    assert_eq!(versions.len(), 2);
    let contents: Vec<Vec<u8>> = versions.iter().map(|path| std::fs::read(path).unwrap()).collect();
    assert!(contents.contains(&b"first draft".to_vec()));
}

#[tokio::test]
async fn non_versioned_slot_refuses_different_content() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("bob").await;

    let salt = client.put("fixed.txt").await;
    client.call(&data_line(&salt, "fixed.txt", b"original")).await;
    client.send_bytes(b"original").await;
    assert!(client.recv().await.starts_with("255 accepted "));

    let salt = client.put("fixed.txt").await;
    assert_eq!(
        client.call(&data_line(&salt, "fixed.txt", b"replacement")).await,
        "500 file already exists"
    );

    let current = server.current("bob", "fixed.txt").unwrap();
    assert_eq!(std::fs::read(current.version_path()).unwrap(), b"original");
    // The refused transaction is gone, so a new PUT is accepted.
    client.put("other.txt").await;
}

#[tokio::test]
async fn tampered_payload_is_rejected_and_cleaned_up() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;

    let payload = b"the real payload";
    let salt = client.put("tampered.txt").await;
    assert!(client
        .call(&data_line(&salt, "tampered.txt", payload))
        .await
        .starts_with("253 "));
    let mut sent = payload.to_vec();
    sent[3] ^= 0x01;
    client.send_bytes(&sent).await;

    assert_eq!(
        client.recv().await,
        "500 file hash does not match hash supplied by client"
    );
    assert!(server.current("alice", "tampered.txt").is_none());
    assert_eq!(server.pending(), 0);
}

#[tokio::test]
async fn altered_data_signature_is_rejected() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;

    let salt = client.put("signed.txt").await;
    let line = data_line(&salt, "signed.txt", b"payload");
    let forged = replace_signature(&line, &flip_hex_char(signature_of(&line), 0));
    assert_eq!(client.call(&forged).await, "500 invalid signature");

    // The transaction survives a bad DATA signature.
    assert!(client.call(&line).await.starts_with("253 "));
}

#[tokio::test]
async fn signature_from_another_transaction_is_rejected() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;

    let stale_salt = client.put("signed.txt").await;
    let stale = data_line(&stale_salt, "signed.txt", b"payload");
    client.send(&stale).await;
    assert!(client.recv().await.starts_with("253 "));
    client.send_bytes(b"payload").await;
    assert!(client.recv().await.starts_with("255 "));

    client.put("signed.txt").await;
    assert_eq!(client.call(&stale).await, "500 invalid signature");
}

#[tokio::test]
async fn deferred_upload_is_confirmed() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;

    let payload = b"streamed from stdin";
    let wire = encode_filename("stdin capture.log").unwrap();
    let salt = client.put(&wire).await;
    assert!(client
        .call(&deferred_data_line(&salt, &wire, payload.len() as u64))
        .await
        .starts_with("253 "));
    client.send_bytes(payload).await;
    assert_eq!(client.recv().await, "254 send hash confirmation");

    let reply = client.call(&confirm_line(&salt, &wire, payload)).await;
    let expected = acceptance_signature(KEY, CLIENT_SALT, sha256_hex(payload).as_str());
    assert_eq!(reply, format!("255 accepted {expected}"));
    assert!(server.current("alice", &wire).is_some());
}

#[tokio::test]
async fn altered_confirm_signature_discards_the_upload() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;

    let payload = b"awaiting confirmation";
    let salt = client.put("pending.txt").await;
    client
        .call(&deferred_data_line(&salt, "pending.txt", payload.len() as u64))
        .await;
    client.send_bytes(payload).await;
    assert_eq!(client.recv().await, "254 send hash confirmation");

    let line = confirm_line(&salt, "pending.txt", payload);
    let forged = replace_signature(&line, &flip_hex_char(signature_of(&line), 10));
    assert_eq!(client.call(&forged).await, "500 invalid signature");
    assert_eq!(client.call(&line).await, "500 no need to send CONFIRM");

    assert!(server.current("alice", "pending.txt").is_none());
    assert_eq!(server.pending(), 0);
}

#[tokio::test]
async fn abrupt_disconnect_leaves_no_temporary_file() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    client.login("alice").await;

    let payload = vec![b'z'; 64 * 1024];
    let salt = client.put("partial.bin").await;
    assert!(client
        .call(&data_line(&salt, "partial.bin", &payload))
        .await
        .starts_with("253 "));
    client.send_bytes(&payload[..1000]).await;
    drop(client);

    server.wait_for_no_pending().await;
    assert!(server.current("alice", "partial.bin").is_none());
}

#[tokio::test]
async fn overlong_line_closes_the_connection() {
    let server = TestServer::spawn().await;
    let mut client = RawClient::connect(server.addr()).await;
    let line = format!("user {}", "a".repeat(5000));
    assert_eq!(client.call(&line).await, "500 line too long");
}

#[tokio::test]
async fn report_is_deduplicated_across_connections() {
    let server = TestServer::spawn().await;
    let payload = b"Q3 revenue: up\n";
    let hash = sha256_hex(payload);

    let mut first = RawClient::connect(server.addr()).await;
    first.login("alice").await;
    let salt = first.put("report.txt").await;
    first.call(&data_line(&salt, "report.txt", payload)).await;
    first.send_bytes(payload).await;
    assert!(first.recv().await.starts_with("255 accepted "));
    assert_eq!(first.call("quit").await, "221 bye");

    let mut second = RawClient::connect(server.addr()).await;
    second.login("alice").await;
    let salt = second.put("report.txt").await;
    let reply = second.call(&data_line(&salt, "report.txt", payload)).await;
    assert!(reply.starts_with("255 accepted "), "{reply}");
    assert!(verify_acceptance(KEY, CLIENT_SALT, hash.as_str(), signature_of(&reply)));

    let versions = server.storage().repository("alice", true).versions("report.txt").unwrap();
    assert_eq!(versions.len(), 1);
}
