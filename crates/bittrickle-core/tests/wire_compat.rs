//! Integration tests pinning the literal datagram text.
//!
//! Existing BitTrickle clients and servers match on these exact strings, so
//! each test spells the bytes out instead of deriving them from constants.

use std::net::{IpAddr, Ipv4Addr};

use bittrickle_core::{
    decode_request, decode_response, encode_request, encode_response, Request, RequestKind,
    Response,
};

#[test]
fn test_auth_request_text() {
    let bytes = encode_request(&Request::Auth {
        identity: "alice".into(),
        secret: "pw1".into(),
        transfer_port: 50123,
    })
    .unwrap();

    assert_eq!(bytes, b"AUTH alice pw1 50123");
}

#[test]
fn test_session_commands_use_lowercase_keywords() {
    assert_eq!(encode_request(&Request::ListActivePeers).unwrap(), b"lap");
    assert_eq!(encode_request(&Request::ListPublished).unwrap(), b"lpf");
    assert_eq!(encode_request(&Request::Search("rep".into())).unwrap(), b"sch rep");
    assert_eq!(encode_request(&Request::Get("a.txt".into())).unwrap(), b"get a.txt");
    assert_eq!(encode_request(&Request::Unpublish("a.txt".into())).unwrap(), b"unp a.txt");
    assert_eq!(encode_request(&Request::Heartbeat).unwrap(), b"HEARTBEAT");
}

#[test]
fn test_auth_outcome_texts() {
    assert_eq!(encode_response(&Response::AuthSuccess), b"AUTH_SUCCESS");
    assert_eq!(encode_response(&Response::AuthFailure), b"AUTH_FAILURE");
    assert_eq!(encode_response(&Response::UserAlreadyActive), b"USER_ALREADY_ACTIVE");
}

#[test]
fn test_active_peers_texts() {
    assert_eq!(encode_response(&Response::ActivePeers(vec![])), b"No active peers");
    assert_eq!(
        encode_response(&Response::ActivePeers(vec!["bob".into(), "carol".into()])),
        b"Active peers: bob, carol"
    );
}

#[test]
fn test_publish_family_texts() {
    assert_eq!(encode_response(&Response::PublishedFiles(vec![])), b"No files published");
    assert_eq!(
        encode_response(&Response::PublishedFiles(vec!["a.txt".into(), "b.txt".into()])),
        b"Published files: a.txt, b.txt"
    );
    assert_eq!(encode_response(&Response::Published("a.txt".into())), b"Published file: a.txt");
    assert_eq!(
        encode_response(&Response::AlreadyPublished("a.txt".into())),
        b"Already published file: a.txt"
    );
    assert_eq!(
        encode_response(&Response::Unpublished("a.txt".into())),
        b"Unpublished file: a.txt"
    );
    assert_eq!(
        encode_response(&Response::NotPublished("a.txt".into())),
        b"User has not published file: a.txt"
    );
}

#[test]
fn test_search_and_get_texts() {
    assert_eq!(encode_response(&Response::SearchResults(vec![])), b"");
    assert_eq!(
        encode_response(&Response::SearchResults(vec!["x.iso".into(), "y.iso".into()])),
        b"x.iso | y.iso"
    );
    assert_eq!(
        encode_response(&Response::PeerEndpoint {
            ip: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 50123
        }),
        b"127.0.0.1 50123"
    );
    assert_eq!(encode_response(&Response::FileNotFound), b"File not found");
}

#[test]
fn test_hand_typed_request_with_trailing_newline_decodes() {
    // As sent by `nc -u` from a terminal.
    assert_eq!(
        decode_request(b"pub notes.txt\n").unwrap(),
        Request::Publish("notes.txt".into())
    );
}

#[test]
fn test_client_reads_server_texts_back() {
    assert_eq!(
        decode_response(RequestKind::Search, b"x.iso | y.iso").unwrap(),
        Response::SearchResults(vec!["x.iso".into(), "y.iso".into()])
    );
    assert_eq!(
        decode_response(RequestKind::Get, b"10.0.0.7 4242").unwrap(),
        Response::PeerEndpoint {
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
            port: 4242
        }
    );
    assert_eq!(
        decode_response(RequestKind::Get, b"File not found").unwrap(),
        Response::FileNotFound
    );
}
