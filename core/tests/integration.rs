//! End-to-end tests against the live mock service.
//!
//! # Design
//! Each test starts the mock on a random port with its own state, then drives
//! the client over real HTTP. The async tests go through `ReqwestTransport`;
//! `host_does_io_with_ureq` shows a host that builds requests, executes them
//! with its own blocking stack and hands the responses back to `classify`.

use cityworks_core::{
    build_request, Attachment, AuthState, CallerError, CityworksClient, ClientError, ClientOptions,
    DomainFailure, Dispatcher, HttpResponse, Payload, Session, TransportFailure, WireRequest,
};
use mock_server::{seeded_state, Db, SEED_CASE_ID, SEED_GIS_TOKEN, SEED_LOGIN, SEED_PASSWORD};
use serde_json::{json, Value};

fn options() -> ClientOptions {
    ClientOptions {
        secure: false,
        ..ClientOptions::default()
    }
}

async fn start() -> (String, Db) {
    let db = seeded_state();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    tokio::spawn(mock_server::run_with_state(listener, db.clone()));
    (host, db)
}

fn client(host: &str) -> CityworksClient {
    CityworksClient::new(host, options()).unwrap()
}

async fn calls_to(db: &Db, path: &str) -> Vec<mock_server::RecordedCall> {
    db.read()
        .await
        .calls
        .iter()
        .filter(|call| call.path == path)
        .cloned()
        .collect()
}

// --- session lifecycle ---

#[tokio::test]
async fn password_login_then_profile() {
    let (host, db) = start().await;
    let client = client(&host);

    let token = client.authenticate(SEED_LOGIN, SEED_PASSWORD).await.unwrap();
    assert!(!token.is_empty());
    assert_eq!(client.auth_state(), AuthState::Authenticated);
    assert_eq!(client.get_token().as_deref(), Some(token.as_str()));

    let user = client.user().await.unwrap();
    assert_eq!(user["LoginName"], SEED_LOGIN);

    let login_calls = calls_to(&db, "General/Authentication/Authenticate").await;
    assert_eq!(login_calls.len(), 1);
    assert!(login_calls[0].token.is_none());
    let profile_calls = calls_to(&db, "General/Authentication/User").await;
    assert_eq!(profile_calls[0].token.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn wrong_password_keeps_session_unauthenticated() {
    let (host, _db) = start().await;
    let client = client(&host);

    let err = client.authenticate(SEED_LOGIN, "wrong").await.unwrap_err();
    match &err {
        ClientError::Domain { kind, status, .. } => {
            assert_eq!(*kind, DomainFailure::InvalidCredentials);
            assert_eq!(*status, 1);
        }
        other => panic!("expected a domain failure, got {other:?}"),
    }
    let context = err.context().unwrap();
    assert_eq!(context.payload["LoginName"], SEED_LOGIN);
    assert_ne!(context.payload["Password"], "wrong");
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);
    assert!(client.get_token().is_none());
}

#[tokio::test]
async fn external_token_login() {
    let (host, _db) = start().await;
    let client = client(&host);

    let refused = client
        .authenticate_with_gis_token(SEED_LOGIN, "stale", "https://gis.example/token", Some(60))
        .await
        .unwrap();
    assert!(!refused);
    assert!(client.get_token().is_none());

    let accepted = client
        .authenticate_with_gis_token(SEED_LOGIN, SEED_GIS_TOKEN, "https://gis.example/token", Some(60))
        .await
        .unwrap();
    assert!(accepted);
    assert_eq!(client.auth_state(), AuthState::Authenticated);
    assert_eq!(
        client.session().federated_credential().unwrap().ttl_hint,
        Some(60)
    );
}

#[tokio::test]
async fn validate_and_adopt_token_from_another_client() {
    let (host, _db) = start().await;
    let first = client(&host);
    let token = first.authenticate(SEED_LOGIN, SEED_PASSWORD).await.unwrap();

    let second = client(&host);
    let info = second.validate_token(&token, true).await.unwrap().unwrap();
    assert_eq!(info["LoginName"], SEED_LOGIN);
    assert_eq!(second.get_token().as_deref(), Some(token.as_str()));
    assert_eq!(second.user().await.unwrap()["LoginName"], SEED_LOGIN);

    assert!(second.validate_token("bogus", true).await.unwrap().is_none());
    assert!(second.get_token().is_none());
}

#[tokio::test]
async fn revoke_leaves_local_token_in_place() {
    let (host, db) = start().await;
    let client = client(&host);
    let token = client.authenticate(SEED_LOGIN, SEED_PASSWORD).await.unwrap();

    assert!(client.revoke_token(None).await.unwrap());
    assert_eq!(client.get_token().as_deref(), Some(token.as_str()));

    let err = client.user().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Domain {
            kind: DomainFailure::Unauthorized,
            ..
        }
    ));
    // The failure does not clear the session either.
    assert_eq!(client.get_token().as_deref(), Some(token.as_str()));
    let profile_calls = calls_to(&db, "General/Authentication/User").await;
    assert_eq!(profile_calls[0].token.as_deref(), Some(token.as_str()));
}

// --- classification over HTTP ---

#[tokio::test]
async fn unusable_responses_are_transport_failures() {
    let (host, _db) = start().await;
    let client = client(&host);
    let token = client.authenticate(SEED_LOGIN, SEED_PASSWORD).await.unwrap();

    let cases = [
        ("Ams/Unknown/Thing", "non-JSON"),
        ("Test/Malformed", "malformed"),
        ("Test/Empty", "empty"),
    ];
    for (path, label) in cases {
        let err = client.dispatch(path, Payload::new()).await.unwrap_err();
        let kind = match &err {
            ClientError::Transport { kind, .. } => kind.clone(),
            other => panic!("{label}: expected a transport failure, got {other:?}"),
        };
        match label {
            "non-JSON" => assert_eq!(kind, TransportFailure::NonJsonResponse),
            "malformed" => assert!(matches!(kind, TransportFailure::MalformedPayload(_))),
            _ => assert_eq!(kind, TransportFailure::EmptyResponse),
        }
        assert_eq!(err.context().unwrap().path, path, "{label}");
        assert!(err.context().unwrap().raw_response.is_some(), "{label}");
        assert_eq!(client.get_token().as_deref(), Some(token.as_str()), "{label}");
    }
}

#[tokio::test]
async fn unreachable_host_is_a_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = client(&host);
    client.set_token("kept");
    let err = client.user().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport {
            kind: TransportFailure::Network(_),
            ..
        }
    ));
    assert_eq!(client.get_token().as_deref(), Some("kept"));
}

// --- details ---

#[tokio::test]
async fn set_detail_values_by_reference() {
    let (host, db) = start().await;
    let client = client(&host);
    client.authenticate(SEED_LOGIN, SEED_PASSWORD).await.unwrap();
    let details = client.details();

    let units = details
        .set_value_by_reference(SEED_CASE_ID, "PERMIT.UNITS", 12)
        .await
        .unwrap();
    assert_eq!(units.current_value(), Some(&json!(12)));

    let approved = details
        .set_value_by_reference(SEED_CASE_ID, "PERMIT.APPROVED", "Yes")
        .await
        .unwrap();
    assert_eq!(approved.current_value(), Some(&json!("Y")));

    let notes = details
        .set_value_by_reference(SEED_CASE_ID, "NOTES", "looks good")
        .await
        .unwrap();
    assert_eq!(notes.current_value(), Some(&json!("looks good")));

    let updates = calls_to(&db, "Pll/CaseDataDetail/Update").await;
    assert_eq!(updates.len(), 3);
    assert_eq!(
        updates[0].data,
        json!({"CaObjectId": SEED_CASE_ID, "CaDataDetailId": 1, "NumberValue": 12})
    );
}

#[tokio::test]
async fn failing_batch_writes_nothing() {
    let (host, db) = start().await;
    let client = client(&host);
    client.authenticate(SEED_LOGIN, SEED_PASSWORD).await.unwrap();

    let items: Vec<(&str, Value)> = vec![
        ("PERMIT.UNITS", json!(3)),
        ("PERMIT.BROKEN", json!("x")),
    ];
    let err = client
        .details()
        .set_many_by_reference(SEED_CASE_ID, &items)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Caller(CallerError::UntypedDetail { .. })
    ));

    let items: Vec<(&str, Value)> = vec![("PERMIT.UNITS", json!(3)), ("PERMIT.MISSING", json!(1))];
    let err = client
        .details()
        .set_many_by_reference(SEED_CASE_ID, &items)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Caller(CallerError::NotFound(_))));

    assert!(calls_to(&db, "Pll/CaseDataDetail/Update").await.is_empty());
    let state = db.read().await;
    assert!(state.details[&SEED_CASE_ID][0]["NumberValue"].is_null());
}

#[tokio::test]
async fn batch_writes_in_order() {
    let (host, _db) = start().await;
    let client = client(&host);
    client.authenticate(SEED_LOGIN, SEED_PASSWORD).await.unwrap();

    let items = vec![
        ("PERMIT.UNITS".to_string(), json!(7)),
        ("PERMIT.APPROVED".to_string(), json!("No")),
    ];
    let updated = client
        .details()
        .set_many_by_reference(SEED_CASE_ID, &items)
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert_eq!(updated[0].reference(), "PERMIT.UNITS");
    assert_eq!(updated[1].current_value(), Some(&json!("N")));
}

// --- attachments ---

#[tokio::test]
async fn upload_sends_file_with_token() {
    let (host, db) = start().await;
    let client = client(&host);
    let token = client.authenticate(SEED_LOGIN, SEED_PASSWORD).await.unwrap();

    let attachment = Attachment::new("site.pdf", b"%PDF-1".to_vec()).with_content_type("application/pdf");
    let envelope = client
        .dispatch_with_attachment(
            "Pll/CaseRelDocs/Add",
            Payload::new().with("CaObjectId", SEED_CASE_ID),
            attachment,
        )
        .await
        .unwrap()
        .ensure_status(DomainFailure::Rejected)
        .unwrap();
    assert_eq!(envelope.value["FileName"], "site.pdf");
    assert_eq!(envelope.value["Size"], 6);

    let uploads = calls_to(&db, "Pll/CaseRelDocs/Add").await;
    assert_eq!(uploads[0].token.as_deref(), Some(token.as_str()));
    assert_eq!(uploads[0].data, json!({"CaObjectId": SEED_CASE_ID}));
}

#[tokio::test]
async fn attachment_on_plain_path_never_reaches_the_service() {
    let (host, db) = start().await;
    let client = client(&host);

    let err = client
        .dispatch_with_attachment(
            "General/Authentication/User",
            Payload::new(),
            Attachment::new("a.txt", b"a".to_vec()),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Caller(CallerError::AttachmentNotAccepted { .. })
    ));
    assert!(db.read().await.calls.is_empty());
}

// --- host-does-IO ---

/// Execute a form request with ureq, returning non-2xx statuses as data.
fn execute(req: cityworks_core::HttpRequest) -> HttpResponse {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let body = req.encoded_form().expect("form body");
    let mut response = agent
        .post(&req.url)
        .content_type("application/x-www-form-urlencoded")
        .send(body.as_bytes())
        .expect("HTTP transport error");

    HttpResponse {
        status: response.status().as_u16(),
        body: response.body_mut().read_to_string().unwrap_or_default(),
    }
}

#[test]
fn host_does_io_with_ureq() {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let host = std_listener.local_addr().unwrap().to_string();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
    });

    let session = Session::new(&host, options());

    let login = WireRequest::new(
        "General/Authentication/Authenticate",
        Payload::new()
            .with("LoginName", SEED_LOGIN)
            .with("Password", SEED_PASSWORD),
    );
    let http = build_request(&session, &login).unwrap();
    assert!(http.body.field("token").is_none());
    let envelope = Dispatcher::classify(&login, execute(http))
        .unwrap()
        .ensure_status(DomainFailure::InvalidCredentials)
        .unwrap();
    let token = envelope.value["Token"].as_str().unwrap().to_string();
    assert!(session.set_token(&token));

    let profile = WireRequest::new("General/Authentication/User", Payload::new());
    let http = build_request(&session, &profile).unwrap();
    assert_eq!(http.body.field("token"), Some(token.as_str()));
    let envelope = Dispatcher::classify(&profile, execute(http)).unwrap();
    assert_eq!(envelope.status, 0);
    assert_eq!(envelope.value["LoginName"], SEED_LOGIN);

    let bounced = WireRequest::new("Ams/Unknown/Thing", Payload::new());
    let http = build_request(&session, &bounced).unwrap();
    let err = Dispatcher::classify(&bounced, execute(http)).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport {
            kind: TransportFailure::NonJsonResponse,
            ..
        }
    ));
}
