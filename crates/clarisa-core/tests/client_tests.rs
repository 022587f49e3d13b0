//! Tests for the Clarisa HTTP client against an in-process stand-in server.

use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{TimeZone, Utc};
use clarisa_core::{ClarisaClient, ClarisaCredentials, ClarisaError, ClarisaSource, Watermark};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// "replicator:secret" in base64.
const EXPECTED_AUTH: &str = "Basic cmVwbGljYXRvcjpzZWNyZXQ=";

const INSTITUTIONS_JSON: &str = r#"[
  {
    "code": 4356,
    "name": "Consiglio Nazionale delle Ricerche (Cnr)",
    "acronym": "CNR",
    "websiteLink": "https://www.cnr.it/it",
    "added": "2020-10-08T20:05:59.000Z",
    "is_active": 1,
    "countryOfficeDTO": [
      { "code": 108, "isHeadquarter": 1, "isoAlpha2": "IT", "name": "Italy" }
    ],
    "institutionType": { "code": 60, "name": "Research Institute" }
  }
]"#;

#[derive(Clone)]
struct FakeClarisa {
    body: &'static str,
    status: StatusCode,
    queries: Arc<Mutex<Vec<String>>>,
}

async fn institutions(
    State(fake): State<FakeClarisa>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    fake.queries
        .lock()
        .unwrap()
        .push(query.unwrap_or_default());

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(EXPECTED_AUTH);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    (fake.status, [(header::CONTENT_TYPE, "application/json")], fake.body).into_response()
}

/// Serve a fake Clarisa API on an ephemeral port and return its host URL.
async fn spawn_fake(fake: FakeClarisa) -> String {
    let app = Router::new()
        .route("/api/institutions", get(institutions))
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/", addr)
}

fn fake(body: &'static str, status: StatusCode) -> FakeClarisa {
    FakeClarisa {
        body,
        status,
        queries: Arc::new(Mutex::new(Vec::new())),
    }
}

fn credentials(password: &str) -> ClarisaCredentials {
    ClarisaCredentials {
        username: "replicator".to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_full_fetch_decodes_institutions() {
    let server = fake(INSTITUTIONS_JSON, StatusCode::OK);
    let queries = server.queries.clone();
    let host = spawn_fake(server).await;

    let client = ClarisaClient::new(&host, credentials("secret")).unwrap();
    let institutions = client.fetch_institutions(None).await.unwrap();

    assert_eq!(institutions.len(), 1);
    let cnr = &institutions[0];
    assert_eq!(cnr.code, 4356);
    assert_eq!(cnr.acronym.as_deref(), Some("CNR"));
    assert_eq!(cnr.institution_type.code, 60);
    assert_eq!(cnr.country_offices[0].iso_alpha2.as_deref(), Some("IT"));
    assert!(cnr.country_offices[0].is_headquarter);

    assert_eq!(queries.lock().unwrap().as_slice(), ["show=all"]);
}

#[tokio::test]
async fn test_incremental_fetch_sends_watermark_millis() {
    let server = fake("[]", StatusCode::OK);
    let queries = server.queries.clone();
    let host = spawn_fake(server).await;

    let client = ClarisaClient::new(&host, credentials("secret")).unwrap();
    let mark = Watermark(Utc.with_ymd_and_hms(2024, 3, 18, 16, 2, 55).unwrap());
    let institutions = client.fetch_institutions(Some(mark)).await.unwrap();

    assert!(institutions.is_empty());
    assert_eq!(
        queries.lock().unwrap().as_slice(),
        ["show=all&from=1710777775000"]
    );
}

#[tokio::test]
async fn test_wrong_credentials_are_remote_unavailable() {
    let host = spawn_fake(fake(INSTITUTIONS_JSON, StatusCode::OK)).await;

    let client = ClarisaClient::new(&host, credentials("wrong")).unwrap();
    let err = client.fetch_institutions(None).await.unwrap_err();

    match err {
        ClarisaError::RemoteUnavailable { status, .. } => assert_eq!(status, Some(401)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_remote_unavailable() {
    let host = spawn_fake(fake("{}", StatusCode::INTERNAL_SERVER_ERROR)).await;

    let client = ClarisaClient::new(&host, credentials("secret")).unwrap();
    let err = client.fetch_institutions(None).await.unwrap_err();

    assert!(err.is_remote());
    assert!(matches!(
        err,
        ClarisaError::RemoteUnavailable {
            status: Some(500),
            ..
        }
    ));
}

#[tokio::test]
async fn test_malformed_body_is_schema_mismatch() {
    let host = spawn_fake(fake(r#"{"not": "an array"}"#, StatusCode::OK)).await;

    let client = ClarisaClient::new(&host, credentials("secret")).unwrap();
    let err = client.fetch_institutions(None).await.unwrap_err();

    assert!(matches!(err, ClarisaError::SchemaMismatch { .. }));
}

#[tokio::test]
async fn test_unreachable_host_is_remote_unavailable() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ClarisaClient::new(&format!("http://{}/", addr), credentials("secret")).unwrap();
    let err = client.fetch_institutions(None).await.unwrap_err();

    assert!(matches!(
        err,
        ClarisaError::RemoteUnavailable { status: None, .. }
    ));
}
