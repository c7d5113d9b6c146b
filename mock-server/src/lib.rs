//! In-memory emulation of the Cityworks service endpoints the client core uses.
//!
//! Every call is `POST /{install}/services/{path}` with a form body carrying
//! `data` (JSON) and optionally `token`, or a multipart body with a `file`.
//! Responses are `{Status, Message, Value}` envelopes. Paths the emulator does
//! not know get the gateway's HTML redirect page, like a real install bounces
//! unknown or unauthenticated traffic.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const INSTALL_PATH: &str = "cityworks";

/// Page served when the gateway bounces a request to login.
pub const LOGIN_PAGE: &str = r#"<html><head><title>Object moved</title></head><body><h2>Object moved to <a href="/cityworks/login.aspx">here</a>.</h2>{"Status":0,"Value":true}</body></html>"#;

pub const SEED_LOGIN: &str = "user";
pub const SEED_PASSWORD: &str = "pass";
pub const SEED_GIS_TOKEN: &str = "valid-gis-token";
pub const SEED_CASE_ID: i64 = 42;

/// One request as the service saw it.
#[derive(Clone, Debug, Serialize)]
pub struct RecordedCall {
    pub path: String,
    pub data: Value,
    pub token: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct ServiceState {
    pub users: HashMap<String, String>,
    /// Issued token -> login.
    pub tokens: HashMap<String, String>,
    /// Case id -> detail records.
    pub details: HashMap<i64, Vec<Value>>,
    pub calls: Vec<RecordedCall>,
}

pub type Db = Arc<RwLock<ServiceState>>;

/// State with one user and one case carrying a few details.
pub fn seeded_state() -> Db {
    let mut state = ServiceState::default();
    state.users.insert(SEED_LOGIN.to_string(), SEED_PASSWORD.to_string());
    state.details.insert(
        SEED_CASE_ID,
        vec![
            json!({"CaDataDetailId": 1, "CaObjectId": SEED_CASE_ID, "GroupCode": "PERMIT", "DetailCode": "UNITS", "NumberFlag": true, "NumberValue": null}),
            json!({"CaDataDetailId": 2, "CaObjectId": SEED_CASE_ID, "GroupCode": "PERMIT", "DetailCode": "APPROVED", "YesNoFlag": true, "YesNoValue": "N"}),
            json!({"CaDataDetailId": 3, "CaObjectId": SEED_CASE_ID, "GroupCode": null, "DetailCode": "NOTES", "CommentFlag": true, "CommentValue": ""}),
            json!({"CaDataDetailId": 4, "CaObjectId": SEED_CASE_ID, "GroupCode": "PERMIT", "DetailCode": "BROKEN"}),
        ],
    );
    Arc::new(RwLock::new(state))
}

pub fn app() -> Router {
    app_with_state(seeded_state())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/{install}/services/{*path}", post(handle))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

#[derive(Default)]
struct ServiceForm {
    data: Option<String>,
    token: Option<String>,
    file_name: Option<String>,
    file_len: usize,
}

async fn read_form(request: Request) -> Result<ServiceForm, String> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(mut fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| e.to_string())?;
        return Ok(ServiceForm {
            data: fields.remove("data"),
            token: fields.remove("token"),
            ..Default::default()
        });
    }

    let mut multipart = Multipart::from_request(request, &()).await.map_err(|e| e.to_string())?;
    let mut form = ServiceForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.file_name = field.file_name().map(str::to_string);
                form.file_len = field.bytes().await.map_err(|e| e.to_string())?.len();
            }
            "data" => form.data = Some(field.text().await.map_err(|e| e.to_string())?),
            "token" => form.token = Some(field.text().await.map_err(|e| e.to_string())?),
            _ => {}
        }
    }
    Ok(form)
}

fn ok(value: Value) -> Response {
    Json(json!({"Status": 0, "Message": null, "Value": value})).into_response()
}

fn failure(status: i64, message: &str) -> Response {
    Json(json!({"Status": status, "Message": message, "Value": null})).into_response()
}

fn unauthorized() -> Response {
    failure(2, "Unauthorized")
}

async fn handle(
    State(db): State<Db>,
    Path((_install, path)): Path<(String, String)>,
    request: Request,
) -> Response {
    let form = match read_form(request).await {
        Ok(form) => form,
        Err(err) => return (StatusCode::BAD_REQUEST, err).into_response(),
    };
    let data: Value = match form.data.as_deref() {
        Some(raw) => match serde_json::from_str(raw) {
            Ok(data) => data,
            Err(_) => return failure(1, "data is not valid JSON"),
        },
        None => json!({}),
    };

    debug!(path, has_token = form.token.is_some(), "service call");
    let mut state = db.write().await;
    state.calls.push(RecordedCall {
        path: path.clone(),
        data: data.clone(),
        token: form.token.clone(),
        file_name: form.file_name.clone(),
    });

    let login = form
        .token
        .as_deref()
        .and_then(|token| state.tokens.get(token))
        .cloned();

    match path.as_str() {
        "General/Authentication/Authenticate" => {
            let name = data["LoginName"].as_str().unwrap_or_default();
            let password = data["Password"].as_str().unwrap_or_default();
            if state.users.get(name).is_some_and(|p| p == password) {
                let token = Uuid::new_v4().to_string();
                state.tokens.insert(token.clone(), name.to_string());
                ok(json!({"Token": token}))
            } else {
                failure(1, "Invalid login or password")
            }
        }
        "General/Authentication/AuthenticateGisToken" => {
            let name = data["LoginName"].as_str().unwrap_or_default();
            if data["GisToken"] == SEED_GIS_TOKEN && state.users.contains_key(name) {
                let token = Uuid::new_v4().to_string();
                state.tokens.insert(token.clone(), name.to_string());
                ok(json!({"Token": token}))
            } else {
                failure(2, "GIS token not accepted")
            }
        }
        "General/Token/Validate" => {
            let token = data["Token"].as_str().unwrap_or_default();
            match state.tokens.get(token) {
                Some(name) => ok(json!({"LoginName": name})),
                None => ok(Value::Bool(false)),
            }
        }
        "General/Token/RevokeUser" => {
            let Some(name) = login else {
                return unauthorized();
            };
            state.tokens.retain(|_, owner| *owner != name);
            ok(Value::Bool(true))
        }
        "General/Authentication/User" => match login {
            Some(name) => ok(json!({"LoginName": name, "FullName": "Seed User"})),
            None => unauthorized(),
        },
        "Pll/CaseDataDetail/ByCaObjectId" => {
            if login.is_none() {
                return unauthorized();
            }
            let case_id = data["CaObjectId"].as_i64().unwrap_or_default();
            ok(Value::Array(state.details.get(&case_id).cloned().unwrap_or_default()))
        }
        "Pll/CaseDataDetail/Update" => {
            if login.is_none() {
                return unauthorized();
            }
            let case_id = data["CaObjectId"].as_i64().unwrap_or_default();
            let detail_id = data["CaDataDetailId"].as_i64();
            let record = state
                .details
                .get_mut(&case_id)
                .and_then(|records| records.iter_mut().find(|r| r["CaDataDetailId"].as_i64() == detail_id));
            match (record, data.as_object()) {
                (Some(record), Some(fields)) => {
                    for (key, value) in fields {
                        if key != "CaObjectId" && key != "CaDataDetailId" {
                            record[key.as_str()] = value.clone();
                        }
                    }
                    ok(record.clone())
                }
                _ => failure(1, "Detail not found"),
            }
        }
        "Pll/CaseRelDocs/Add" => {
            if login.is_none() {
                return unauthorized();
            }
            match form.file_name {
                Some(name) => ok(json!({"FileName": name, "Size": form.file_len})),
                None => failure(1, "No file"),
            }
        }
        "Test/Malformed" => (StatusCode::OK, "{\"Status\": 0, \"Value\": ").into_response(),
        "Test/Empty" => Json(json!({"Status": 0})).into_response(),
        _ => (StatusCode::OK, Html(LOGIN_PAGE)).into_response(),
    }
}
