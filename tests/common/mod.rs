#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use dramalist::{
    AppState,
    auth::mailer::{Mail, MemoryMailer},
    config::{AdminSeed, Config},
    routes,
};

pub const ADMIN_EMAIL: &str = "admin@dramalist.test";
pub const ADMIN_PASSWORD: &str = "admin-secret";

const BOUNDARY: &str = "dramalist-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub mailer: Arc<MemoryMailer>,
    pub dir: TempDir,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    /// `name=value` of the session cookie set by this response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("token="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File { name: &'a str, file_name: &'a str, content_type: &'a str, bytes: &'a [u8] },
}

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n-not-really-a-png";

pub fn poster<'a>() -> Part<'a> {
    Part::File { name: "poster", file_name: "poster.png", content_type: "image/png", bytes: PNG }
}

pub async fn spawn() -> TestApp {
    spawn_with(|_| {}).await
}

pub async fn spawn_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let mut config = Config::for_paths(db_url, dir.path().join("uploads"));
    config.admin =
        Some(AdminSeed { email: ADMIN_EMAIL.to_string(), password: ADMIN_PASSWORD.to_string() });
    configure(&mut config);

    let mailer = Arc::new(MemoryMailer::default());
    let state = AppState::init(config, mailer.clone()).await.expect("state");
    let app = routes::router(state.clone());
    TestApp { app, state, mailer, dir }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            },
            Part::File { name, file_name, content_type, bytes } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            },
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.expect("oneshot");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply { status, headers, body }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Reply {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Reply {
        let mut builder = Request::builder().method("DELETE").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn multipart(
        &self,
        method: &str,
        uri: &str,
        parts: &[Part<'_>],
        cookie: Option<&str>,
    ) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(multipart_body(parts))).unwrap()).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Reply {
        self.json(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
            None,
        )
        .await
    }

    /// Login as seen from the peer address `peer`.
    pub async fn login_from(&self, peer: &str, email: &str, password: &str) -> Reply {
        let peer: SocketAddr = peer.parse().expect("peer address");
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(ConnectInfo(peer))
            .body(Body::from(serde_json::json!({ "email": email, "password": password }).to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn admin_cookie(&self) -> String {
        let reply = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(reply.status, StatusCode::OK, "admin login: {}", reply.body);
        reply.session_cookie().expect("admin cookie")
    }

    /// Signs up without verifying; returns the session cookie.
    pub async fn signup(&self, email: &str, password: &str) -> String {
        let reply = self
            .json(
                "POST",
                "/api/auth/signup",
                serde_json::json!({ "email": email, "password": password, "name": "Viewer" }),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "signup: {}", reply.body);
        reply.session_cookie().expect("signup cookie")
    }

    pub fn verification_code(&self, email: &str) -> String {
        match self.mailer.last_to(email) {
            Some(Mail::Verification { code }) => code,
            other => panic!("expected verification mail, got {other:?}"),
        }
    }

    /// A verified `User` account's session cookie.
    pub async fn member_cookie(&self, email: &str) -> String {
        let cookie = self.signup(email, "password1").await;
        let code = self.verification_code(email);
        let reply = self
            .json("POST", "/api/auth/verify-email", serde_json::json!({ "code": code }), None)
            .await;
        assert_eq!(reply.status, StatusCode::OK, "verify: {}", reply.body);
        cookie
    }

    /// Creates a country or genre; `key` is the singular field of the response body.
    pub async fn create_named(&self, resource: &str, key: &str, name: &str, cookie: &str) -> i64 {
        let reply = self
            .json("POST", &format!("/api/{resource}"), serde_json::json!({ "name": name }), Some(cookie))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "create {resource}: {}", reply.body);
        reply.body[key]["id"].as_i64().expect("id")
    }

    pub async fn create_movie(&self, title: &str, genres: &str, cookie: &str) -> Reply {
        self.multipart(
            "POST",
            "/api/movies",
            &[
                Part::Text("title", title),
                Part::Text("synopsis", "A story."),
                Part::Text("year", "2020"),
                Part::Text("rating", "8.5"),
                Part::Text("genres", genres),
                Part::Text("actors", "[]"),
                Part::Text("countries", "[]"),
                poster(),
            ],
            Some(cookie),
        )
        .await
    }
}
