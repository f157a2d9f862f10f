#![allow(dead_code)]

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use serde_json::{json, Value};
use socialhub::{
    bind_random_port, blob_store::LocalBlobStore, config::Config, init_db, mail::Mailer,
    make_router, serve, AppState,
};
use sqlx::SqlitePool;

pub const PASSWORD: &str = "correct horse battery";

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Keeps every message it is handed, or refuses them all while `failing`.
#[derive(Default)]
pub struct CapturingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub failing: AtomicBool,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("mail provider unavailable");
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        Ok(())
    }
}

impl CapturingMailer {
    pub fn last_to(&self, email: &str) -> Option<SentMail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|mail| mail.to == email)
            .cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub mailer: Arc<CapturingMailer>,
    pub pool: SqlitePool,
    pub upload_dir: PathBuf,
}

pub async fn spawn_app() -> TestApp {
    let dir = std::env::temp_dir().join(format!("socialhub-it-{:016x}", rand::random::<u64>()));
    std::fs::create_dir_all(&dir).unwrap();
    let upload_dir = dir.join("uploads");
    let database_url = format!("sqlite://{}", dir.join("app.db").display());

    let (listener, addr) = bind_random_port().unwrap();
    let public_base_url = format!("http://{}", addr);

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "integration-secret".to_string(),
        host: addr.ip().to_string(),
        port: addr.port(),
        public_base_url: public_base_url.clone(),
        upload_dir: upload_dir.display().to_string(),
        reset_url_base: "http://localhost:5000/reset-password".to_string(),
        mail_api_url: None,
        mail_api_key: None,
        mail_from: "tests@localhost".to_string(),
        otp_ttl_secs: 300,
        echo_otp: true,
    };

    let pool = init_db(&database_url).await.unwrap();
    let mailer = Arc::new(CapturingMailer::default());
    let blob_store = LocalBlobStore::new(upload_dir.clone(), format!("{}/uploads", public_base_url))
        .await
        .unwrap();
    let state = Arc::new(AppState {
        pool: pool.clone(),
        config,
        mailer: mailer.clone(),
        blob_store: Arc::new(blob_store),
    });

    tokio::spawn(serve(make_router(state), listener));

    TestApp {
        addr,
        client: reqwest::Client::new(),
        mailer,
        pool,
        upload_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn api(&self, path: &str) -> String {
        self.url(&format!("/api/v1{}", path))
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.api(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        read(response).await
    }

    pub async fn send_otp(&self, email: &str) -> String {
        let (status, body) = self.post_json("/sendotp", json!({ "email": email })).await;
        assert_eq!(status, 200, "{}", body);
        body["otp"].as_str().unwrap().to_string()
    }

    pub async fn signup_with(&self, email: &str, account_type: &str) -> (u16, Value) {
        let otp = self.send_otp(email).await;
        self.post_json(
            "/signup",
            json!({
                "firstname": "Ada",
                "lastname": "Lovelace",
                "email": email,
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
                "accountType": account_type,
                "otp": otp,
            }),
        )
        .await
    }

    /// Registers `email` and returns `(user id, session token)`.
    pub async fn register(&self, email: &str) -> (i64, String) {
        let (status, body) = self.signup_with(email, "STUDENT").await;
        assert_eq!(status, 200, "{}", body);
        let (status, body) = self
            .post_json("/login", json!({ "email": email, "password": PASSWORD }))
            .await;
        assert_eq!(status, 200, "{}", body);
        (
            body["user"]["id"].as_i64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn create_post(&self, token: &str, content: &str) -> i64 {
        let form = reqwest::multipart::Form::new().text("content", content.to_string());
        let response = self
            .client
            .post(self.api("/posts/create"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        let (status, body) = read(response).await;
        assert_eq!(status, 201, "{}", body);
        body["post"]["id"].as_i64().unwrap()
    }

    pub async fn authed(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut request = self
            .client
            .request(method, self.api(path))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        read(request.send().await.unwrap()).await
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        read(self.client.get(self.api(path)).send().await.unwrap()).await
    }

    /// `(like_count, comment_count)` as stored on the post row.
    pub async fn counters(&self, post_id: i64) -> (i64, i64) {
        sqlx::query_as("SELECT like_count, comment_count FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }
}

pub async fn read(response: reqwest::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Pulls the reset token out of a password reset email.
pub fn token_from_reset_mail(body: &str) -> String {
    let start = body.find("token=").unwrap() + "token=".len();
    body[start..]
        .chars()
        .take_while(|c| *c != '"')
        .collect()
}
