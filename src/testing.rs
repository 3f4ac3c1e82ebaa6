//! In-memory fakes and request helpers for handler tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use time::{Duration as TimeDuration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::{
        jwt::JwtKeys,
        password::{generate_verification_token, hash_password},
        repo::{UserStore, EMAIL_TAKEN, USERNAME_TAKEN},
        repo_types::{EmployeeFilter, NewUser, Role, User, UserUpdate},
    },
    config::AppConfig,
    mailer::{Mail, Mailer},
    projects::{
        repo::ProjectStore,
        repo_types::{NewProject, Project, ProjectUpdate},
    },
    service_catalog::{
        repo::ServiceStore,
        repo_types::{NewService, Service, ServiceUpdate},
    },
    state::AppState,
    storage::StorageClient,
};

#[derive(Clone)]
pub struct Fakes {
    pub users: Arc<MemoryUserStore>,
    pub storage: Arc<FakeStorage>,
    pub mailer: Arc<FakeMailer>,
}

impl AppState {
    pub fn fake() -> Self {
        let config = AppConfig::for_tests();
        let users = Arc::new(MemoryUserStore::default());
        let storage = Arc::new(FakeStorage::default());
        let mailer = Arc::new(FakeMailer::new(&config.mail.contact_recipient));

        Self {
            config: Arc::new(config),
            users: users.clone(),
            projects: Arc::new(MemoryProjectStore::default()),
            services: Arc::new(MemoryServiceStore::default()),
            storage: storage.clone(),
            mailer: mailer.clone(),
            fakes: Some(Fakes {
                users,
                storage,
                mailer,
            }),
        }
    }

    fn fakes(&self) -> &Fakes {
        self.fakes.as_ref().expect("state was not built with AppState::fake()")
    }

    pub fn fake_users(&self) -> &MemoryUserStore {
        &self.fakes().users
    }

    pub fn fake_storage(&self) -> &FakeStorage {
        &self.fakes().storage
    }

    pub fn fake_mailer(&self) -> &FakeMailer {
        &self.fakes().mailer
    }
}

// ---- users ----

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
    stale_lookups: AtomicBool,
}

impl MemoryUserStore {
    pub fn all(&self) -> Vec<User> {
        self.rows.lock().unwrap().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    pub fn push(&self, user: User) {
        self.rows.lock().unwrap().push(user);
    }

    /// Email and username lookups miss from now on, as if a concurrent
    /// write landed between the duplicate check and the insert.
    pub fn stale_lookups(&self) {
        self.stale_lookups.store(true, Ordering::SeqCst);
    }

    fn lookups_stale(&self) -> bool {
        self.stale_lookups.load(Ordering::SeqCst)
    }

    /// Moves the verification deadline into the past.
    pub fn expire_token(&self, id: Uuid) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(u) = rows.iter_mut().find(|u| u.id == id) {
            u.verification_token_expiry = Some(OffsetDateTime::now_utc() - TimeDuration::minutes(1));
        }
    }

    fn employees(&self, filter: &EmployeeFilter) -> Vec<User> {
        // newest first
        self.rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        if self.lookups_stale() {
            return Ok(None);
        }
        Ok(self.all().into_iter().find(|u| u.email == email))
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        if self.lookups_stale() {
            return Ok(None);
        }
        Ok(self.all().into_iter().find(|u| u.username == username))
    }

    async fn find_by_login(&self, email_or_username: &str) -> anyhow::Result<Option<User>> {
        let email = email_or_username.to_lowercase();
        Ok(self
            .all()
            .into_iter()
            .find(|u| u.email == email || u.username == email_or_username))
    }

    async fn insert(&self, new: NewUser) -> anyhow::Result<User> {
        {
            let rows = self.rows.lock().unwrap();
            if rows.iter().any(|u| u.email == new.email) {
                return Err(EMAIL_TAKEN.into());
            }
            if rows.iter().any(|u| u.username == new.username) {
                return Err(USERNAME_TAKEN.into());
            }
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            firstname: new.firstname,
            lastname: new.lastname,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            is_verified: false,
            verification_token: Some(new.verification_token),
            verification_token_expiry: Some(new.verification_token_expiry),
            created_at: now,
            updated_at: now,
        };
        self.push(user.clone());
        Ok(user)
    }

    async fn verify_token(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(u) = rows.iter_mut().find(|u| {
            u.verification_token.as_deref() == Some(token)
                && u.verification_token_expiry.map_or(false, |e| e > now)
        }) else {
            return Ok(None);
        };
        u.is_verified = true;
        u.verification_token = None;
        u.verification_token_expiry = None;
        u.updated_at = now;
        Ok(Some(u.clone()))
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(name) = update.username.as_deref() {
            if rows.iter().any(|u| u.id != id && u.username == name) {
                return Err(USERNAME_TAKEN.into());
            }
        }
        let Some(u) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = update.firstname {
            u.firstname = v;
        }
        if let Some(v) = update.lastname {
            u.lastname = v;
        }
        if let Some(v) = update.username {
            u.username = v;
        }
        if let Some(v) = update.role {
            u.role = v;
        }
        u.updated_at = OffsetDateTime::now_utc();
        Ok(Some(u.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| u.id != id);
        Ok(rows.len() < before)
    }

    async fn list_employees(
        &self,
        filter: &EmployeeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<User>, i64)> {
        let all = self.employees(filter);
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn all_employees(&self, filter: &EmployeeFilter) -> anyhow::Result<Vec<User>> {
        Ok(self.employees(filter))
    }

    async fn distinct_roles(&self) -> anyhow::Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.all().into_iter().map(|u| u.role).collect();
        roles.sort_by_key(|r| r.as_str());
        roles.dedup();
        Ok(roles)
    }

    async fn delete_expired_unverified(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| u.is_verified || u.verification_token_expiry.map_or(true, |e| e >= now));
        Ok((before - rows.len()) as u64)
    }
}

// ---- projects / services ----

#[derive(Default)]
pub struct MemoryProjectStore {
    rows: Mutex<Vec<Project>>,
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn list(&self) -> anyhow::Result<Vec<Project>> {
        Ok(self.rows.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Project>> {
        Ok(self.rows.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, p: NewProject) -> anyhow::Result<Project> {
        let now = OffsetDateTime::now_utc();
        let project = Project {
            id: Uuid::new_v4(),
            name: p.name,
            title: p.title,
            category: p.category,
            description: p.description,
            location: p.location,
            thumbnail_url: p.thumbnail_url,
            gallery: p.gallery,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(project.clone());
        Ok(project)
    }

    async fn update(&self, id: Uuid, u: ProjectUpdate) -> anyhow::Result<Option<Project>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(v) = u.name {
            p.name = v;
        }
        if u.title.is_some() {
            p.title = u.title;
        }
        if let Some(v) = u.category {
            p.category = v;
        }
        if let Some(v) = u.description {
            p.description = v;
        }
        if let Some(v) = u.location {
            p.location = v;
        }
        if let Some(v) = u.thumbnail_url {
            p.thumbnail_url = v;
        }
        p.gallery.extend(u.append_gallery);
        p.updated_at = OffsetDateTime::now_utc();
        Ok(Some(p.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Project>> {
        let mut rows = self.rows.lock().unwrap();
        let idx = rows.iter().position(|p| p.id == id);
        Ok(idx.map(|i| rows.remove(i)))
    }

    async fn remove_gallery_image(&self, id: Uuid, url: &str) -> anyhow::Result<Option<Project>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows.iter_mut().find(|p| p.id == id && p.gallery.iter().any(|g| g == url))
        else {
            return Ok(None);
        };
        p.gallery.retain(|g| g != url);
        p.updated_at = OffsetDateTime::now_utc();
        Ok(Some(p.clone()))
    }
}

#[derive(Default)]
pub struct MemoryServiceStore {
    rows: Mutex<Vec<Service>>,
}

#[async_trait]
impl ServiceStore for MemoryServiceStore {
    async fn list(&self) -> anyhow::Result<Vec<Service>> {
        Ok(self.rows.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Service>> {
        Ok(self.rows.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn insert(&self, s: NewService) -> anyhow::Result<Service> {
        let now = OffsetDateTime::now_utc();
        let service = Service {
            id: Uuid::new_v4(),
            name: s.name,
            description: s.description,
            icon_url: s.icon_url,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(service.clone());
        Ok(service)
    }

    async fn update(&self, id: Uuid, u: ServiceUpdate) -> anyhow::Result<Option<Service>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(s) = rows.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(v) = u.name {
            s.name = v;
        }
        if let Some(v) = u.description {
            s.description = v;
        }
        if let Some(v) = u.icon_url {
            s.icon_url = v;
        }
        s.updated_at = OffsetDateTime::now_utc();
        Ok(Some(s.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Service>> {
        let mut rows = self.rows.lock().unwrap();
        let idx = rows.iter().position(|s| s.id == id);
        Ok(idx.map(|i| rows.remove(i)))
    }
}

// ---- storage / mail ----

/// Records every key written or deleted. Delete attempts are recorded even
/// when `fail_deletes` is set; failed puts are not recorded.
#[derive(Default)]
pub struct FakeStorage {
    stored: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_deletes: AtomicBool,
    puts_left: Mutex<Option<usize>>,
}

impl FakeStorage {
    pub fn stored_keys(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Lets `n` more puts succeed; every put after that fails.
    pub fn fail_puts_after(&self, n: usize) {
        *self.puts_left.lock().unwrap() = Some(n);
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        if let Some(left) = self.puts_left.lock().unwrap().as_mut() {
            if *left == 0 {
                anyhow::bail!("storage unavailable");
            }
            *left -= 1;
        }
        self.stored.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        Ok(())
    }
}

pub struct FakeMailer {
    sent: Mutex<Vec<Mail>>,
    fail_next: AtomicBool,
    contact_recipient: String,
}

impl FakeMailer {
    fn new(contact_recipient: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
            contact_recipient: contact_recipient.to_string(),
        }
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap().clone()
    }

    /// The next `send` fails; later ones succeed again.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, mail: Mail) -> anyhow::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("smtp unavailable");
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }

    fn contact_recipient(&self) -> &str {
        &self.contact_recipient
    }
}

// ---- fixtures ----

/// Inserts a user directly. Unverified users keep a live verification token.
pub fn insert_user(
    state: &AppState,
    email: &str,
    username: &str,
    password: &str,
    verified: bool,
    role: Role,
) -> User {
    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        firstname: username.to_string(),
        lastname: "Tester".into(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: hash_password(password).expect("hash"),
        role,
        is_verified: verified,
        verification_token: (!verified).then(generate_verification_token),
        verification_token_expiry: (!verified).then(|| now + TimeDuration::hours(1)),
        created_at: now,
        updated_at: now,
    };
    state.fake_users().push(user.clone());
    user
}

pub fn session_cookie_for(state: &AppState, user_id: Uuid) -> String {
    let keys = JwtKeys::from(&state.config.jwt);
    format!("jwt={}", keys.sign(user_id).expect("sign").token)
}

// ---- requests ----

pub async fn raw_call(state: &AppState, req: Request<Body>) -> Response<Body> {
    build_app(state.clone()).oneshot(req).await.expect("infallible")
}

/// Runs the request through the full router. Non-JSON bodies come back as a
/// JSON string, empty ones as null.
pub async fn call(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
    let res = raw_call(state, req).await;
    let status = res.status();
    let bytes = res.into_body().collect().await.expect("body").to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    json_request(Method::POST, uri, None, body)
}

pub fn put_json(uri: &str, cookie: &str, body: Value) -> Request<Body> {
    json_request(Method::PUT, uri, Some(cookie), body)
}

pub fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).expect("request")
}

pub fn delete_with_cookie(uri: &str, cookie: &str, body: Option<Value>) -> Request<Body> {
    match body {
        Some(json) => json_request(Method::DELETE, uri, Some(cookie), json),
        None => Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .expect("request"),
    }
}

pub struct MultipartPart {
    pub name: String,
    file_name: Option<String>,
    data: Vec<u8>,
}

impl MultipartPart {
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            data: value.as_bytes().to_vec(),
        }
    }

    pub fn file(name: &str, file_name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            data: data.to_vec(),
        }
    }
}

const BOUNDARY: &str = "----vertex-test-boundary";

pub fn multipart(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    parts: Vec<MultipartPart>,
) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match &part.file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        part.name, file_name
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(body)).expect("request")
}
