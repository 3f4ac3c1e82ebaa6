use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{EmployeeFilter, NewUser, Role, User, UserUpdate};
use crate::error::Duplicate;

pub const EMAIL_TAKEN: Duplicate = Duplicate("Email already taken");
pub const USERNAME_TAKEN: Duplicate = Duplicate("Username already taken");

const USER_COLUMNS: &str = "id, firstname, lastname, username, email, password_hash, role, \
     is_verified, verification_token, verification_token_expiry, created_at, updated_at";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// Login lookup: matches either the email or the username.
    async fn find_by_login(&self, email_or_username: &str) -> anyhow::Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> anyhow::Result<User>;
    /// Marks the owner of a live token verified and clears the token fields.
    async fn verify_token(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>>;
    async fn update(&self, id: Uuid, update: UserUpdate) -> anyhow::Result<Option<User>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Newest first. Returns the page and the total match count.
    async fn list_employees(
        &self,
        filter: &EmployeeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<User>, i64)>;
    async fn all_employees(&self, filter: &EmployeeFilter) -> anyhow::Result<Vec<User>>;
    async fn distinct_roles(&self) -> anyhow::Result<Vec<Role>>;
    /// Deletes unverified users whose verification token expired before `now`.
    async fn delete_expired_unverified(&self, now: OffsetDateTime) -> anyhow::Result<u64>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn like_pattern(search: &Option<String>) -> Option<String> {
    search.as_ref().map(|s| {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{}%", escaped)
    })
}

/// Unique violations (SQLSTATE 23505) become [`Duplicate`]; anything else
/// keeps its context.
fn write_error(e: sqlx::Error, what: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return match db.constraint() {
                Some(c) if c.contains("username") => USERNAME_TAKEN.into(),
                _ => EMAIL_TAKEN.into(),
            };
        }
    }
    anyhow::Error::new(e).context(what)
}

fn role_names(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

const EMPLOYEE_FILTER: &str = r#"
    is_verified = TRUE
    AND ($1::text IS NULL
         OR firstname ILIKE $1
         OR lastname ILIKE $1
         OR (firstname || ' ' || lastname) ILIKE $1)
    AND (cardinality($2::text[]) = 0 OR role::text = ANY($2))
"#;

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn find_by_login(&self, email_or_username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = lower($1) OR username = $1 LIMIT 1"
        ))
        .bind(email_or_username)
        .fetch_optional(&self.db)
        .await
        .context("find user by login")?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (firstname, lastname, username, email, password_hash, role,
                               verification_token, verification_token_expiry)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(&user.verification_token)
        .bind(user.verification_token_expiry)
        .fetch_one(&self.db)
        .await
        .map_err(|e| write_error(e, "insert user"))?;
        Ok(created)
    }

    async fn verify_token(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET is_verified = TRUE,
                   verification_token = NULL,
                   verification_token_expiry = NULL,
                   updated_at = now()
             WHERE verification_token = $1
               AND verification_token_expiry > $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("verify token")?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET firstname = COALESCE($2, firstname),
                   lastname = COALESCE($3, lastname),
                   username = COALESCE($4, username),
                   role = COALESCE($5, role),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.firstname)
        .bind(update.lastname)
        .bind(update.username)
        .bind(update.role)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| write_error(e, "update user"))?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_employees(
        &self,
        filter: &EmployeeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<User>, i64)> {
        let pattern = like_pattern(&filter.search);
        let roles = role_names(&filter.roles);

        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {EMPLOYEE_FILTER} \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(&pattern)
        .bind(&roles)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list employees")?;

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM users WHERE {EMPLOYEE_FILTER}"))
                .bind(&pattern)
                .bind(&roles)
                .fetch_one(&self.db)
                .await
                .context("count employees")?;

        Ok((rows, total))
    }

    async fn all_employees(&self, filter: &EmployeeFilter) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {EMPLOYEE_FILTER} ORDER BY created_at DESC"
        ))
        .bind(like_pattern(&filter.search))
        .bind(role_names(&filter.roles))
        .fetch_all(&self.db)
        .await
        .context("export employees")?;
        Ok(rows)
    }

    async fn distinct_roles(&self) -> anyhow::Result<Vec<Role>> {
        let rows: Vec<(Role,)> = sqlx::query_as("SELECT DISTINCT role FROM users ORDER BY role")
            .fetch_all(&self.db)
            .await
            .context("distinct roles")?;
        Ok(rows.into_iter().map(|(r,)| r).collect())
    }

    async fn delete_expired_unverified(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM users
             WHERE is_verified = FALSE
               AND verification_token_expiry < $1
            "#,
        )
        .bind(now)
        .execute(&self.db)
        .await
        .context("delete unverified users")?;
        Ok(res.rows_affected())
    }
}
