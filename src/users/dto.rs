use serde::{Deserialize, Serialize};

use crate::auth::repo_types::{EmployeeFilter, Role, User, UserUpdate};
use crate::error::{AppError, Result};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeQuery {
    pub search: Option<String>,
    /// Comma-separated role names.
    pub roles: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl EmployeeQuery {
    pub fn filter(&self) -> Result<EmployeeFilter> {
        let roles = match self.roles.as_deref() {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Role::parse(s).ok_or_else(|| AppError::bad_request(format!("unknown role {}", s))))
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(EmployeeFilter {
            search: self
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            roles,
        })
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Rows to skip for the requested page.
    pub fn offset(&self) -> Result<i64> {
        (self.page() - 1)
            .checked_mul(self.limit())
            .ok_or_else(|| AppError::bad_request("page is out of range"))
    }
}

#[derive(Debug, Serialize)]
pub struct EmployeesPage {
    pub employees: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub username: Option<String>,
    pub role: Option<Role>,
}

impl From<UpdateEmployeeRequest> for UserUpdate {
    fn from(r: UpdateEmployeeRequest) -> Self {
        UserUpdate {
            firstname: non_blank(r.firstname),
            lastname: non_blank(r.lastname),
            username: non_blank(r.username),
            role: r.role,
        }
    }
}

/// Profile self-service: the role cannot be changed here.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub username: Option<String>,
}

impl From<UpdateProfileRequest> for UserUpdate {
    fn from(r: UpdateProfileRequest) -> Self {
        UserUpdate {
            firstname: non_blank(r.firstname),
            lastname: non_blank(r.lastname),
            username: non_blank(r.username),
            role: None,
        }
    }
}
