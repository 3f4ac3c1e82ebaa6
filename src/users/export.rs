use anyhow::Context;
use serde::Serialize;
use time::macros::format_description;

use crate::auth::repo_types::User;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeRow<'a> {
    firstname: &'a str,
    lastname: &'a str,
    username: &'a str,
    email: &'a str,
    role: &'a str,
    created_at: String,
}

/// CSV with header `firstname,lastname,username,email,role,createdAt`;
/// `createdAt` is `DD.MM.YYYY HH:mm` in UTC.
pub fn employees_csv(users: &[User]) -> anyhow::Result<Vec<u8>> {
    let fmt = format_description!("[day].[month].[year] [hour]:[minute]");
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if users.is_empty() {
        wtr.write_record(["firstname", "lastname", "username", "email", "role", "createdAt"])?;
    }
    for u in users {
        let created_at = u
            .created_at
            .to_offset(time::UtcOffset::UTC)
            .format(&fmt)
            .context("format createdAt")?;
        wtr.serialize(EmployeeRow {
            firstname: &u.firstname,
            lastname: &u.lastname,
            username: &u.username,
            email: &u.email,
            role: u.role.as_str(),
            created_at,
        })?;
    }
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("flush csv: {}", e.error()))
}
