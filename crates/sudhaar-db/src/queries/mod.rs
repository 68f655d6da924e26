mod campaigns;
mod comments;
mod donations;
mod issues;
mod reports;
mod stats;
mod users;

use anyhow::Result;

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// `?1, ?2, ... ?n` starting after `offset` already-bound parameters.
fn placeholders(offset: usize, n: usize) -> String {
    (offset + 1..=offset + n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` substring match.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
pub(crate) mod test_support {
    use sudhaar_types::models::Role;
    use uuid::Uuid;

    use crate::Database;
    use crate::models::{NewUser, Registration};

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, username: &str, role: Role) -> Uuid {
        let email = format!("{}@example.com", username);
        let registration = db
            .register_user(&NewUser {
                email: &email,
                username,
                password_hash: "x",
                first_name: "",
                last_name: "",
                phone: None,
                cnic: None,
                role,
                organization_name: None,
            })
            .unwrap();
        match registration {
            Registration::Created(row) => row.id,
            Registration::Taken { .. } => panic!("user {} already exists", username),
        }
    }
}
