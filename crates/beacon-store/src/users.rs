use chrono::Utc;
use tracing::instrument;

use beacon_core::Role;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A stored user. `password_hash` never leaves the handler layer and is
/// deliberately not serializable.
#[derive(Clone, Debug)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub image_url: Option<String>,
    pub created_at: String,
    pub password_hash: String,
}

/// Fields required to create a user.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub image_url: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Clone, Debug, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub image_url: Option<String>,
}

pub struct UserRepo {
    db: Database,
}

const USER_COLUMNS: &str = "id, email, password_hash, name, role, image_url, created_at";

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new user. A taken email surfaces as `Conflict`.
    #[instrument(skip(self, new), fields(email = %new.email))]
    pub fn insert(&self, new: &NewUser) -> Result<UserRow, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, password_hash, name, role, image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    new.email,
                    new.password_hash,
                    new.name,
                    new.role.to_string(),
                    new.image_url,
                    now,
                ],
            )?;

            Ok(UserRow {
                id: conn.last_insert_rowid(),
                email: new.email.clone(),
                name: new.name.clone(),
                role: new.role,
                image_url: new.image_url.clone(),
                created_at: now.clone(),
                password_hash: new.password_hash.clone(),
            })
        })
    }

    /// Get a user by id.
    #[instrument(skip(self))]
    pub fn get(&self, id: i64) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
            let mut rows = stmt.query([id])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {id}"))),
            }
        })
    }

    /// Get a user by email. Used by the signin flow before verifying the
    /// submitted password against the stored hash.
    #[instrument(skip(self, email))]
    pub fn get_by_email(&self, email: &str) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
            let mut rows = stmt.query([email])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound("user".into())),
            }
        })
    }

    /// Apply a partial update and return the resulting row.
    #[instrument(skip(self, patch))]
    pub fn update(&self, id: i64, patch: &UserPatch) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
            let mut rows = stmt.query([id])?;
            let mut user = match rows.next()? {
                Some(row) => row_to_user(row)?,
                None => return Err(StoreError::NotFound(format!("user {id}"))),
            };
            drop(rows);
            drop(stmt);

            if let Some(email) = &patch.email {
                user.email = email.clone();
            }
            if let Some(hash) = &patch.password_hash {
                user.password_hash = hash.clone();
            }
            if let Some(name) = &patch.name {
                user.name = name.clone();
            }
            if let Some(role) = patch.role {
                user.role = role;
            }
            if let Some(url) = &patch.image_url {
                user.image_url = Some(url.clone());
            }

            conn.execute(
                "UPDATE users
                 SET email = ?1, password_hash = ?2, name = ?3, role = ?4, image_url = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    user.email,
                    user.password_hash,
                    user.name,
                    user.role.to_string(),
                    user.image_url,
                    id,
                ],
            )?;

            Ok(user)
        })
    }

    /// Delete a user. Missing id is `NotFound`.
    #[instrument(skip(self))]
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if affected == 0 {
                return Err(StoreError::NotFound(format!("user {id}")));
            }
            Ok(())
        })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRow, StoreError> {
    let role_str: String = row_helpers::get(row, 4, "users", "role")?;

    Ok(UserRow {
        id: row_helpers::get(row, 0, "users", "id")?,
        email: row_helpers::get(row, 1, "users", "email")?,
        password_hash: row_helpers::get(row, 2, "users", "password_hash")?,
        name: row_helpers::get(row, 3, "users", "name")?,
        role: row_helpers::parse_enum(&role_str, "users", "role")?,
        image_url: row_helpers::get_opt(row, 5, "users", "image_url")?,
        created_at: row_helpers::get(row, 6, "users", "created_at")?,
    })
}
