use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl UserSummary {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserSummary>(
            r#"SELECT id, username, full_name, email, avatar_url FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserSummary>(
            r#"SELECT id, username, full_name, email, avatar_url FROM users WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    /// Case-insensitive lookup used to resolve @mentions.
    pub async fn find_by_usernames(
        pool: &PgPool,
        usernames: &[String],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        sqlx::query_as::<_, UserSummary>(
            r#"SELECT id, username, full_name, email, avatar_url
               FROM users
               WHERE lower(username) = ANY($1)"#,
        )
        .bind(&lowered)
        .fetch_all(pool)
        .await
    }

    /// Prefix search over username and full name for mention autocompletion.
    pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = format!("{}%", escape_like(&query.to_lowercase()));
        sqlx::query_as::<_, UserSummary>(
            r#"SELECT id, username, full_name, email, avatar_url
               FROM users
               WHERE lower(username) LIKE $1 ESCAPE '\' OR lower(coalesce(full_name, '')) LIKE $1 ESCAPE '\'
               ORDER BY username
               LIMIT $2"#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_role(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(r#"SELECT role FROM users WHERE id = $1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

/// Escape `%`, `_` and `\` so user input is matched literally by LIKE.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c\\"), "a\\_b\\%c\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
