use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder};
use ts_rs::TS;
use uuid::Uuid;

use super::user::escape_like;

/// Person-specific columns stored alongside a `person` dossier.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Person {
    pub id: Uuid,
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub photo_url: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality_country_id: Option<Uuid>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub biography_en: Option<String>,
    pub biography_ar: Option<String>,
    pub organization_id: Option<Uuid>,
    pub importance_level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PERSON_COLUMNS: &str = "p.id, p.title_en, p.title_ar, p.photo_url, p.date_of_birth, \
    p.nationality_country_id, p.gender, p.email, p.phone, p.biography_en, p.biography_ar, \
    p.organization_id, p.importance_level, p.created_at, p.updated_at";

/// A person row joined with its dossier name and organization name, as listed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PersonListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    #[ts(flatten)]
    pub person: Person,
    pub name_en: String,
    pub name_ar: String,
    pub organization_name_en: Option<String>,
    pub organization_name_ar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct PersonFields {
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub photo_url: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality_country_id: Option<Uuid>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub biography_en: Option<String>,
    pub biography_ar: Option<String>,
    pub organization_id: Option<Uuid>,
    pub importance_level: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct PersonFilter {
    pub search: Option<String>,
    pub organization_id: Option<Uuid>,
    pub nationality_id: Option<Uuid>,
    pub importance_level: Option<i32>,
}

impl Person {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PersonListItem>, sqlx::Error> {
        sqlx::query_as::<_, PersonListItem>(&format!(
            "SELECT {PERSON_COLUMNS}, d.name_en, d.name_ar,
                    o.name_en AS organization_name_en, o.name_ar AS organization_name_ar
             FROM persons p
             JOIN dossiers d ON d.id = p.id
             LEFT JOIN dossiers o ON o.id = p.organization_id
             WHERE p.id = $1 AND d.status <> 'archived'"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &PersonFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PersonListItem>, i64), sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PERSON_COLUMNS}, d.name_en, d.name_ar,
                    o.name_en AS organization_name_en, o.name_ar AS organization_name_ar,
                    COUNT(*) OVER () AS total_count
             FROM persons p
             JOIN dossiers d ON d.id = p.id
             LEFT JOIN dossiers o ON o.id = p.organization_id
             WHERE d.status <> 'archived'"
        ));
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", escape_like(search.trim()));
            query
                .push(" AND (d.name_en ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR d.name_ar ILIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(org) = filter.organization_id {
            query.push(" AND p.organization_id = ").push_bind(org);
        }
        if let Some(nat) = filter.nationality_id {
            query.push(" AND p.nationality_country_id = ").push_bind(nat);
        }
        if let Some(level) = filter.importance_level {
            query.push(" AND p.importance_level = ").push_bind(level);
        }
        query
            .push(" ORDER BY p.importance_level DESC, d.name_en ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build_query_as::<CountedPerson>().fetch_all(pool).await?;
        let total = rows.first().map(|r| r.total_count).unwrap_or(0);
        Ok((rows.into_iter().map(|r| r.row).collect(), total))
    }

    pub async fn create<'e, E>(executor: E, id: Uuid, data: &PersonFields) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Person>(&format!(
            "INSERT INTO persons AS p (id, title_en, title_ar, photo_url, date_of_birth,
                 nationality_country_id, gender, email, phone, biography_en, biography_ar,
                 organization_id, importance_level)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, COALESCE($13, 1))
             RETURNING {PERSON_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.title_en)
        .bind(&data.title_ar)
        .bind(&data.photo_url)
        .bind(data.date_of_birth)
        .bind(data.nationality_country_id)
        .bind(&data.gender)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.biography_en)
        .bind(&data.biography_ar)
        .bind(data.organization_id)
        .bind(data.importance_level)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, id: Uuid, data: &PersonFields) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Person>(&format!(
            "UPDATE persons AS p SET
                title_en = COALESCE($2, p.title_en),
                title_ar = COALESCE($3, p.title_ar),
                photo_url = COALESCE($4, p.photo_url),
                date_of_birth = COALESCE($5, p.date_of_birth),
                nationality_country_id = COALESCE($6, p.nationality_country_id),
                gender = COALESCE($7, p.gender),
                email = COALESCE($8, p.email),
                phone = COALESCE($9, p.phone),
                biography_en = COALESCE($10, p.biography_en),
                biography_ar = COALESCE($11, p.biography_ar),
                organization_id = COALESCE($12, p.organization_id),
                importance_level = COALESCE($13, p.importance_level),
                updated_at = now()
             WHERE p.id = $1
             RETURNING {PERSON_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.title_en)
        .bind(&data.title_ar)
        .bind(&data.photo_url)
        .bind(data.date_of_birth)
        .bind(data.nationality_country_id)
        .bind(&data.gender)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.biography_en)
        .bind(&data.biography_ar)
        .bind(data.organization_id)
        .bind(data.importance_level)
        .fetch_optional(executor)
        .await
    }

    /// `(id, name_en, name_ar, importance_level)` for a batch of people.
    pub async fn find_nodes(
        pool: &PgPool,
        ids: &[Uuid],
    ) -> Result<Vec<(Uuid, String, String, i32)>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, (Uuid, String, String, i32)>(
            r#"SELECT p.id, d.name_en, d.name_ar, p.importance_level
               FROM persons p JOIN dossiers d ON d.id = p.id
               WHERE p.id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }
}

#[derive(FromRow)]
struct CountedPerson {
    #[sqlx(flatten)]
    row: PersonListItem,
    total_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PersonRole {
    pub id: Uuid,
    pub person_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub role_title_en: String,
    pub role_title_ar: Option<String>,
    pub department_en: Option<String>,
    pub department_ar: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreatePersonRole {
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub role_title_en: String,
    pub role_title_ar: Option<String>,
    pub department_en: Option<String>,
    pub department_ar: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: Option<bool>,
}

impl PersonRole {
    pub async fn find_by_person(pool: &PgPool, person_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PersonRole>(
            r#"SELECT id, person_id, organization_id, role_title_en, role_title_ar, department_en,
                      department_ar, start_date, end_date, is_current, created_at
               FROM person_roles WHERE person_id = $1
               ORDER BY is_current DESC, start_date DESC NULLS LAST"#,
        )
        .bind(person_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &PgPool, person_id: Uuid, data: &CreatePersonRole) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PersonRole>(
            r#"INSERT INTO person_roles (id, person_id, organization_id, role_title_en, role_title_ar,
                   department_en, department_ar, start_date, end_date, is_current)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, person_id, organization_id, role_title_en, role_title_ar, department_en,
                         department_ar, start_date, end_date, is_current, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(person_id)
        .bind(data.organization_id)
        .bind(data.role_title_en.trim())
        .bind(&data.role_title_ar)
        .bind(&data.department_en)
        .bind(&data.department_ar)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.is_current.unwrap_or(true))
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, person_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM person_roles WHERE id = $1 AND person_id = $2")
            .bind(id)
            .bind(person_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PersonAffiliation {
    pub id: Uuid,
    pub person_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub affiliation_type: String,
    pub position_title_en: Option<String>,
    pub position_title_ar: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreatePersonAffiliation {
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub affiliation_type: String,
    pub position_title_en: Option<String>,
    pub position_title_ar: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

impl PersonAffiliation {
    pub async fn find_by_person(pool: &PgPool, person_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PersonAffiliation>(
            r#"SELECT id, person_id, organization_id, affiliation_type, position_title_en,
                      position_title_ar, start_date, end_date, is_active, notes, created_at
               FROM person_affiliations WHERE person_id = $1
               ORDER BY is_active DESC, created_at DESC"#,
        )
        .bind(person_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        person_id: Uuid,
        data: &CreatePersonAffiliation,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PersonAffiliation>(
            r#"INSERT INTO person_affiliations (id, person_id, organization_id, affiliation_type,
                   position_title_en, position_title_ar, start_date, end_date, is_active, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, person_id, organization_id, affiliation_type, position_title_en,
                         position_title_ar, start_date, end_date, is_active, notes, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(person_id)
        .bind(data.organization_id)
        .bind(data.affiliation_type.trim())
        .bind(&data.position_title_en)
        .bind(&data.position_title_ar)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.is_active.unwrap_or(true))
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, person_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM person_affiliations WHERE id = $1 AND person_id = $2")
            .bind(id)
            .bind(person_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PersonRelationship {
    pub id: Uuid,
    pub from_person_id: Uuid,
    pub to_person_id: Uuid,
    pub relationship_type: String,
    pub strength: i32,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreatePersonRelationship {
    pub to_person_id: Option<Uuid>,
    #[serde(default)]
    pub relationship_type: String,
    pub strength: Option<i32>,
    pub notes: Option<String>,
}

const RELATIONSHIP_COLUMNS: &str =
    "id, from_person_id, to_person_id, relationship_type, strength, notes, created_by, created_at";

impl PersonRelationship {
    /// Relationships in either direction touching the person.
    pub async fn find_by_person(pool: &PgPool, person_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        Self::find_touching(pool, &[person_id]).await
    }

    /// Relationships in either direction touching any of `ids`.
    pub async fn find_touching(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PersonRelationship>(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM person_relationships
             WHERE from_person_id = ANY($1) OR to_person_id = ANY($1)
             ORDER BY strength DESC, created_at DESC"
        ))
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        from_person_id: Uuid,
        to_person_id: Uuid,
        relationship_type: &str,
        strength: i32,
        notes: Option<&str>,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PersonRelationship>(&format!(
            "INSERT INTO person_relationships (id, from_person_id, to_person_id, relationship_type,
                 strength, notes, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {RELATIONSHIP_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(from_person_id)
        .bind(to_person_id)
        .bind(relationship_type)
        .bind(strength)
        .bind(notes)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, person_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM person_relationships WHERE id = $1 AND (from_person_id = $2 OR to_person_id = $2)",
        )
        .bind(id)
        .bind(person_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
