//! People of interest: a `person` dossier plus its extension row, roles,
//! affiliations and the relationship network between people.

use std::collections::{HashMap, HashSet};

use db::models::{
    dossier::{CreateDossier, Dossier, DossierStatus, DossierType, UpdateDossier},
    person::{
        CreatePersonAffiliation, CreatePersonRelationship, CreatePersonRole, Person,
        PersonAffiliation, PersonFields, PersonFilter, PersonListItem, PersonRelationship,
        PersonRole,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, required, required_text};

pub const MAX_NETWORK_DEPTH: i32 = 3;
pub const DEFAULT_STRENGTH: i32 = 3;

#[derive(Debug, Error)]
pub enum PersonError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("person not found")]
    NotFound,
    #[error("{0} not found")]
    ChildNotFound(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreatePerson {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub sensitivity_level: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    #[ts(flatten)]
    pub fields: PersonFields,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdatePerson {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub sensitivity_level: Option<i32>,
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    #[ts(flatten)]
    pub fields: PersonFields,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CreatedPerson {
    #[serde(flatten)]
    #[ts(flatten)]
    pub dossier: Dossier,
    pub extension: Person,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct PersonDetail {
    pub person: PersonListItem,
    pub roles: Vec<PersonRole>,
    pub affiliations: Vec<PersonAffiliation>,
    pub relationships: Vec<PersonRelationship>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct NetworkNode {
    pub id: Uuid,
    pub name_en: String,
    pub name_ar: String,
    pub importance_level: i32,
    /// Hops from the person the network was requested for.
    pub distance: i32,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct NetworkEdge {
    pub id: Uuid,
    pub source: Uuid,
    pub target: Uuid,
    pub relationship_type: String,
    pub strength: i32,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct PersonNetwork {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

fn person_name(value: Option<&str>, field: &str, message_en: &str, message_ar: &str) -> Result<String, ValidationError> {
    required_text(value, field).map_err(|_| ValidationError::new(field, message_en, message_ar))
}

/// Name fields present in an update must not be blank.
fn optional_name(value: Option<&str>, field: &str, message_en: &str, message_ar: &str) -> Result<Option<String>, ValidationError> {
    value
        .map(|v| person_name(Some(v), field, message_en, message_ar))
        .transpose()
}

pub fn validate_strength(strength: Option<i32>) -> Result<i32, ValidationError> {
    match strength {
        None => Ok(DEFAULT_STRENGTH),
        Some(s) if (1..=5).contains(&s) => Ok(s),
        Some(_) => Err(ValidationError::new(
            "strength",
            "Strength must be between 1 and 5",
            "يجب أن تكون قوة العلاقة بين 1 و 5",
        )),
    }
}

/// Record `relationships` as edges and return the people first reached through them.
pub fn expand_frontier(
    relationships: Vec<PersonRelationship>,
    distance: i32,
    visited: &mut HashMap<Uuid, i32>,
    edges: &mut Vec<NetworkEdge>,
    seen_edges: &mut HashSet<Uuid>,
) -> Vec<Uuid> {
    let mut next = Vec::new();
    for rel in relationships {
        for endpoint in [rel.from_person_id, rel.to_person_id] {
            if !visited.contains_key(&endpoint) {
                visited.insert(endpoint, distance);
                next.push(endpoint);
            }
        }
        if seen_edges.insert(rel.id) {
            edges.push(NetworkEdge {
                id: rel.id,
                source: rel.from_person_id,
                target: rel.to_person_id,
                relationship_type: rel.relationship_type,
                strength: rel.strength,
            });
        }
    }
    next
}

pub struct PersonService {
    pool: PgPool,
}

impl PersonService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &PersonFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PersonListItem>, i64), PersonError> {
        Ok(Person::list(&self.pool, filter, limit, offset).await?)
    }

    async fn existing(&self, id: Uuid) -> Result<PersonListItem, PersonError> {
        Person::find_by_id(&self.pool, id)
            .await?
            .ok_or(PersonError::NotFound)
    }

    pub async fn get(&self, id: Uuid) -> Result<PersonDetail, PersonError> {
        let person = self.existing(id).await?;
        let (roles, affiliations, relationships) = futures::try_join!(
            PersonRole::find_by_person(&self.pool, id),
            PersonAffiliation::find_by_person(&self.pool, id),
            PersonRelationship::find_by_person(&self.pool, id),
        )?;
        Ok(PersonDetail {
            person,
            roles,
            affiliations,
            relationships,
        })
    }

    pub async fn network(&self, id: Uuid, depth: i32) -> Result<PersonNetwork, PersonError> {
        self.existing(id).await?;
        let depth = depth.clamp(1, MAX_NETWORK_DEPTH);

        let mut visited = HashMap::from([(id, 0)]);
        let mut edges = Vec::new();
        let mut seen_edges = HashSet::new();
        let mut frontier = vec![id];
        for distance in 1..=depth {
            if frontier.is_empty() {
                break;
            }
            let relationships = PersonRelationship::find_touching(&self.pool, &frontier).await?;
            frontier = expand_frontier(relationships, distance, &mut visited, &mut edges, &mut seen_edges);
        }

        let ids: Vec<Uuid> = visited.keys().copied().collect();
        let mut nodes: Vec<NetworkNode> = Person::find_nodes(&self.pool, &ids)
            .await?
            .into_iter()
            .map(|(node_id, name_en, name_ar, importance_level)| NetworkNode {
                distance: visited.get(&node_id).copied().unwrap_or(depth),
                id: node_id,
                name_en,
                name_ar,
                importance_level,
            })
            .collect();
        nodes.sort_by_key(|n| (n.distance, -n.importance_level));

        Ok(PersonNetwork { nodes, edges })
    }

    /// Create the dossier, its person extension and the creator's ownership together.
    pub async fn create(&self, data: CreatePerson, created_by: Uuid) -> Result<CreatedPerson, PersonError> {
        let name_en = person_name(
            data.name_en.as_deref(),
            "name_en",
            "English name is required",
            "الاسم بالإنجليزية مطلوب",
        )?;
        let name_ar = person_name(
            data.name_ar.as_deref(),
            "name_ar",
            "Arabic name is required",
            "الاسم بالعربية مطلوب",
        )?;

        let mut tx = self.pool.begin().await?;
        let dossier = Dossier::create(
            &mut *tx,
            &CreateDossier {
                dossier_type: DossierType::Person,
                name_en,
                name_ar,
                description_en: data.description_en,
                description_ar: data.description_ar,
                sensitivity_level: data.sensitivity_level,
                tags: data.tags,
            },
            created_by,
        )
        .await?;
        let extension = Person::create(&mut *tx, dossier.id, &data.fields).await?;
        Dossier::add_owner(&mut *tx, dossier.id, created_by, "owner").await?;
        tx.commit().await?;

        info!(person_id = %dossier.id, created_by = %created_by, "Person created");
        Ok(CreatedPerson { dossier, extension })
    }

    pub async fn update(&self, id: Uuid, data: UpdatePerson) -> Result<PersonListItem, PersonError> {
        self.existing(id).await?;
        let dossier_changes = UpdateDossier {
            name_en: optional_name(
                data.name_en.as_deref(),
                "name_en",
                "English name is required",
                "الاسم بالإنجليزية مطلوب",
            )?,
            name_ar: optional_name(
                data.name_ar.as_deref(),
                "name_ar",
                "Arabic name is required",
                "الاسم بالعربية مطلوب",
            )?,
            description_en: data.description_en,
            description_ar: data.description_ar,
            sensitivity_level: data.sensitivity_level,
            tags: data.tags,
        };

        let mut tx = self.pool.begin().await?;
        Dossier::update(&mut *tx, id, &dossier_changes).await?;
        Person::update(&mut *tx, id, &data.fields).await?;
        tx.commit().await?;

        self.existing(id).await
    }

    pub async fn archive(&self, id: Uuid) -> Result<(), PersonError> {
        self.existing(id).await?;
        Dossier::set_status(&self.pool, id, DossierStatus::Archived).await?;
        info!(person_id = %id, "Person archived");
        Ok(())
    }

    pub async fn add_role(&self, person_id: Uuid, data: &CreatePersonRole) -> Result<PersonRole, PersonError> {
        required_text(Some(&data.role_title_en), "role_title_en")?;
        self.existing(person_id).await?;
        Ok(PersonRole::create(&self.pool, person_id, data).await?)
    }

    pub async fn remove_role(&self, person_id: Uuid, role_id: Uuid) -> Result<(), PersonError> {
        match PersonRole::delete(&self.pool, person_id, role_id).await? {
            0 => Err(PersonError::ChildNotFound("role")),
            _ => Ok(()),
        }
    }

    pub async fn add_affiliation(
        &self,
        person_id: Uuid,
        data: &CreatePersonAffiliation,
    ) -> Result<PersonAffiliation, PersonError> {
        required_text(Some(&data.affiliation_type), "affiliation_type")?;
        self.existing(person_id).await?;
        Ok(PersonAffiliation::create(&self.pool, person_id, data).await?)
    }

    pub async fn remove_affiliation(&self, person_id: Uuid, affiliation_id: Uuid) -> Result<(), PersonError> {
        match PersonAffiliation::delete(&self.pool, person_id, affiliation_id).await? {
            0 => Err(PersonError::ChildNotFound("affiliation")),
            _ => Ok(()),
        }
    }

    pub async fn add_relationship(
        &self,
        person_id: Uuid,
        data: &CreatePersonRelationship,
        created_by: Uuid,
    ) -> Result<PersonRelationship, PersonError> {
        let to_person_id = required(data.to_person_id, "to_person_id")?;
        let relationship_type = required_text(Some(&data.relationship_type), "relationship_type")?;
        if to_person_id == person_id {
            return Err(ValidationError::new(
                "to_person_id",
                "A person cannot have a relationship with themselves",
                "لا يمكن إنشاء علاقة للشخص مع نفسه",
            )
            .into());
        }
        let strength = validate_strength(data.strength)?;

        self.existing(person_id).await?;
        if Person::find_by_id(&self.pool, to_person_id).await?.is_none() {
            return Err(PersonError::ChildNotFound("related person"));
        }

        let relationship = PersonRelationship::create(
            &self.pool,
            person_id,
            to_person_id,
            &relationship_type,
            strength,
            data.notes.as_deref(),
            created_by,
        )
        .await?;
        info!(
            relationship_id = %relationship.id,
            from = %person_id,
            to = %to_person_id,
            "Person relationship created"
        );
        Ok(relationship)
    }

    pub async fn remove_relationship(&self, person_id: Uuid, relationship_id: Uuid) -> Result<(), PersonError> {
        match PersonRelationship::delete(&self.pool, person_id, relationship_id).await? {
            0 => Err(PersonError::ChildNotFound("relationship")),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn rel(from: Uuid, to: Uuid) -> PersonRelationship {
        PersonRelationship {
            id: Uuid::new_v4(),
            from_person_id: from,
            to_person_id: to,
            relationship_type: "colleague".into(),
            strength: 3,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_strength_defaults_and_bounds() {
        assert_eq!(validate_strength(None).unwrap(), 3);
        assert_eq!(validate_strength(Some(5)).unwrap(), 5);
        assert!(validate_strength(Some(0)).is_err());
        assert!(validate_strength(Some(6)).is_err());
    }

    #[test]
    fn test_missing_names_use_arabic_messages() {
        let err = person_name(Some("  "), "name_ar", "Arabic name is required", "الاسم بالعربية مطلوب")
            .unwrap_err();
        assert_eq!(err.message_ar, "الاسم بالعربية مطلوب");
        assert_eq!(optional_name(None, "name_en", "", "").unwrap(), None);
    }

    #[test]
    fn test_expand_frontier_walks_both_directions() {
        let root = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let mut visited = HashMap::from([(root, 0)]);
        let mut edges = Vec::new();
        let mut seen = HashSet::new();

        let first = vec![rel(root, a), rel(b, root)];
        let next = expand_frontier(first, 1, &mut visited, &mut edges, &mut seen);
        assert_eq!(next, vec![a, b]);

        let shared = rel(a, b);
        let second = vec![shared.clone(), rel(b, c), shared];
        let next = expand_frontier(second, 2, &mut visited, &mut edges, &mut seen);
        assert_eq!(next, vec![c]);
        assert_eq!(visited[&c], 2);
        assert_eq!(visited[&a], 1);
        assert_eq!(edges.len(), 4);
    }
}
