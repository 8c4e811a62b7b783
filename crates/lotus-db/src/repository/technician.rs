//! # Technician Repository
//!
//! CRUD for technicians plus skill-input resolution.
//!
//! ## Skill Resolution
//! Upstream clients historically sent skills as a mix of service item ids
//! and service names. That ambiguity is resolved exactly once, here, at
//! write time: each entry is looked up as an id first, then as a name.
//! Only canonical ids reach the `skills` column, so availability matching
//! stays a plain set lookup.

use chrono::Utc;
use sqlx::{SqlitePool, SqliteExecutor};
use uuid::Uuid;

use lotus_core::types::{SkillSet, Technician, TechnicianStatus};
use lotus_core::validation::validate_name;

use crate::error::{DbError, DbResult};

/// Repository for technician operations.
#[derive(Debug, Clone)]
pub struct TechnicianRepository {
    pool: SqlitePool,
}

impl TechnicianRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TechnicianRepository { pool }
    }

    /// Creates a technician. `raw_skills` may mix service ids and service
    /// names; unknown entries are rejected.
    pub async fn create(&self, name: &str, raw_skills: &[String]) -> DbResult<Technician> {
        validate_name(name).map_err(|e| DbError::InvalidInput(e.to_string()))?;
        let skills = self.resolve_skills(raw_skills).await?;

        let technician = Technician {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            skills,
            status: TechnicianStatus::Free,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO technicians (id, name, skills, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&technician.id)
        .bind(&technician.name)
        .bind(&technician.skills)
        .bind(technician.status)
        .bind(technician.created_at)
        .bind(technician.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(technician)
    }

    /// Resolves mixed id/name skill input to a canonical id set.
    ///
    /// Lookup order: service item id first, then service name. An entry
    /// matching neither is an error; silently dropping it would let a
    /// typo erase a skill.
    pub async fn resolve_skills(&self, raw: &[String]) -> DbResult<SkillSet> {
        let mut skills = SkillSet::new();

        for entry in raw {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let by_id: Option<String> =
                sqlx::query_scalar("SELECT id FROM service_items WHERE id = ?")
                    .bind(entry)
                    .fetch_optional(&self.pool)
                    .await?;

            let resolved = match by_id {
                Some(id) => Some(id),
                None => {
                    sqlx::query_scalar("SELECT id FROM service_items WHERE name = ?")
                        .bind(entry)
                        .fetch_optional(&self.pool)
                        .await?
                }
            };

            match resolved {
                Some(id) => skills.insert(id),
                None => return Err(DbError::not_found("service item", entry)),
            }
        }

        Ok(skills)
    }

    /// Fetches a technician by id.
    pub async fn get(&self, id: &str) -> DbResult<Technician> {
        self.get_optional(id)
            .await?
            .ok_or_else(|| DbError::not_found("technician", id))
    }

    /// Fetches a technician by id, returning None if missing.
    pub async fn get_optional(&self, id: &str) -> DbResult<Option<Technician>> {
        let technician = sqlx::query_as::<_, Technician>(
            "SELECT * FROM technicians WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(technician)
    }

    /// Lists all technicians, newest first.
    pub async fn list(&self) -> DbResult<Vec<Technician>> {
        let technicians = sqlx::query_as::<_, Technician>(
            "SELECT * FROM technicians ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(technicians)
    }

    /// Replaces a technician's skill set (same mixed-input resolution as
    /// [`TechnicianRepository::create`]).
    pub async fn update_skills(&self, id: &str, raw_skills: &[String]) -> DbResult<Technician> {
        let skills = self.resolve_skills(raw_skills).await?;

        let result = sqlx::query(
            "UPDATE technicians SET skills = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&skills)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("technician", id));
        }

        self.get(id).await
    }

    /// Sets the duty status.
    pub async fn set_status(&self, id: &str, status: TechnicianStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE technicians SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("technician", id));
        }

        Ok(())
    }

    /// Deletes the technician row. Runs on the caller's executor so the
    /// booking service can pair it with the waitlist transition in one
    /// transaction.
    pub async fn delete<'e, E>(&self, executor: E, id: &str) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM technicians WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("technician", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
