//! # Member Repository
//!
//! Members, prepaid balances and tier bookkeeping.
//!
//! Balance mutations that belong to a settlement run on the caller's
//! executor; standalone operations (top-up) manage their own atomicity
//! with single UPDATE statements.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use lotus_core::money::Money;
use lotus_core::types::{Member, MemberTier};
use lotus_core::validation::{validate_name, validate_phone};

use crate::error::{DbError, DbResult};

/// Repository for member operations.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MemberRepository { pool }
    }

    /// Creates a member. The referrer, when given, must already exist;
    /// referral chains are therefore acyclic by construction.
    pub async fn create(
        &self,
        name: &str,
        phone: &str,
        referrer_id: Option<&str>,
    ) -> DbResult<Member> {
        validate_name(name).map_err(|e| DbError::InvalidInput(e.to_string()))?;
        validate_phone(phone).map_err(|e| DbError::InvalidInput(e.to_string()))?;

        if let Some(referrer) = referrer_id {
            self.get(referrer).await?;
        }

        let member = Member {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
            tier: MemberTier::Basic,
            yearly_spend_cents: 0,
            balance_cents: 0,
            referrer_id: referrer_id.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO members
                (id, name, phone, tier, yearly_spend_cents, balance_cents,
                 referrer_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&member.id)
        .bind(&member.name)
        .bind(&member.phone)
        .bind(member.tier)
        .bind(member.yearly_spend_cents)
        .bind(member.balance_cents)
        .bind(&member.referrer_id)
        .bind(member.created_at)
        .bind(member.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(member)
    }

    /// Fetches a member by id.
    pub async fn get(&self, id: &str) -> DbResult<Member> {
        self.get_optional(id)
            .await?
            .ok_or_else(|| DbError::not_found("member", id))
    }

    /// Fetches a member by id, returning None if missing.
    pub async fn get_optional(&self, id: &str) -> DbResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(member)
    }

    /// Fetches a member by phone number.
    pub async fn get_by_phone(&self, phone: &str) -> DbResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE phone = ?")
            .bind(phone.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(member)
    }

    /// Fetches a member on the caller's executor. Settlement re-reads the
    /// member inside its write transaction so the balance it checks is
    /// the balance it debits.
    pub async fn get_with<'e, E>(&self, executor: E, id: &str) -> DbResult<Member>
    where
        E: SqliteExecutor<'e>,
    {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        member.ok_or_else(|| DbError::not_found("member", id))
    }

    /// Adds to the prepaid balance (top-up or commission credit).
    /// A single UPDATE, safe to run on any executor.
    pub async fn credit_balance<'e, E>(&self, executor: E, id: &str, amount: Money) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE members SET balance_cents = balance_cents + ?, updated_at = ? WHERE id = ?",
        )
        .bind(amount.cents())
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("member", id));
        }

        Ok(())
    }

    /// Writes settlement results: new balance, accumulated spend and the
    /// (possibly upgraded) tier. The caller computed all three from a
    /// member row read in the same transaction.
    pub async fn apply_settlement<'e, E>(
        &self,
        executor: E,
        id: &str,
        balance: Money,
        yearly_spend: Money,
        tier: MemberTier,
    ) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE members
            SET balance_cents = ?, yearly_spend_cents = ?, tier = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(balance.cents())
        .bind(yearly_spend.cents())
        .bind(tier)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("member", id));
        }

        Ok(())
    }

    /// Lists all members, newest first.
    pub async fn list(&self) -> DbResult<Vec<Member>> {
        let members =
            sqlx::query_as::<_, Member>("SELECT * FROM members ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(members)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
