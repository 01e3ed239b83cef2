//! DuckDB review store.
//!
//! Two tables: `reviews` holds one row per completed review with the summary,
//! run metadata, and full flag list as JSON; `review_flags` holds one row per
//! flag carrying the reviewer's decision. Supports in-memory (ephemeral) and
//! file-backed modes.

use std::path::Path;

use chrono::Utc;
use duckdb::{Connection, params};
use redline_core::{Classification, Flag, Severity};
use tracing::{debug, info};

use crate::StoreError;
use crate::record::{FlagAction, NewReview, ReviewAction, ReviewListing, ReviewRecord};
use crate::stats::{PortfolioStats, RuleEffectiveness, portfolio_stats, rule_effectiveness};

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS reviews_id_seq START 1;

CREATE TABLE IF NOT EXISTS reviews (
    id BIGINT PRIMARY KEY DEFAULT nextval('reviews_id_seq'),
    contract_name VARCHAR NOT NULL,
    date VARCHAR NOT NULL,
    reviewer VARCHAR DEFAULT '',
    status VARCHAR DEFAULT 'completed',
    analysis_mode VARCHAR DEFAULT 'hybrid',
    summary_json VARCHAR NOT NULL,
    metadata_json VARCHAR NOT NULL,
    flags_json VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS review_flags (
    review_id BIGINT NOT NULL,
    flag_id VARCHAR NOT NULL,
    classification VARCHAR NOT NULL,
    risk_level VARCHAR NOT NULL,
    confidence DOUBLE DEFAULT 0.5,
    reviewer_action VARCHAR DEFAULT 'pending',
    reviewer_note VARCHAR DEFAULT '',
    reviewer_name VARCHAR DEFAULT '',
    action_timestamp VARCHAR
);
";

pub struct ReviewStore {
    conn: Connection,
}

impl ReviewStore {
    /// Open an in-memory store.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a store file at `path`.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened review store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Persist a review and one pending feedback row per flag. Returns the review id.
    pub fn save_review(&mut self, review: &NewReview<'_>) -> Result<i64, StoreError> {
        let summary_json = serde_json::to_string(review.summary)?;
        let metadata_json = serde_json::to_string(&review.metadata)?;
        let flags_json = serde_json::to_string(review.flags)?;
        let date = Utc::now().to_rfc3339();

        let tx = self.conn.transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO reviews (contract_name, date, reviewer, analysis_mode,
                                  summary_json, metadata_json, flags_json)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
            params![
                review.contract_name,
                date,
                review.reviewer,
                review.analysis_mode,
                summary_json,
                metadata_json,
                flags_json
            ],
            |row| row.get(0),
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO review_flags (review_id, flag_id, classification, risk_level, confidence)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for f in review.flags {
                stmt.execute(params![
                    id,
                    f.flag_id,
                    f.classification.as_str(),
                    f.risk_level.as_str(),
                    f64::from(f.confidence)
                ])?;
            }
        }
        tx.commit()?;

        info!(id, contract = review.contract_name, flags = review.flags.len(), "saved review");
        Ok(id)
    }

    /// All reviews, newest first.
    pub fn list_reviews(&self) -> Result<Vec<ReviewListing>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, contract_name, date, reviewer, status, analysis_mode
             FROM reviews ORDER BY date DESC, id DESC",
        )?;
        let rows = stmt.query_map([], listing_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_review(&self, review_id: i64) -> Result<ReviewRecord, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, contract_name, date, reviewer, status, analysis_mode,
                    summary_json, metadata_json, flags_json
             FROM reviews WHERE id = ?",
        )?;
        let mut rows = stmt.query_map([review_id], |row| {
            Ok((
                listing_row(row)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;
        let (listing, summary, metadata, flags) = rows
            .next()
            .transpose()?
            .ok_or(StoreError::ReviewNotFound(review_id))?;

        Ok(ReviewRecord {
            listing,
            summary: serde_json::from_str(&summary)?,
            metadata: serde_json::from_str(&metadata)?,
            flags: serde_json::from_str(&flags)?,
        })
    }

    /// Feedback rows of one review, ordered by flag id.
    pub fn get_review_flags(&self, review_id: i64) -> Result<Vec<FlagAction>, StoreError> {
        self.flag_actions(Some(review_id))
    }

    fn flag_actions(&self, review_id: Option<i64>) -> Result<Vec<FlagAction>, StoreError> {
        let sql = format!(
            "SELECT review_id, flag_id, classification, risk_level, confidence,
                    reviewer_action, reviewer_note, reviewer_name, action_timestamp
             FROM review_flags {}
             ORDER BY review_id, flag_id",
            if review_id.is_some() { "WHERE review_id = ?" } else { "" }
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match review_id {
            Some(id) => stmt.query_map([id], flag_action_row)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], flag_action_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    /// Record a reviewer decision. Returns false if no such flag exists.
    pub fn update_flag_action(
        &self,
        review_id: i64,
        flag_id: &str,
        action: ReviewAction,
        note: &str,
        reviewer_name: &str,
    ) -> Result<bool, StoreError> {
        let updated = self.conn.execute(
            "UPDATE review_flags
             SET reviewer_action = ?, reviewer_note = ?, reviewer_name = ?, action_timestamp = ?
             WHERE review_id = ? AND flag_id = ?",
            params![
                action.as_str(),
                note,
                reviewer_name,
                Utc::now().to_rfc3339(),
                review_id,
                flag_id
            ],
        )?;
        debug!(review_id, flag_id, action = %action, updated, "updated flag action");
        Ok(updated > 0)
    }

    /// Apply one decision to many flags. Notes are left unchanged. Returns
    /// the number of flags updated.
    pub fn bulk_update_flags(
        &mut self,
        review_id: i64,
        flag_ids: &[&str],
        action: ReviewAction,
        reviewer_name: &str,
    ) -> Result<usize, StoreError> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE review_flags
                 SET reviewer_action = ?, reviewer_name = ?, action_timestamp = ?
                 WHERE review_id = ? AND flag_id = ?",
            )?;
            for flag_id in flag_ids {
                count += stmt.execute(params![action.as_str(), reviewer_name, now, review_id, flag_id])?;
            }
        }
        tx.commit()?;
        info!(review_id, count, action = %action, "bulk updated flags");
        Ok(count)
    }

    fn all_flags(&self) -> Result<Vec<(i64, Vec<Flag>)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, flags_json FROM reviews ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, json)| -> Result<_, StoreError> { Ok((id, serde_json::from_str(&json)?)) })
            .collect()
    }

    pub fn review_stats(&self) -> Result<PortfolioStats, StoreError> {
        let reviews = self.all_flags()?;
        Ok(portfolio_stats(reviews.iter().map(|(_, f)| f.as_slice())))
    }

    pub fn rule_effectiveness(&self) -> Result<Vec<RuleEffectiveness>, StoreError> {
        let reviews = self.all_flags()?;
        let actions = self.flag_actions(None)?;
        Ok(rule_effectiveness(
            reviews.iter().map(|(id, f)| (*id, f.as_slice())),
            &actions,
        ))
    }
}

/// Maps the first six columns of a `reviews` query.
fn listing_row(row: &duckdb::Row<'_>) -> duckdb::Result<ReviewListing> {
    Ok(ReviewListing {
        id: row.get(0)?,
        contract_name: row.get(1)?,
        date: row.get(2)?,
        reviewer: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        status: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        analysis_mode: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

fn flag_action_row(row: &duckdb::Row<'_>) -> duckdb::Result<FlagAction> {
    let class: String = row.get(2)?;
    let risk: String = row.get(3)?;
    let action: Option<String> = row.get(5)?;
    Ok(FlagAction {
        review_id: row.get(0)?,
        flag_id: row.get(1)?,
        classification: Classification::parse_lenient(&class),
        risk_level: Severity::parse_lenient(&risk),
        confidence: row.get::<_, Option<f64>>(4)?.unwrap_or(0.5) as f32,
        action: action
            .as_deref()
            .and_then(|a| a.parse().ok())
            .unwrap_or_default(),
        note: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        reviewer_name: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        action_timestamp: row.get(8)?,
    })
}
