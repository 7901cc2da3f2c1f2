//! Store methods for externally delivered quality figures.

use super::SqliteStore;
use crate::{
    error::CompResult,
    performance::{PeriodRange, QualityMetrics},
    ports::QualitySource,
    types::Timestamp,
};
use rusqlite::{params, OptionalExtension};

impl SqliteStore {
    /// Record a quality measurement for an agent.
    pub fn insert_quality(
        &self,
        agent_id:    &str,
        measured_at: Timestamp,
        quality:     &QualityMetrics,
    ) -> CompResult<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO agent_quality (
                agent_id, measured_at, customer_satisfaction, retention_rate,
                average_response_hours
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                agent_id,
                measured_at,
                quality.customer_satisfaction,
                quality.retention_rate,
                quality.average_response_hours,
            ],
        )?;
        Ok(())
    }
}

/// The latest measurement taken before the period ends. Agents with no
/// measurements report zeros.
impl QualitySource for SqliteStore {
    fn quality_metrics(&self, agent_id: &str, period: &PeriodRange) -> CompResult<QualityMetrics> {
        let quality = self
            .conn()?
            .query_row(
                "SELECT customer_satisfaction, retention_rate, average_response_hours
                 FROM agent_quality
                 WHERE agent_id = ?1 AND measured_at < ?2
                 ORDER BY measured_at DESC LIMIT 1",
                params![agent_id, period.end],
                |row| {
                    Ok(QualityMetrics {
                        customer_satisfaction:  row.get(0)?,
                        retention_rate:         row.get(1)?,
                        average_response_hours: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(quality.unwrap_or_default())
    }
}
