//! Store methods for the commission ledger and payout batches.

use super::{agent::fetch_agent, is_constraint_violation, is_unique_violation, json, label, placeholders, SqliteStore};
use crate::{
    agent::{Agent, AgentCredit},
    commission::{CommissionAward, CommissionFilter, CommissionStatus},
    error::{CompError, CompResult},
    payout::PayoutBatch,
    ports::CommissionLedger,
    types::Timestamp,
};
use rusqlite::{params, types::ToSql, OptionalExtension, Row};

const COMMISSION_COLUMNS: &str = "commission_id, agent_id, lead_id, base_amount, rate,
     base_commission, tier, tier_multiplier, bonuses, penalties, total_amount, status,
     created_at, updated_at, payout_date, batch_id";

fn commission_from_row(row: &Row<'_>) -> rusqlite::Result<CommissionAward> {
    Ok(CommissionAward {
        commission_id:   row.get(0)?,
        agent_id:        row.get(1)?,
        lead_id:         row.get(2)?,
        base_amount:     row.get(3)?,
        rate:            row.get(4)?,
        base_commission: row.get(5)?,
        tier:            label(row, 6)?,
        tier_multiplier: row.get(7)?,
        bonuses:         json(row, 8)?,
        penalties:       json(row, 9)?,
        total_amount:    row.get(10)?,
        status:          label(row, 11)?,
        created_at:      row.get(12)?,
        updated_at:      row.get(13)?,
        payout_date:     row.get(14)?,
        batch_id:        row.get(15)?,
    })
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<PayoutBatch> {
    Ok(PayoutBatch {
        batch_id:       row.get(0)?,
        agent_id:       row.get(1)?,
        period:         row.get(2)?,
        commission_ids: json(row, 3)?,
        gross_amount:   row.get(4)?,
        fees:           json(row, 5)?,
        fee_total:      row.get(6)?,
        net_amount:     row.get(7)?,
        status:         label(row, 8)?,
        created_at:     row.get(9)?,
    })
}

/// WHERE clause and bound values for a commission filter.
fn commission_where(filter: &CommissionFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(agent_id) = &filter.agent_id {
        values.push(Box::new(agent_id.clone()));
        clauses.push(format!("agent_id = ?{}", values.len()));
    }
    if let Some(lead_id) = &filter.lead_id {
        values.push(Box::new(lead_id.clone()));
        clauses.push(format!("lead_id = ?{}", values.len()));
    }
    if let Some(statuses) = &filter.statuses {
        if statuses.is_empty() {
            clauses.push("0".to_string());
        } else {
            clauses.push(format!("status IN ({})", placeholders(values.len() + 1, statuses.len())));
            values.extend(statuses.iter().map(|s| Box::new(s.as_str()) as Box<dyn ToSql>));
        }
    }
    if let Some(due) = filter.payout_due_by {
        values.push(Box::new(due));
        clauses.push(format!("payout_date <= ?{}", values.len()));
    }
    if let Some(from) = filter.created_from {
        values.push(Box::new(from));
        clauses.push(format!("created_at >= ?{}", values.len()));
    }
    if let Some(to) = filter.created_to {
        values.push(Box::new(to));
        clauses.push(format!("created_at < ?{}", values.len()));
    }
    if filter.unbatched_only {
        clauses.push("batch_id IS NULL".to_string());
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (sql, values)
}

fn conflict(batch: &PayoutBatch) -> CompError {
    CompError::ConcurrencyConflict {
        agent_id: batch.agent_id.clone(),
        period:   batch.period.clone(),
    }
}

impl CommissionLedger for SqliteStore {
    fn insert(&self, a: &CommissionAward, credit: &AgentCredit) -> CompResult<Agent> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO commission (
                commission_id, agent_id, lead_id, base_amount, rate, base_commission,
                tier, tier_multiplier, bonuses, penalties, total_amount, status,
                created_at, updated_at, payout_date, batch_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                &a.commission_id,
                &a.agent_id,
                &a.lead_id,
                a.base_amount,
                a.rate,
                a.base_commission,
                a.tier.as_str(),
                a.tier_multiplier,
                serde_json::to_string(&a.bonuses)?,
                serde_json::to_string(&a.penalties)?,
                a.total_amount,
                a.status.as_str(),
                a.created_at,
                a.updated_at,
                a.payout_date,
                &a.batch_id,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(CompError::Validation(format!(
                    "lead {} already has an active commission",
                    a.lead_id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let credited = tx.execute(
            "UPDATE agent SET
                total_revenue     = ROUND(total_revenue + ?1, 2),
                total_commission  = ROUND(total_commission + ?2, 2),
                tier_points       = tier_points + ?3,
                total_conversions = total_conversions + ?4,
                last_active_at    = ?5
             WHERE agent_id = ?6",
            params![
                credit.revenue,
                credit.commission,
                credit.tier_points,
                credit.conversions,
                credit.active_at,
                &a.agent_id,
            ],
        )?;
        if credited != 1 {
            // Dropping `tx` rolls the award back with the credit.
            return Err(CompError::not_found("agent", &a.agent_id));
        }

        let agent = fetch_agent(&tx, &a.agent_id)?
            .ok_or_else(|| CompError::not_found("agent", &a.agent_id))?;
        tx.commit()?;
        Ok(agent)
    }

    fn get(&self, commission_id: &str) -> CompResult<Option<CommissionAward>> {
        let award = self
            .conn()?
            .query_row(
                &format!("SELECT {COMMISSION_COLUMNS} FROM commission WHERE commission_id = ?1"),
                params![commission_id],
                commission_from_row,
            )
            .optional()?;
        Ok(award)
    }

    fn find(&self, filter: &CommissionFilter) -> CompResult<Vec<CommissionAward>> {
        let (where_sql, values) = commission_where(filter);
        let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commission {where_sql}
             ORDER BY created_at ASC, commission_id ASC"
        ))?;
        let awards = stmt
            .query_map(refs.as_slice(), commission_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(awards)
    }

    fn update_status(
        &self,
        commission_id: &str,
        status: CommissionStatus,
        at: Timestamp,
    ) -> CompResult<()> {
        let changed = self.conn()?.execute(
            "UPDATE commission SET status = ?1, updated_at = ?2 WHERE commission_id = ?3",
            params![status.as_str(), at, commission_id],
        )?;
        if changed == 0 {
            return Err(CompError::not_found("commission", commission_id));
        }
        Ok(())
    }

    fn record_payout_batch(&self, batch: &PayoutBatch) -> CompResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO payout_batch (
                batch_id, agent_id, period, commission_ids, gross_amount, fees,
                fee_total, net_amount, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &batch.batch_id,
                &batch.agent_id,
                &batch.period,
                serde_json::to_string(&batch.commission_ids)?,
                batch.gross_amount,
                serde_json::to_string(&batch.fees)?,
                batch.fee_total,
                batch.net_amount,
                batch.status.as_str(),
                batch.created_at,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => return Err(conflict(batch)),
            Err(e) => return Err(e.into()),
        }

        for commission_id in &batch.commission_ids {
            let stamped = tx.execute(
                "UPDATE commission SET batch_id = ?1, updated_at = ?2
                 WHERE commission_id = ?3 AND agent_id = ?4 AND batch_id IS NULL
                   AND status IN ('pending', 'approved')",
                params![&batch.batch_id, batch.created_at, commission_id, &batch.agent_id],
            )?;
            if stamped != 1 {
                // Another run claimed it first; dropping `tx` rolls everything back.
                return Err(conflict(batch));
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn payout_batches(&self, agent_id: &str) -> CompResult<Vec<PayoutBatch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT batch_id, agent_id, period, commission_ids, gross_amount, fees,
                    fee_total, net_amount, status, created_at
             FROM payout_batch WHERE agent_id = ?1
             ORDER BY created_at ASC, batch_id ASC",
        )?;
        let batches = stmt
            .query_map(params![agent_id], batch_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }
}
