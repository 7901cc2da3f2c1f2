//! Store methods for leads.

use super::{label, placeholders, SqliteStore};
use crate::{
    error::CompResult,
    lead::{Lead, LeadFilter},
    ports::LeadStore,
};
use rusqlite::{params, types::ToSql, OptionalExtension, Row};

const LEAD_COLUMNS: &str = "lead_id, agent_id, status, temperature, urgency, estimated_value,
     interaction_count, last_contact_date, assigned_at, close_date";

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        lead_id:           row.get(0)?,
        agent_id:          row.get(1)?,
        status:            label(row, 2)?,
        temperature:       label(row, 3)?,
        urgency:           label(row, 4)?,
        estimated_value:   row.get(5)?,
        interaction_count: row.get(6)?,
        last_contact_date: row.get(7)?,
        assigned_at:       row.get(8)?,
        close_date:        row.get(9)?,
    })
}

/// WHERE clause and bound values for a lead filter.
fn lead_where(filter: &LeadFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(agent_id) = &filter.agent_id {
        values.push(Box::new(agent_id.clone()));
        clauses.push(format!("agent_id = ?{}", values.len()));
    }
    if let Some(statuses) = &filter.statuses {
        if statuses.is_empty() {
            clauses.push("0".to_string());
        } else {
            clauses.push(format!("status IN ({})", placeholders(values.len() + 1, statuses.len())));
            values.extend(statuses.iter().map(|s| Box::new(s.as_str()) as Box<dyn ToSql>));
        }
    }
    if let Some(from) = filter.assigned_from {
        values.push(Box::new(from));
        clauses.push(format!("assigned_at >= ?{}", values.len()));
    }
    if let Some(to) = filter.assigned_to {
        values.push(Box::new(to));
        clauses.push(format!("assigned_at < ?{}", values.len()));
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (sql, values)
}

impl SqliteStore {
    /// Insert or fully replace a lead record.
    pub fn upsert_lead(&self, l: &Lead) -> CompResult<()> {
        self.conn()?.execute(
            "INSERT INTO lead (
                lead_id, agent_id, status, temperature, urgency, estimated_value,
                interaction_count, last_contact_date, assigned_at, close_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (lead_id) DO UPDATE SET
                agent_id = excluded.agent_id, status = excluded.status,
                temperature = excluded.temperature, urgency = excluded.urgency,
                estimated_value = excluded.estimated_value,
                interaction_count = excluded.interaction_count,
                last_contact_date = excluded.last_contact_date,
                assigned_at = excluded.assigned_at, close_date = excluded.close_date",
            params![
                &l.lead_id,
                &l.agent_id,
                l.status.as_str(),
                l.temperature.as_str(),
                l.urgency.as_str(),
                l.estimated_value,
                l.interaction_count,
                l.last_contact_date,
                l.assigned_at,
                l.close_date,
            ],
        )?;
        Ok(())
    }
}

impl LeadStore for SqliteStore {
    fn get(&self, lead_id: &str) -> CompResult<Option<Lead>> {
        let lead = self
            .conn()?
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM lead WHERE lead_id = ?1"),
                params![lead_id],
                lead_from_row,
            )
            .optional()?;
        Ok(lead)
    }

    fn find(&self, filter: &LeadFilter) -> CompResult<Vec<Lead>> {
        let (where_sql, values) = lead_where(filter);
        let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {LEAD_COLUMNS} FROM lead {where_sql} ORDER BY lead_id ASC"
        ))?;
        let leads = stmt
            .query_map(refs.as_slice(), lead_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leads)
    }

    fn count_by_agent(&self, agent_id: &str, filter: &LeadFilter) -> CompResult<u32> {
        let scoped = LeadFilter { agent_id: Some(agent_id.to_string()), ..filter.clone() };
        let (where_sql, values) = lead_where(&scoped);
        let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let count: i64 = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM lead {where_sql}"),
            refs.as_slice(),
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}
