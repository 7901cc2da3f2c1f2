//! Store methods for referral agents.

use super::{label, SqliteStore};
use crate::{
    agent::{Agent, AgentFilter, AgentPatch, AgentStatus},
    error::{CompError, CompResult},
    ports::AgentStore,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const AGENT_COLUMNS: &str = "agent_id, name, region, tier, tier_points, status, joined_at,
     last_active_at, experience_score, network_score, total_revenue,
     total_commission, total_conversions";

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        agent_id:          row.get(0)?,
        name:              row.get(1)?,
        region:            row.get(2)?,
        tier:              label(row, 3)?,
        tier_points:       row.get(4)?,
        status:            label(row, 5)?,
        joined_at:         row.get(6)?,
        last_active_at:    row.get(7)?,
        experience_score:  row.get(8)?,
        network_score:     row.get(9)?,
        total_revenue:     row.get(10)?,
        total_commission:  row.get(11)?,
        total_conversions: row.get(12)?,
    })
}

pub(super) fn fetch_agent(conn: &Connection, agent_id: &str) -> CompResult<Option<Agent>> {
    let agent = conn
        .query_row(
            &format!("SELECT {AGENT_COLUMNS} FROM agent WHERE agent_id = ?1"),
            params![agent_id],
            agent_from_row,
        )
        .optional()?;
    Ok(agent)
}

impl SqliteStore {
    /// Insert or fully replace an agent record.
    pub fn upsert_agent(&self, a: &Agent) -> CompResult<()> {
        self.conn()?.execute(
            "INSERT INTO agent (
                agent_id, name, region, tier, tier_points, status, joined_at,
                last_active_at, experience_score, network_score, total_revenue,
                total_commission, total_conversions
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT (agent_id) DO UPDATE SET
                name = excluded.name, region = excluded.region, tier = excluded.tier,
                tier_points = excluded.tier_points, status = excluded.status,
                joined_at = excluded.joined_at, last_active_at = excluded.last_active_at,
                experience_score = excluded.experience_score,
                network_score = excluded.network_score,
                total_revenue = excluded.total_revenue,
                total_commission = excluded.total_commission,
                total_conversions = excluded.total_conversions",
            params![
                &a.agent_id,
                &a.name,
                &a.region,
                a.tier.as_str(),
                a.tier_points,
                a.status.as_str(),
                a.joined_at,
                a.last_active_at,
                a.experience_score,
                a.network_score,
                a.total_revenue,
                a.total_commission,
                a.total_conversions,
            ],
        )?;
        Ok(())
    }
}

impl AgentStore for SqliteStore {
    fn get(&self, agent_id: &str) -> CompResult<Option<Agent>> {
        let conn = self.conn()?;
        fetch_agent(&conn, agent_id)
    }

    fn update(&self, agent_id: &str, patch: &AgentPatch) -> CompResult<Agent> {
        let conn = self.conn()?;
        let mut agent = fetch_agent(&conn, agent_id)?
            .ok_or_else(|| CompError::not_found("agent", agent_id))?;

        if let Some(tier) = patch.tier {
            agent.tier = tier;
        }
        if let Some(status) = patch.status {
            agent.status = status;
        }
        if let Some(at) = patch.last_active_at {
            agent.last_active_at = Some(at);
        }

        conn.execute(
            "UPDATE agent SET tier = ?1, status = ?2, last_active_at = ?3 WHERE agent_id = ?4",
            params![
                agent.tier.as_str(),
                agent.status.as_str(),
                agent.last_active_at,
                agent_id,
            ],
        )?;
        Ok(agent)
    }

    fn find_active(&self, filter: &AgentFilter) -> CompResult<Vec<Agent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agent WHERE status = ?1 ORDER BY agent_id ASC"
        ))?;
        let agents = stmt
            .query_map(params![AgentStatus::Active.as_str()], agent_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(agents.into_iter().filter(|a| filter.matches(a)).collect())
    }
}
