//! Ring protection - ERPS-style blocking and failover of ring protection links
//!
//! Only the resulting link states are modelled: an RPL is either `blocking`
//! (standing by) or `up` (forwarding after a failover). There are no
//! protocol timers; failover is non-revertive and only undo re-blocks the RPL.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::commands::UpdateLinkStatus;
use crate::model::{Link, LinkStatus, Ring, TopologySnapshot};
use crate::store::TopologyStore;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum RingState {
    /// RPL blocked, ring forwarding on its normal path
    Idle,
    /// RPL forwarding, a ring segment has failed
    Protecting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RingStatus {
    pub ring_id: String,
    pub rpl_link_id: String,
    pub rpl_status: LinkStatus,
    pub state: RingState,
}

/// Ring protection engine
pub struct RingProtection;

impl RingProtection {
    /// Force every RPL that is not already blocking into `blocking`.
    ///
    /// Runs at startup and after a snapshot restore. The change bypasses the
    /// command history. Returns one event message per re-blocked RPL.
    pub async fn initialize_rings(store: &dyn TopologyStore) -> Result<Vec<String>> {
        let mut messages = Vec::new();

        for ring in store.list_rings().await? {
            let rpl = store.get_link(&ring.rpl_link_id).await?;
            if rpl.status == LinkStatus::Blocking {
                continue;
            }

            store.set_link_status(&rpl.id, LinkStatus::Blocking).await?;
            tracing::info!(
                "[ERPS] ring '{}': RPL '{}' set to blocking (was {})",
                ring.id,
                rpl.id,
                rpl.status
            );
            messages.push(format!("ERPS: RPL {} of ring {} set to blocking", rpl.id, ring.name));
        }

        Ok(messages)
    }

    /// The ring whose members include both endpoints of `link`
    pub fn find_ring_for_link<'a>(rings: &'a [Ring], link: &Link) -> Option<&'a Ring> {
        rings.iter().find(|ring| ring.spans(link))
    }

    /// Build the command that unblocks the RPL protecting `broken_link_id`.
    ///
    /// Returns `None` when the link is outside every ring, is itself the RPL,
    /// or the RPL is not currently blocking. The command is not executed.
    pub async fn failover_command(
        store: &dyn TopologyStore,
        broken_link_id: &str,
    ) -> Result<Option<UpdateLinkStatus>> {
        let link = store.get_link(broken_link_id).await?;
        let rings = store.list_rings().await?;

        let Some(ring) = Self::find_ring_for_link(&rings, &link) else {
            return Ok(None);
        };

        if ring.rpl_link_id == link.id {
            tracing::warn!(
                "[ERPS] RPL '{}' of ring '{}' failed, no protection available",
                link.id,
                ring.id
            );
            return Ok(None);
        }

        let rpl = store.get_link(&ring.rpl_link_id).await?;
        if rpl.status != LinkStatus::Blocking {
            tracing::debug!(
                "[ERPS] ring '{}' already protecting (RPL '{}' is {})",
                ring.id,
                rpl.id,
                rpl.status
            );
            return Ok(None);
        }

        tracing::info!(
            "[ERPS] failure of '{}' in ring '{}', unblocking RPL '{}'",
            link.id,
            ring.id,
            rpl.id
        );
        Ok(Some(UpdateLinkStatus::new(rpl.id, LinkStatus::Up)))
    }

    /// Derive the protection state of every ring
    pub fn ring_states(topology: &TopologySnapshot) -> Vec<RingStatus> {
        topology
            .rings
            .iter()
            .filter_map(|ring| {
                let rpl = topology.links.iter().find(|l| l.id == ring.rpl_link_id)?;
                let state = if rpl.status.is_forwarding() {
                    RingState::Protecting
                } else {
                    RingState::Idle
                };
                Some(RingStatus {
                    ring_id: ring.id.clone(),
                    rpl_link_id: rpl.id.clone(),
                    rpl_status: rpl.status,
                    state,
                })
            })
            .collect()
    }

    /// Event messages for rings whose state differs from `previous`
    pub fn transitions(previous: &[RingStatus], current: &[RingStatus]) -> Vec<String> {
        current
            .iter()
            .filter(|now| {
                previous
                    .iter()
                    .find(|before| before.ring_id == now.ring_id)
                    .map_or(true, |before| before.state != now.state)
            })
            .map(|now| match now.state {
                RingState::Protecting => format!(
                    "ERPS: ring {} protecting, RPL {} forwarding",
                    now.ring_id, now.rpl_link_id
                ),
                RingState::Idle => format!(
                    "ERPS: ring {} idle, RPL {} {}",
                    now.ring_id, now.rpl_link_id, now.rpl_status
                ),
            })
            .collect()
    }
}
