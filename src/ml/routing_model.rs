/*!
 * # Hub Routing Model
 *
 * Assigns incoming returns to processing hubs by declared capacity. Every item
 * goes to the largest hub that still reports capacity; capacities are a static
 * ranking and are not consumed by assignment. When no hub has capacity, items
 * fall back to the first listed hub.
 */

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::models::ReturnRecord;

/// Processing hub and the number of items it can still accept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubCapacity {
    pub hub_id: String,
    pub capacity: u32,
}

/// SKUs routed to one hub, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubAllocation {
    pub hub_id: String,
    pub skus: Vec<String>,
}

/// Capacity-first hub router
#[derive(Debug, Clone, Copy, Default)]
pub struct HubRoutingModel;

impl HubRoutingModel {
    pub fn new() -> Self {
        Self
    }

    /// Route every item to a hub.
    ///
    /// The result lists every hub in input order, including hubs that received
    /// nothing. Fails when `hubs` is empty or repeats a hub id.
    pub fn assign(
        &self,
        items: &[ReturnRecord],
        hubs: &[HubCapacity],
    ) -> Result<Vec<HubAllocation>, ServiceError> {
        if hubs.is_empty() {
            return Err(ServiceError::ValidationError(
                "No hubs available for assignment".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = hubs.iter().find(|hub| !seen.insert(hub.hub_id.as_str())) {
            return Err(ServiceError::invalid_field(
                "hub_id",
                &format!("duplicate hub id {}", duplicate.hub_id),
            ));
        }

        let mut allocations: Vec<HubAllocation> = hubs
            .iter()
            .map(|hub| HubAllocation {
                hub_id: hub.hub_id.clone(),
                skus: Vec::new(),
            })
            .collect();
        let target = match Self::largest_available(hubs) {
            Some(index) => index,
            None => {
                if !items.is_empty() {
                    warn!(
                        items = items.len(),
                        hub = %hubs[0].hub_id,
                        "no hub reports capacity, routing items to first hub"
                    );
                }
                0
            }
        };
        for item in items {
            allocations[target].skus.push(item.sku.clone());
        }

        debug!(items = items.len(), hubs = hubs.len(), "hub assignment complete");
        Ok(allocations)
    }

    /// Index of the hub with the largest non-zero capacity; the earliest wins ties.
    fn largest_available(hubs: &[HubCapacity]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, hub) in hubs.iter().enumerate() {
            if hub.capacity == 0 {
                continue;
            }
            if best.map_or(true, |b| hub.capacity > hubs[b].capacity) {
                best = Some(index);
            }
        }
        best
    }
}
