use std::collections::BTreeMap;

use ash::vk;

use crate::bootstrap::SelectedDevice;
use crate::concurrency::Slot;
use crate::device::{Queue, QueueInfo, QueueRole};
use crate::driver::QueueCreateDescriptor;
use crate::KwantError;

/// A queue asked for before the logical device exists
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueRequest {
    pub role: QueueRole,
    /// Family to use instead of the role's ideal family
    pub family_override: Option<u32>,
    /// In `[0, 1]`
    pub priority: f32,
}

impl QueueRequest {
    pub fn new(role: QueueRole) -> Self {
        Self {
            role,
            family_override: None,
            priority: 1.0,
        }
    }

    /// Clamped into `[0, 1]`
    pub fn priority(mut self, priority: f32) -> Self {
        self.priority = if priority.is_nan() {
            1.0
        } else {
            priority.clamp(0.0, 1.0)
        };
        self
    }

    pub fn family(mut self, family_index: u32) -> Self {
        self.family_override = Some(family_index);
        self
    }
}

/// Fluent front for [`ResourceRequestLedger::submit`]
#[derive(Debug)]
pub struct QueueRequestBuilder<'a> {
    ledger: &'a mut ResourceRequestLedger,
    request: QueueRequest,
}

impl<'a> QueueRequestBuilder<'a> {
    pub fn new(ledger: &'a mut ResourceRequestLedger, role: QueueRole) -> Self {
        Self {
            ledger,
            request: QueueRequest::new(role),
        }
    }

    pub fn priority(mut self, priority: f32) -> Self {
        self.request = self.request.priority(priority);
        self
    }

    pub fn family(mut self, family_index: u32) -> Self {
        self.request = self.request.family(family_index);
        self
    }

    /// The returned slot is filled with the queue once the device exists
    pub fn submit(self) -> Slot<Queue> {
        self.ledger.submit(self.request)
    }
}

#[derive(Debug)]
struct PendingRequest {
    request: QueueRequest,
    slot: Slot<Queue>,
}

/// Collects queue requests until the logical device is created
#[derive(Debug, Default)]
pub struct ResourceRequestLedger {
    pending: Vec<PendingRequest>,
    /// Set once the requests were handed to device creation
    sealed: bool,
}

impl ResourceRequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never rejects, requests are only validated by [`compact`](Self::compact).
    ///
    /// Requests submitted after compaction can no longer get a queue, their slot never
    /// resolves.
    pub fn submit(&mut self, request: QueueRequest) -> Slot<Queue> {
        let slot = Slot::new();
        if self.sealed {
            tracing::warn!(
                "Queue request {:?} came after device creation and will never resolve",
                request
            );
            return slot;
        }
        self.pending.push(PendingRequest {
            request,
            slot: slot.clone(),
        });
        slot
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Slot of the first pending request which will be placed in `family_index`
    pub fn first_in_family(
        &self,
        device: &SelectedDevice,
        family_index: u32,
    ) -> Option<Slot<Queue>> {
        self.pending
            .iter()
            .find(|pending| target_family(&pending.request, device) == Some(family_index))
            .map(|pending| pending.slot.clone())
    }

    /// Groups every request by family, keeping submission order inside a family.
    ///
    /// Fails without consuming anything if any request cannot be satisfied.
    pub fn compact(&mut self, device: &SelectedDevice) -> crate::Result<CompactedRequests> {
        let mut families: Vec<u32> = Vec::with_capacity(self.pending.len());
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for pending in self.pending.iter() {
            let family_index = target_family(&pending.request, device)
                .ok_or(KwantError::UnsupportedQueueRole(pending.request.role))?;
            let family = device
                .family(family_index)
                .ok_or(KwantError::InvalidQueueFamily(family_index))?;
            let count = counts.entry(family_index).or_insert(0);
            *count += 1;
            if *count > family.queue_count {
                return Err(KwantError::ImpossibleQueue {
                    family_index,
                    requested: *count,
                    available: family.queue_count,
                });
            }
            families.push(family_index);
        }

        let mut groups: BTreeMap<u32, Vec<CompactedEntry>> = BTreeMap::new();
        for (pending, family_index) in std::mem::take(&mut self.pending).into_iter().zip(families) {
            groups.entry(family_index).or_default().push(CompactedEntry {
                request: pending.request,
                slot: pending.slot,
            });
        }
        self.sealed = true;
        tracing::debug!("Queue families requested: {counts:?}");
        Ok(CompactedRequests { groups })
    }
}

/// An explicit override wins over the role's ideal family
fn target_family(request: &QueueRequest, device: &SelectedDevice) -> Option<u32> {
    request
        .family_override
        .or_else(|| device.ideal_family(request.role))
}

#[derive(Debug)]
struct CompactedEntry {
    request: QueueRequest,
    slot: Slot<Queue>,
}

/// Requests grouped per family, ready for device creation
#[derive(Debug)]
pub struct CompactedRequests {
    groups: BTreeMap<u32, Vec<CompactedEntry>>,
}

impl CompactedRequests {
    /// One entry per family, priorities in submission order
    pub fn queue_create_descriptors(&self) -> Vec<QueueCreateDescriptor> {
        self.groups
            .iter()
            .map(|(family_index, entries)| QueueCreateDescriptor {
                family_index: *family_index,
                priorities: entries.iter().map(|entry| entry.request.priority).collect(),
            })
            .collect()
    }

    pub fn family_counts(&self) -> BTreeMap<u32, u32> {
        self.groups
            .iter()
            .map(|(family_index, entries)| (*family_index, entries.len() as u32))
            .collect()
    }

    /// Fills every request's slot with the queue at its (family, sub-index), in grouped order.
    ///
    /// Returns the filled slots.
    pub fn resolve<F>(self, mut fetch: F) -> crate::Result<Vec<Slot<Queue>>>
    where
        F: FnMut(u32, u32) -> crate::Result<vk::Queue>,
    {
        let mut resolved = Vec::new();
        for (family_index, entries) in self.groups {
            for (index, entry) in entries.into_iter().enumerate() {
                let index = index as u32;
                let handle = fetch(family_index, index)?;
                entry.slot.fill(Queue::new(
                    handle,
                    QueueInfo {
                        family_index,
                        index,
                        role: entry.request.role,
                        priority: entry.request.priority,
                    },
                ))?;
                resolved.push(entry.slot);
            }
        }
        Ok(resolved)
    }
}
