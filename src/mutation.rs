//! # Mutations
//!
//! Create/update/delete requests and the controller that runs them. A
//! successful mutation publishes an [`Invalidation`] for its collection so
//! every list and stats binding on the page refetches; a failed one leaves
//! caches untouched and hands the error back to the caller.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::counter;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::api::CollectionApi;
use crate::error::ClientError;
use crate::invalidation::{Invalidation, InvalidationBus};
use crate::models::{AnnouncementInput, UserStatus};
use crate::query::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Create,
    Update,
    Delete,
}

impl MutationOp {
    /// Creates and deletes shift every cursor after the affected item.
    pub fn changes_item_count(&self) -> bool {
        matches!(self, MutationOp::Create | MutationOp::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOp::Create => "create",
            MutationOp::Update => "update",
            MutationOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub collection: Collection,
    pub entity_id: Option<String>,
    pub op: MutationOp,
    pub payload: Option<Value>,
}

impl MutationRequest {
    pub fn create<P: Serialize>(collection: Collection, payload: &P) -> Result<Self, ClientError> {
        Ok(Self {
            collection,
            entity_id: None,
            op: MutationOp::Create,
            payload: Some(serde_json::to_value(payload)?),
        })
    }

    pub fn update<S: Into<String>>(collection: Collection, id: S, payload: Value) -> Self {
        Self {
            collection,
            entity_id: Some(id.into().trim().to_string()),
            op: MutationOp::Update,
            payload: Some(payload),
        }
    }

    pub fn delete<S: Into<String>>(collection: Collection, id: S) -> Self {
        Self {
            collection,
            entity_id: Some(id.into().trim().to_string()),
            op: MutationOp::Delete,
            payload: None,
        }
    }

    pub fn approve_payment<S: Into<String>>(id: S) -> Self {
        Self::update(
            Collection::AdminPayments,
            id,
            json!({ "status": "approved" }),
        )
    }

    pub fn reject_payment<S: Into<String>>(id: S, reason: Option<&str>) -> Self {
        let mut payload = json!({ "status": "rejected" });
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            payload["reason"] = Value::from(reason);
        }
        Self::update(Collection::AdminPayments, id, payload)
    }

    pub fn set_user_status<S: Into<String>>(id: S, status: UserStatus) -> Self {
        Self::update(
            Collection::AdminUsers,
            id,
            json!({ "status": status.as_str() }),
        )
    }

    pub fn delete_user<S: Into<String>>(id: S) -> Self {
        Self::delete(Collection::AdminUsers, id)
    }

    pub fn create_announcement(input: &AnnouncementInput) -> Result<Self, ClientError> {
        Self::create(Collection::AdminAnnouncements, input)
    }

    pub fn delete_announcement<S: Into<String>>(id: S) -> Self {
        Self::delete(Collection::AdminAnnouncements, id)
    }

    pub fn mark_notification_read<S: Into<String>>(id: S) -> Self {
        Self::update(Collection::Notifications, id, json!({ "read": true }))
    }

    /// The entity id as it appears in the path; `None` when unset or blank.
    pub fn target_id(&self) -> Option<&str> {
        self.entity_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Path relative to the API base.
    pub fn path(&self) -> Result<String, ClientError> {
        let base = self.collection.path();
        match (self.op, self.target_id()) {
            (MutationOp::Create, _) => Ok(base.to_string()),
            (_, Some(id)) => Ok(format!("{base}/{id}")),
            (op, None) => Err(ClientError::InvalidRequest {
                message: format!("{} on {} requires an id", op.as_str(), self.collection),
            }),
        }
    }
}

type PendingKey = (Collection, String);

/// Runs mutations for one page and fans out invalidations on success.
pub struct MutationController {
    api: Arc<dyn CollectionApi>,
    bus: Arc<InvalidationBus>,
    pending: Mutex<HashSet<PendingKey>>,
}

impl MutationController {
    pub fn new(api: Arc<dyn CollectionApi>, bus: Arc<InvalidationBus>) -> Self {
        Self {
            api,
            bus,
            pending: Mutex::new(HashSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PendingKey>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A mutation for this entity is awaiting its response.
    pub fn is_pending(&self, collection: Collection, entity_id: &str) -> bool {
        self.lock()
            .contains(&(collection, entity_id.trim().to_string()))
    }

    /// Run `request`. At most one mutation per entity is in flight; a second
    /// one is rejected with [`ClientError::MutationInFlight`] rather than queued.
    #[instrument(
        skip(self, request),
        fields(
            collection = %request.collection,
            op = request.op.as_str(),
            entity_id = ?request.target_id(),
        )
    )]
    pub async fn mutate(&self, request: MutationRequest) -> Result<(), ClientError> {
        let pending_key = request
            .target_id()
            .map(|id| (request.collection, id.to_string()));

        if let Some(key) = &pending_key
            && !self.lock().insert(key.clone())
        {
            counter!("mutations_rejected_total", "collection" => request.collection.name())
                .increment(1);
            warn!("mutation already in flight for this entity");
            return Err(ClientError::MutationInFlight {
                collection: key.0,
                entity_id: key.1.clone(),
            });
        }
        let _release = scopeguard::guard(pending_key, |key| {
            if let Some(key) = key {
                self.lock().remove(&key);
            }
        });

        match self.api.apply_mutation(&request).await {
            Ok(()) => {
                let event = Invalidation {
                    collection: request.collection,
                    reset_pagination: request.op.changes_item_count(),
                };
                let notified = self.bus.publish(&event);
                counter!("mutations_succeeded_total", "collection" => request.collection.name())
                    .increment(1);
                info!(notified, "mutation applied");
                Ok(())
            }
            Err(err) => {
                counter!("mutations_failed_total", "collection" => request.collection.name())
                    .increment(1);
                warn!(error = %err, "mutation failed; caches left untouched");
                Err(err)
            }
        }
    }
}
