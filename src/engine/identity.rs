//! Collision-free ids for routes and stops.
//!
//! Ids are a readable seed joined to a random v4 UUID, slugged, and checked
//! against the store until an unused one turns up. With 122 random bits the
//! retry is effectively never taken, but the loop has no bound of its own;
//! the caller's cancellation token is what limits it.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::error::{IdentityError, SubmitError};
use crate::models::route::RouteDraft;
use crate::models::stop::StopRef;
use crate::store::{self, Collection, DocumentStore, StoreError};

/// Lowercase, whitespace to `_`, everything else non-alphanumeric dropped.
pub fn slugify(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || c == '_' {
                Some(c.to_ascii_lowercase())
            } else {
                None
            }
        })
        .collect()
}

pub fn candidate_id(seed: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    let seed = slugify(seed.trim());

    if seed.is_empty() {
        token
    } else {
        format!("{seed}_{token}")
    }
}

/// Generates candidates from `seed` until `exists` reports one as free.
///
/// A storage failure inside `exists` is returned as an error, never read as
/// "free".
pub async fn generate_unique_id<F, Fut>(
    seed: &str,
    mut exists: F,
    cancel: &CancellationToken,
) -> Result<String, IdentityError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, StoreError>>,
{
    loop {
        if cancel.is_cancelled() {
            return Err(IdentityError::Cancelled);
        }

        let candidate = candidate_id(seed);
        let taken = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IdentityError::Cancelled),
            result = exists(candidate.clone()) => result?,
        };

        if !taken {
            return Ok(candidate);
        }

        warn!(candidate = %candidate, "generated id already in use; retrying");
    }
}

/// The ids a draft ended up with after [`IdentityGenerator::assign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedIds {
    pub route_id: String,
    pub original_route_id: String,
    pub stops: Vec<StopRef>,
}

#[derive(Clone)]
pub struct IdentityGenerator {
    store: Arc<dyn DocumentStore>,
}

impl IdentityGenerator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn route_id(
        &self,
        seed: &str,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError> {
        self.unique_in(&[Collection::Routes], seed, cancel).await
    }

    /// Stop ids are unique across both pickups and deliveries.
    pub async fn stop_id(
        &self,
        seed: &str,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError> {
        self.unique_in(&[Collection::Pickups, Collection::Deliveries], seed, cancel)
            .await
    }

    /// Fills in every id the draft is missing: the route id (seeded with the
    /// driver's name), its lineage root, and each stop id (seeded with the
    /// stop's organization). Ids already present are kept.
    pub async fn assign(
        &self,
        draft: &mut RouteDraft,
        route_seed: &str,
        cancel: &CancellationToken,
    ) -> Result<AssignedIds, SubmitError> {
        let route_id = match &draft.id {
            Some(id) => id.clone(),
            None => self
                .route_id(route_seed, cancel)
                .await
                .map_err(|err| SubmitError::identity("route", err))?,
        };
        let original_route_id = draft
            .original_route_id
            .clone()
            .unwrap_or_else(|| route_id.clone());

        let mut stops = Vec::with_capacity(draft.stops.len());
        for stop in draft.stops.iter_mut() {
            let id = match &stop.id {
                Some(id) => id.clone(),
                None => self
                    .stop_id(&stop.organization_id, cancel)
                    .await
                    .map_err(|err| SubmitError::identity("stop", err))?,
            };
            stop.id = Some(id.clone());
            stops.push(StopRef {
                id,
                kind: stop.kind,
            });
        }

        draft.id = Some(route_id.clone());
        draft.original_route_id = Some(original_route_id.clone());

        Ok(AssignedIds {
            route_id,
            original_route_id,
            stops,
        })
    }

    async fn unique_in(
        &self,
        collections: &[Collection],
        seed: &str,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError> {
        let docs: &dyn DocumentStore = self.store.as_ref();

        generate_unique_id(
            seed,
            move |candidate| async move {
                for collection in collections {
                    if store::exists(docs, *collection, &candidate).await? {
                        return Ok(true);
                    }
                }
                Ok::<_, StoreError>(false)
            },
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::{IdentityGenerator, candidate_id, generate_unique_id, slugify};
    use crate::error::{IdentityError, SubmitError};
    use crate::models::route::RouteDraft;
    use crate::models::stop::{StopDraft, StopKind};
    use crate::store::memory::MemoryStore;
    use crate::store::{Collection, DocumentStore, StoreError};

    #[test]
    fn slug_strips_punctuation_and_joins_words() {
        assert_eq!(slugify("Ana María O'Neil"), "ana_mara_oneil");
        assert_eq!(slugify("DRIVER-42"), "driver42");
    }

    #[test]
    fn candidate_carries_seed_and_token() {
        let id = candidate_id("Sam Lee");
        assert!(id.starts_with("sam_lee_"));
        assert_eq!(id.len(), "sam_lee_".len() + 32);

        let bare = candidate_id("  ");
        assert_eq!(bare.len(), 32);
        assert!(bare.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn retries_until_a_free_id_and_never_returns_a_taken_one() {
        let calls = AtomicUsize::new(0);
        let mut taken = HashSet::new();

        let id = generate_unique_id(
            "route",
            |candidate| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let is_taken = n < 3;
                if is_taken {
                    taken.insert(candidate);
                }
                async move { Ok(is_taken) }
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(taken.len(), 3);
        assert!(!taken.contains(&id));
    }

    #[tokio::test]
    async fn always_taken_keeps_looping_until_cancelled() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let result = generate_unique_id(
            "route",
            |_| {
                if calls.fetch_add(1, Ordering::SeqCst) + 1 == 50 {
                    cancel.cancel();
                }
                async { Ok(true) }
            },
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(IdentityError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn storage_failure_is_propagated() {
        let result = generate_unique_id(
            "route",
            |_| async { Err(StoreError::Unavailable("offline".to_string())) },
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(IdentityError::Store(_))));
    }

    #[tokio::test]
    async fn generator_checks_the_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_merge(Collection::Routes, "existing", json!({ "id": "existing" }))
            .await
            .unwrap();
        let ids = IdentityGenerator::new(store.clone());

        let route_id = ids
            .route_id("Jo Park", &CancellationToken::new())
            .await
            .unwrap();
        let stop_id = ids
            .stop_id("philabundance", &CancellationToken::new())
            .await
            .unwrap();

        assert!(route_id.starts_with("jo_park_"));
        assert!(stop_id.starts_with("philabundance_"));
        assert!(store.get(Collection::Routes, &route_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn assign_fills_only_missing_ids() {
        let ids = IdentityGenerator::new(Arc::new(MemoryStore::new()));
        let start = Utc::now();
        let mut draft = RouteDraft::new(
            start,
            start,
            vec![
                StopDraft::new(StopKind::Pickup, "Green Grocer", "loc_a").with_id("kept"),
                StopDraft::new(StopKind::Delivery, "Fridge", "loc_b"),
            ],
        );

        let assigned = ids
            .assign(&mut draft, "Unassigned", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(draft.id.as_deref(), Some(assigned.route_id.as_str()));
        assert_eq!(assigned.original_route_id, assigned.route_id);
        assert_eq!(draft.stops[0].id.as_deref(), Some("kept"));
        assert!(draft.stops[1].id.as_deref().unwrap().starts_with("fridge_"));
        assert_eq!(assigned.stops[0].id, "kept");
        assert_eq!(assigned.stops[1].kind, StopKind::Delivery);
    }

    #[tokio::test]
    async fn assign_reports_cancellation_as_identity_failure() {
        let ids = IdentityGenerator::new(Arc::new(MemoryStore::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let start = Utc::now();
        let mut draft = RouteDraft::new(start, start, Vec::new());

        let err = ids.assign(&mut draft, "", &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::IdentityGeneration {
                entity: "route",
                source: IdentityError::Cancelled
            }
        ));
    }
}
