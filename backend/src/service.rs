use std::sync::Arc;

use rand::Rng;
use santa_core::{normalize_wishlist, Assignments, DrawError, ParticipantName, Roster, Wish};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::request::WishlistSubmission;
use crate::store::{AssignmentStore, EnsureError, RosterStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    MalformedRequest(String),
    #[error("participant {0:?} not found")]
    NotFound(ParticipantName),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Draw(#[from] DrawError),
}

impl From<EnsureError> for ServiceError {
    fn from(err: EnsureError) -> Self {
        match err {
            EnsureError::Draw(err) => Self::Draw(err),
            EnsureError::Store(err) => Self::Storage(err),
        }
    }
}

/// What a participant sees: who they buy for and that person's wishlist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentView {
    pub assigned: Option<ParticipantName>,
    pub wishlist: Vec<Wish>,
}

struct Stores {
    roster: RosterStore,
    assignments: AssignmentStore,
}

/// Sole writer of the roster and assignment documents.
///
/// Reads share the lock; every mutation holds it exclusively for the whole
/// load-modify-save cycle.
#[derive(Clone)]
pub struct SantaService {
    stores: Arc<RwLock<Stores>>,
}

impl SantaService {
    pub fn new(roster: RosterStore, assignments: AssignmentStore) -> Self {
        Self {
            stores: Arc::new(RwLock::new(Stores {
                roster,
                assignments,
            })),
        }
    }

    pub async fn ensure_assignments<R>(&self, rng: &mut R) -> Result<Assignments, ServiceError>
    where
        R: Rng + ?Sized,
    {
        let stores = self.stores.write().await;
        let roster = stores.roster.load().await;
        if roster.users.is_empty() {
            error!(
                path = %stores.roster.path().display(),
                "roster has no participants; repair or remove the file to reseed it"
            );
        }
        Ok(stores.assignments.ensure(&roster, rng).await?)
    }

    pub async fn roster(&self) -> Roster {
        self.stores.read().await.roster.load().await
    }

    /// Unknown names get an empty view instead of an error.
    pub async fn assignment_view(&self, name: &str) -> AssignmentView {
        let stores = self.stores.read().await;
        let Some(assigned) = stores
            .assignments
            .load()
            .await
            .and_then(|a| a.recipient_of(name).map(str::to_string))
        else {
            return AssignmentView {
                assigned: None,
                wishlist: Vec::new(),
            };
        };

        let wishlist = stores
            .roster
            .load()
            .await
            .find(&assigned)
            .map(|p| p.wishlist.clone())
            .unwrap_or_default();

        AssignmentView {
            assigned: Some(assigned),
            wishlist,
        }
    }

    /// Replaces the participant's wishlist with the normalized submission and
    /// returns what was stored.
    pub async fn set_wishlist(&self, submission: WishlistSubmission) -> Result<Vec<Wish>, ServiceError> {
        let stores = self.stores.write().await;
        let mut roster = stores.roster.load().await;

        let participant = roster
            .find_mut(&submission.name)
            .ok_or_else(|| ServiceError::NotFound(submission.name.clone()))?;
        participant.wishlist = normalize_wishlist(submission.wishlist);
        let stored = participant.wishlist.clone();

        stores.roster.save(&roster).await?;
        info!(name = %submission.name, wishes = stored.len(), "wishlist updated");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::path::PathBuf;
    use uuid::Uuid;

    struct Fixture {
        service: SantaService,
        roster: RosterStore,
        assignments: AssignmentStore,
    }

    async fn fixture(names: &[&str]) -> Fixture {
        let dir: PathBuf = std::env::temp_dir().join(format!("santa_service_{}", Uuid::new_v4()));
        let roster = RosterStore::new(dir.join("data.json"));
        let assignments = AssignmentStore::new(dir.join("assignments.json"));
        roster
            .save(&Roster::from_names(names.iter().copied()))
            .await
            .unwrap();
        Fixture {
            service: SantaService::new(roster.clone(), assignments.clone()),
            roster,
            assignments,
        }
    }

    fn submission(name: &str, wishlist: Vec<Wish>) -> WishlistSubmission {
        WishlistSubmission {
            name: name.to_string(),
            wishlist,
        }
    }

    #[tokio::test]
    async fn three_person_scenario() {
        let fx = fixture(&["A", "B", "C"]).await;
        let drawn = fx
            .service
            .ensure_assignments(&mut ChaCha8Rng::seed_from_u64(11))
            .await
            .unwrap();
        assert_eq!(drawn.len(), 3);
        assert!(drawn.is_derangement_of(&fx.service.roster().await.names()));

        let stored = fx
            .service
            .set_wishlist(submission(
                "A",
                vec![Wish::new("http://x", ""), Wish::new("", "")],
            ))
            .await
            .unwrap();
        assert_eq!(stored, vec![Wish::new("http://x", "")]);

        // Whoever draws A now sees A's wishlist.
        let (giver, _) = drawn.iter().find(|(_, to)| *to == "A").unwrap();
        let view = fx.service.assignment_view(giver).await;
        assert_eq!(view.assigned.as_deref(), Some("A"));
        assert_eq!(view.wishlist, stored);
    }

    #[tokio::test]
    async fn unknown_name_on_write_is_not_found_and_roster_untouched() {
        let fx = fixture(&["A", "B"]).await;
        let before = tokio::fs::read(fx.roster.path()).await.unwrap();

        let err = fx
            .service
            .set_wishlist(submission("NoSuchName", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(name) if name == "NoSuchName"));
        assert_eq!(tokio::fs::read(fx.roster.path()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn unknown_name_on_read_is_an_empty_view() {
        let fx = fixture(&["A", "B"]).await;
        fx.service
            .ensure_assignments(&mut ChaCha8Rng::seed_from_u64(1))
            .await
            .unwrap();

        let view = fx.service.assignment_view("NoSuchName").await;
        assert_eq!(
            view,
            AssignmentView {
                assigned: None,
                wishlist: vec![]
            }
        );
    }

    #[tokio::test]
    async fn recipient_missing_from_roster_gets_empty_wishlist() {
        let fx = fixture(&["A", "B"]).await;
        let mapping: Assignments = [("A", "Ghost"), ("B", "A")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        fx.assignments.save(&mapping).await.unwrap();

        let view = fx.service.assignment_view("A").await;
        assert_eq!(view.assigned.as_deref(), Some("Ghost"));
        assert!(view.wishlist.is_empty());
    }

    #[tokio::test]
    async fn truncates_to_first_five() {
        let fx = fixture(&["A", "B"]).await;
        let input: Vec<Wish> = (1..=7).map(|i| Wish::new(format!("http://{i}"), "")).collect();
        let stored = fx.service.set_wishlist(submission("A", input)).await.unwrap();

        let urls: Vec<&str> = stored.iter().map(|w| w.url.as_str()).collect();
        assert_eq!(urls, ["http://1", "http://2", "http://3", "http://4", "http://5"]);
        assert_eq!(fx.service.roster().await.find("A").unwrap().wishlist, stored);
    }

    #[tokio::test]
    async fn resubmitting_normalized_output_is_stable() {
        let fx = fixture(&["A", "B"]).await;
        let first = fx
            .service
            .set_wishlist(submission(
                "A",
                vec![Wish::new(" a ", " b "), Wish::new(" ", ""), Wish::new("", "c")],
            ))
            .await
            .unwrap();
        let second = fx
            .service
            .set_wishlist(submission("A", first.clone()))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn wishlist_is_replaced_not_merged() {
        let fx = fixture(&["A", "B"]).await;
        fx.service
            .set_wishlist(submission("A", vec![Wish::new("old", ""), Wish::new("older", "")]))
            .await
            .unwrap();
        let stored = fx
            .service
            .set_wishlist(submission("A", vec![Wish::new("new", "")]))
            .await
            .unwrap();
        assert_eq!(stored, vec![Wish::new("new", "")]);

        let roster = fx.service.roster().await;
        assert_eq!(roster.find("A").unwrap().wishlist, stored);
        assert!(roster.find("B").unwrap().wishlist.is_empty());
    }

    #[tokio::test]
    async fn wishlist_edits_do_not_redraw() {
        let fx = fixture(&["A", "B", "C", "D"]).await;
        let drawn = fx
            .service
            .ensure_assignments(&mut ChaCha8Rng::seed_from_u64(3))
            .await
            .unwrap();
        fx.service
            .set_wishlist(submission("C", vec![Wish::new("", "book")]))
            .await
            .unwrap();
        let again = fx
            .service
            .ensure_assignments(&mut ChaCha8Rng::seed_from_u64(4))
            .await
            .unwrap();
        assert_eq!(drawn, again);
    }

    /// Writes `names` straight to a roster file whose temp sibling name is
    /// too long for the filesystem, so loads succeed and saves fail.
    async fn unsaveable_fixture(names: &[&str]) -> SantaService {
        let dir = std::env::temp_dir().join(format!("santa_service_{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join(format!("{}.json", "r".repeat(240)));
        let json = serde_json::to_vec(&Roster::from_names(names.iter().copied())).unwrap();
        tokio::fs::write(&path, json).await.unwrap();
        SantaService::new(
            RosterStore::new(path),
            AssignmentStore::new(dir.join("assignments.json")),
        )
    }

    #[tokio::test]
    async fn failed_roster_write_is_reported() {
        let service = unsaveable_fixture(&["A", "B"]).await;
        let err = service
            .set_wishlist(submission("A", vec![Wish::new("http://x", "")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(StoreError::Io { .. })));
        assert!(service.roster().await.find("A").unwrap().wishlist.is_empty());
    }

    #[tokio::test]
    async fn corrupt_roster_leaves_nothing_to_draw() {
        let fx = fixture(&["A", "B"]).await;
        tokio::fs::write(fx.roster.path(), b"{ broken").await.unwrap();

        let err = fx
            .service
            .ensure_assignments(&mut ChaCha8Rng::seed_from_u64(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Draw(DrawError::TooFewParticipants { count: 0 })
        ));
        assert_eq!(tokio::fs::read(fx.roster.path()).await.unwrap(), b"{ broken");
        assert!(fx.assignments.load().await.is_none());
    }

    #[tokio::test]
    async fn draw_failure_is_reported() {
        let fx = fixture(&["solo"]).await;
        let err = fx
            .service
            .ensure_assignments(&mut ChaCha8Rng::seed_from_u64(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Draw(DrawError::TooFewParticipants { count: 1 })
        ));
        assert_eq!(fx.service.assignment_view("solo").await.assigned, None);
    }
}
