use std::collections::HashMap;
use std::sync::Arc;

use domains::{AccountId, AccountRepository, Annotated};
use tracing::warn;

/// Attaches owner profiles to records in one batched lookup.
///
/// Profiles are secondary data: a failed lookup is logged and the records are
/// returned with `owner: None` rather than failing the listing.
#[derive(Clone)]
pub struct OwnerAnnotator {
    accounts: Arc<dyn AccountRepository>,
}

impl OwnerAnnotator {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    pub async fn annotate<T, F>(&self, records: Vec<T>, owner_of: F) -> Vec<Annotated<T>>
    where
        T: Send,
        F: Fn(&T) -> AccountId + Send,
    {
        let mut ids: Vec<AccountId> = records.iter().map(&owner_of).collect();
        ids.sort_unstable();
        ids.dedup();

        let profiles = if ids.is_empty() {
            HashMap::new()
        } else {
            match self.accounts.profiles(&ids).await {
                Ok(profiles) => profiles,
                Err(err) => {
                    warn!(error = %err, owners = ids.len(), "owner profile lookup failed");
                    HashMap::new()
                }
            }
        };

        records
            .into_iter()
            .map(|record| {
                let owner = profiles.get(&owner_of(&record)).cloned();
                Annotated { record, owner }
            })
            .collect()
    }

    pub async fn annotate_one<T: Send>(&self, record: T, owner: AccountId) -> Annotated<T> {
        let owner = match self.accounts.profiles(&[owner]).await {
            Ok(mut profiles) => profiles.remove(&owner),
            Err(err) => {
                warn!(error = %err, %owner, "owner profile lookup failed");
                None
            }
        };
        Annotated { record, owner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockAccountRepository, OwnerProfile};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_profile_failure_degrades_to_missing_owner() {
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_profiles()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let annotator = OwnerAnnotator::new(Arc::new(accounts));

        let owners = vec![Uuid::new_v4(), Uuid::new_v4()];
        let annotated = annotator.annotate(owners.clone(), |id| *id).await;

        assert_eq!(annotated.len(), 2);
        assert!(annotated.iter().all(|a| a.owner.is_none()));
    }

    #[tokio::test]
    async fn test_unknown_owner_gets_no_profile() {
        let known = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        let mut accounts = MockAccountRepository::new();
        accounts.expect_profiles().times(1).returning(move |ids| {
            assert_eq!(ids.len(), 2);
            Ok(HashMap::from([(
                known,
                OwnerProfile {
                    id: known,
                    nickname: "known".into(),
                    avatar: None,
                },
            )]))
        });
        let annotator = OwnerAnnotator::new(Arc::new(accounts));

        let annotated = annotator.annotate(vec![known, unknown, known], |id| *id).await;

        assert_eq!(annotated[0].owner.as_ref().map(|p| p.nickname.as_str()), Some("known"));
        assert!(annotated[1].owner.is_none());
        assert!(annotated[2].owner.is_some());
    }
}
