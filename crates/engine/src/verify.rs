//! Schedule access verification: is the token valid, and does it actually
//! own the accounts the schedule names? Produced per item so one bad
//! account never hides the verdict on the others.

use autoads_gateway::GraphApi;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerifyStatus {
    Verified,
    NotVerified,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationItem {
    pub ad_account_id: String,
    pub ad_account_status: VerifyStatus,
    pub ad_account_error: Option<String>,
    pub access_token_status: VerifyStatus,
    pub access_token_error: Option<String>,
}

pub async fn verify_schedule_access(
    api: &dyn GraphApi,
    account_ids: &[String],
) -> Vec<VerificationItem> {
    // One identity call verifies the token for every item.
    let token_error = match api.identity().await {
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    };

    let owned = if token_error.is_none() {
        match api.ad_accounts().await {
            Ok(accounts) => Ok(accounts
                .iter()
                .map(|a| a.bare_id().to_string())
                .collect::<Vec<_>>()),
            Err(e) => Err(e.to_string()),
        }
    } else {
        Err("Invalid access token".to_string())
    };

    account_ids
        .iter()
        .map(|account_id| {
            let (account_status, account_error) = match &owned {
                Ok(owned) if owned.iter().any(|id| id == account_id) => {
                    (VerifyStatus::Verified, None)
                }
                Ok(_) => (
                    VerifyStatus::NotVerified,
                    Some("Ad account not associated with this access token".to_string()),
                ),
                Err(e) => (VerifyStatus::NotVerified, Some(e.clone())),
            };

            VerificationItem {
                ad_account_id: account_id.clone(),
                ad_account_status: account_status,
                ad_account_error: account_error,
                access_token_status: if token_error.is_none() {
                    VerifyStatus::Verified
                } else {
                    VerifyStatus::NotVerified
                },
                access_token_error: token_error.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use autoads_core::error::GatewayError;
    use autoads_core::types::{AdAccount, Identity, RunStatus};
    use autoads_gateway::AccountBundle;
    use chrono::NaiveDate;

    struct MockApi {
        token_ok: bool,
    }

    #[async_trait]
    impl GraphApi for MockApi {
        async fn identity(&self) -> Result<Identity, GatewayError> {
            if self.token_ok {
                Ok(Identity {
                    id: "me".into(),
                    name: None,
                })
            } else {
                Err(GatewayError::InvalidToken {
                    message: "expired".into(),
                })
            }
        }

        async fn ad_accounts(&self) -> Result<Vec<AdAccount>, GatewayError> {
            Ok(vec![AdAccount {
                id: "act_100".into(),
                name: "Owned".into(),
            }])
        }

        async fn account_bundle(
            &self,
            _account_id: &str,
            _date: NaiveDate,
        ) -> Result<AccountBundle, GatewayError> {
            Ok(AccountBundle::default())
        }

        async fn set_status(
            &self,
            _entity_id: &str,
            _status: RunStatus,
        ) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_owned_and_foreign_accounts() {
        let api = MockApi { token_ok: true };
        let items =
            verify_schedule_access(&api, &["100".to_string(), "999".to_string()]).await;

        assert_eq!(items[0].ad_account_status, VerifyStatus::Verified);
        assert_eq!(items[0].access_token_status, VerifyStatus::Verified);
        assert_eq!(items[1].ad_account_status, VerifyStatus::NotVerified);
        assert!(items[1].ad_account_error.is_some());
    }

    #[tokio::test]
    async fn test_bad_token_marks_every_item() {
        let api = MockApi { token_ok: false };
        let items = verify_schedule_access(&api, &["100".to_string()]).await;

        assert_eq!(items[0].access_token_status, VerifyStatus::NotVerified);
        assert_eq!(items[0].ad_account_status, VerifyStatus::NotVerified);
        assert_eq!(
            items[0].ad_account_error.as_deref(),
            Some("Invalid access token")
        );
    }
}
