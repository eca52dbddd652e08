//! CRM REST client — the production `FinancialGateway`.
//!
//! Bearer tokens are cached per identity and re-obtained transparently from
//! the stored linked-account credentials whenever a call comes back 401.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::event::Identity;
use crate::gateway::FinancialGateway;
use crate::gateway::types::{
    Agreement, AuthSession, KycStatus, KycSubmission, NewTradingAccount, NewTransaction,
    PaymentGatewayInfo, SignupRequest, TradingAccount, TradingAccountKind, TransactionOutcome,
    TransactionRecord, TransferRequest, Wallet,
};
use crate::store::Database;

/// Reqwest-backed CRM client.
pub struct CrmClient {
    base_url: String,
    api_key: SecretString,
    http: reqwest::Client,
    store: Arc<dyn Database>,
    tokens: RwLock<HashMap<Identity, String>>,
}

impl CrmClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, store: Arc<dyn Database>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http: reqwest::Client::new(),
            store,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Bearer token for `identity`: cached, else re-login from the stored
    /// linked-account credentials.
    async fn token(&self, identity: &Identity) -> Result<String, GatewayError> {
        if let Some(token) = self.tokens.read().await.get(identity) {
            return Ok(token.clone());
        }
        self.relogin(identity).await
    }

    /// Force a fresh login from stored credentials and cache the new token.
    async fn relogin(&self, identity: &Identity) -> Result<String, GatewayError> {
        let account = self
            .store
            .get_linked_account(identity)
            .await
            .map_err(|e| GatewayError::Transport {
                endpoint: "/auth/login".to_string(),
                reason: format!("linked-account lookup failed: {e}"),
            })?
            .ok_or_else(|| GatewayError::NotLinked {
                identity: identity.to_string(),
            })?;

        debug!(identity = %identity, "Re-obtaining gateway token");
        let auth = self
            .login_request(&account.email, account.login_secret.expose())
            .await?;
        self.tokens
            .write()
            .await
            .insert(identity.clone(), auth.token.clone());
        Ok(auth.token)
    }

    async fn login_request(&self, email: &str, password: &str) -> Result<AuthSession, GatewayError> {
        let endpoint = "/auth/login";
        let resp = self
            .http
            .post(self.url(endpoint))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| GatewayError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let resp = check_status(resp, endpoint).await?;
        parse_json(resp, endpoint).await
    }

    /// Send an authenticated request; on 401, re-login once and retry.
    async fn send_authed<F>(
        &self,
        identity: &Identity,
        endpoint: &str,
        build: F,
    ) -> Result<Response, GatewayError>
    where
        F: Fn(&reqwest::Client, String) -> RequestBuilder,
    {
        let token = self.token(identity).await?;
        let resp = build(&self.http, self.url(endpoint))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| GatewayError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp, endpoint).await;
        }

        // Token expired — drop it, re-login, retry once.
        warn!(identity = %identity, endpoint, "Gateway token rejected; re-authenticating");
        self.tokens.write().await.remove(identity);
        let token = self.relogin(identity).await?;
        let resp = build(&self.http, self.url(endpoint))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| GatewayError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        check_status(resp, endpoint).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        identity: &Identity,
        endpoint: &str,
    ) -> Result<T, GatewayError> {
        let resp = self
            .send_authed(identity, endpoint, |http, url| http.get(url))
            .await?;
        parse_json(resp, endpoint).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        identity: &Identity,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let resp = self
            .send_authed(identity, endpoint, move |http, url| {
                http.post(url).json(&body)
            })
            .await?;
        parse_json(resp, endpoint).await
    }

    async fn post_empty(
        &self,
        identity: &Identity,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<(), GatewayError> {
        self.send_authed(identity, endpoint, move |http, url| {
            http.post(url).json(&body)
        })
        .await?;
        Ok(())
    }
}

/// Map non-success statuses into the gateway error taxonomy.
async fn check_status(resp: Response, endpoint: &str) -> Result<Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => Err(GatewayError::Unauthorized),
        StatusCode::CONFLICT => Err(GatewayError::Conflict(message)),
        _ => Err(GatewayError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        }),
    }
}

async fn parse_json<T: DeserializeOwned>(resp: Response, endpoint: &str) -> Result<T, GatewayError> {
    resp.json::<T>()
        .await
        .map_err(|e| GatewayError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

#[derive(serde::Deserialize)]
struct ReferralResponse {
    url: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    kyc_status: KycStatus,
}

#[async_trait]
impl FinancialGateway for CrmClient {
    async fn signup(&self, req: SignupRequest) -> Result<(), GatewayError> {
        let endpoint = "/users/signup";
        let resp = self
            .http
            .post(self.url(endpoint))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&req)
            .send()
            .await
            .map_err(|e| GatewayError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        check_status(resp, endpoint).await?;
        Ok(())
    }

    async fn login(
        &self,
        identity: &Identity,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, GatewayError> {
        let auth = self.login_request(email, password).await?;
        self.tokens
            .write()
            .await
            .insert(identity.clone(), auth.token.clone());
        Ok(auth)
    }

    async fn kyc_status(&self, identity: &Identity) -> Result<KycStatus, GatewayError> {
        let profile: ProfileResponse = self.get_json(identity, "/users/me").await?;
        Ok(profile.kyc_status)
    }

    async fn submit_kyc(
        &self,
        identity: &Identity,
        submission: KycSubmission,
    ) -> Result<(), GatewayError> {
        let endpoint = "/kyc/profile";

        // Documents ride along as multipart file parts.
        let id_bytes = tokio::fs::read(&submission.id_document)
            .await
            .map_err(|e| GatewayError::Transport {
                endpoint: endpoint.to_string(),
                reason: format!("reading id document: {e}"),
            })?;
        let utility = match &submission.utility_document {
            Some(path) => {
                let bytes =
                    tokio::fs::read(path)
                        .await
                        .map_err(|e| GatewayError::Transport {
                            endpoint: endpoint.to_string(),
                            reason: format!("reading utility document: {e}"),
                        })?;
                Some((file_name(path), bytes))
            }
            None => None,
        };

        // Form is not Clone; rebuild it per attempt from the owned parts.
        self.send_authed(identity, endpoint, move |http, url| {
            let mut form = Form::new()
                .text("street", submission.street.clone())
                .text("city", submission.city.clone())
                .text("postalCode", submission.postal_code.clone())
                .text("country", submission.country.clone())
                .text("dateOfBirth", submission.date_of_birth.clone())
                .part(
                    "idDocument",
                    Part::bytes(id_bytes.clone()).file_name(file_name(&submission.id_document)),
                );
            if let Some((name, bytes)) = &utility {
                form = form.part(
                    "utilityDocument",
                    Part::bytes(bytes.clone()).file_name(name.clone()),
                );
            }
            http.post(url).multipart(form)
        })
        .await?;
        Ok(())
    }

    async fn list_agreements(&self, identity: &Identity) -> Result<Vec<Agreement>, GatewayError> {
        self.get_json(identity, "/kyc/agreements").await
    }

    async fn accept_agreement(
        &self,
        identity: &Identity,
        agreement_id: &str,
    ) -> Result<(), GatewayError> {
        let endpoint = format!("/kyc/agreements/{agreement_id}/accept");
        self.send_authed(identity, &endpoint, |http, url| http.post(url))
            .await?;
        Ok(())
    }

    async fn complete_kyc(&self, identity: &Identity) -> Result<(), GatewayError> {
        self.post_empty(identity, "/kyc/complete", serde_json::json!({}))
            .await
    }

    async fn list_wallets(&self, identity: &Identity) -> Result<Vec<Wallet>, GatewayError> {
        self.get_json(identity, "/wallets").await
    }

    async fn list_accounts(
        &self,
        identity: &Identity,
        kind: TradingAccountKind,
    ) -> Result<Vec<TradingAccount>, GatewayError> {
        let endpoint = format!("/accounts?type={}", kind.as_str());
        self.get_json(identity, &endpoint).await
    }

    async fn list_payment_gateways(
        &self,
        identity: &Identity,
    ) -> Result<Vec<PaymentGatewayInfo>, GatewayError> {
        self.get_json(identity, "/payment-gateways").await
    }

    async fn create_transaction(
        &self,
        identity: &Identity,
        req: NewTransaction,
    ) -> Result<TransactionOutcome, GatewayError> {
        let body = serde_json::to_value(&req).map_err(|e| GatewayError::InvalidResponse {
            endpoint: "/transactions".to_string(),
            reason: e.to_string(),
        })?;
        self.post_json(identity, "/transactions", body).await
    }

    async fn transfer_from_wallet(
        &self,
        identity: &Identity,
        req: TransferRequest,
    ) -> Result<(), GatewayError> {
        let body = serde_json::to_value(&req).map_err(|e| GatewayError::InvalidResponse {
            endpoint: "/transfers/from-wallet".to_string(),
            reason: e.to_string(),
        })?;
        self.post_empty(identity, "/transfers/from-wallet", body).await
    }

    async fn transfer_from_account(
        &self,
        identity: &Identity,
        req: TransferRequest,
    ) -> Result<(), GatewayError> {
        let body = serde_json::to_value(&req).map_err(|e| GatewayError::InvalidResponse {
            endpoint: "/transfers/from-account".to_string(),
            reason: e.to_string(),
        })?;
        self.post_empty(identity, "/transfers/from-account", body)
            .await
    }

    async fn transaction_history(
        &self,
        identity: &Identity,
    ) -> Result<Vec<TransactionRecord>, GatewayError> {
        self.get_json(identity, "/transactions").await
    }

    async fn referral_link(&self, identity: &Identity) -> Result<String, GatewayError> {
        let resp: ReferralResponse = self.get_json(identity, "/referral-link").await?;
        Ok(resp.url)
    }

    async fn create_trading_account(
        &self,
        identity: &Identity,
        kind: TradingAccountKind,
        req: NewTradingAccount,
    ) -> Result<TradingAccount, GatewayError> {
        let mut body = serde_json::to_value(&req).map_err(|e| GatewayError::InvalidResponse {
            endpoint: "/accounts".to_string(),
            reason: e.to_string(),
        })?;
        body["type"] = serde_json::Value::String(kind.as_str().to_string());
        self.post_json(identity, "/accounts", body).await
    }
}

fn file_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string()
}
