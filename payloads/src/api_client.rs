use crate::{
    EntryId, Head, Party, PaymentMode, PaymentType, requests, responses,
};
use reqwest::StatusCode;
use serde::Serialize;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for interfacing with the ledger service.
///
/// Used by the integration tests; cookie handling is left to the
/// inner reqwest client.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .post(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn empty_post(&self, path: &str) -> ReqwestResult {
        self.inner_client.post(self.format_url(path)).send().await
    }

    async fn empty_get(&self, path: &str) -> ReqwestResult {
        self.inner_client.get(self.format_url(path)).send().await
    }
}

/// Methods on the ledger API
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.empty_get("health_check").await?;
        ok_empty(response).await
    }

    pub async fn create_account(
        &self,
        details: &requests::CreateAccount,
    ) -> Result<(), ClientError> {
        let response = self.post("create_account", details).await?;
        ok_empty(response).await
    }

    pub async fn login(
        &self,
        details: &requests::LoginCredentials,
    ) -> Result<(), ClientError> {
        let response = self.post("login", &details).await?;
        ok_empty(response).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let response = self.empty_post("logout").await?;
        ok_empty(response).await
    }

    /// Check if the user is logged in.
    pub async fn login_check(&self) -> Result<bool, ClientError> {
        let response = self.empty_post("login_check").await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            _ => Err(ClientError::APIError(
                response.status(),
                response.text().await?,
            )),
        }
    }

    /// Get the current user's profile information.
    pub async fn user_profile(
        &self,
    ) -> Result<responses::UserProfile, ClientError> {
        let response = self.empty_get("user_profile").await?;
        ok_body(response).await
    }

    // Master data

    pub async fn create_party(
        &self,
        details: &requests::CreateParty,
    ) -> Result<Party, ClientError> {
        let response = self.post("create_party", details).await?;
        ok_body(response).await
    }

    pub async fn list_parties(&self) -> Result<Vec<Party>, ClientError> {
        let response = self.empty_get("parties").await?;
        ok_body(response).await
    }

    pub async fn create_head(
        &self,
        details: &requests::CreateHead,
    ) -> Result<Head, ClientError> {
        let response = self.post("create_head", details).await?;
        ok_body(response).await
    }

    pub async fn list_heads(&self) -> Result<Vec<Head>, ClientError> {
        let response = self.empty_get("heads").await?;
        ok_body(response).await
    }

    pub async fn create_payment_type(
        &self,
        details: &requests::CreatePaymentType,
    ) -> Result<PaymentType, ClientError> {
        let response = self.post("create_payment_type", details).await?;
        ok_body(response).await
    }

    pub async fn list_payment_types(
        &self,
    ) -> Result<Vec<PaymentType>, ClientError> {
        let response = self.empty_get("payment_types").await?;
        ok_body(response).await
    }

    pub async fn create_payment_mode(
        &self,
        details: &requests::CreatePaymentMode,
    ) -> Result<PaymentMode, ClientError> {
        let response = self.post("create_payment_mode", details).await?;
        ok_body(response).await
    }

    pub async fn list_payment_modes(
        &self,
    ) -> Result<Vec<PaymentMode>, ClientError> {
        let response = self.empty_get("payment_modes").await?;
        ok_body(response).await
    }

    // Ledger entries

    pub async fn create_entry(
        &self,
        details: &requests::CreateEntry,
    ) -> Result<responses::Entry, ClientError> {
        let response = self.post("create_entry", details).await?;
        ok_body(response).await
    }

    pub async fn get_entry(
        &self,
        entry_id: &EntryId,
    ) -> Result<responses::EntryWithAudit, ClientError> {
        let response = self.post("get_entry", entry_id).await?;
        ok_body(response).await
    }

    pub async fn list_entries(
        &self,
        filter: &requests::ListEntries,
    ) -> Result<responses::EntryList, ClientError> {
        let response = self.post("list_entries", filter).await?;
        ok_body(response).await
    }

    pub async fn decide_entry(
        &self,
        details: &requests::DecideEntry,
    ) -> Result<responses::Entry, ClientError> {
        let response = self.post("decide_entry", details).await?;
        ok_body(response).await
    }

    pub async fn bulk_decide(
        &self,
        details: &requests::BulkDecide,
    ) -> Result<responses::BulkDecisionResult, ClientError> {
        let response = self.post("bulk_decide", details).await?;
        ok_body(response).await
    }

    pub async fn undo_decision(
        &self,
        details: &requests::UndoDecision,
    ) -> Result<responses::Entry, ClientError> {
        let response = self.post("undo_decision", details).await?;
        ok_body(response).await
    }

    pub async fn request_edit(
        &self,
        details: &requests::RequestEdit,
    ) -> Result<responses::Entry, ClientError> {
        let response = self.post("request_edit", details).await?;
        ok_body(response).await
    }

    pub async fn approve_edit(
        &self,
        details: &requests::ApproveEdit,
    ) -> Result<responses::Entry, ClientError> {
        let response = self.post("approve_edit", details).await?;
        ok_body(response).await
    }

    pub async fn reject_edit(
        &self,
        details: &requests::RejectEdit,
    ) -> Result<responses::Entry, ClientError> {
        let response = self.post("reject_edit", details).await?;
        ok_body(response).await
    }

    pub async fn delete_entry(
        &self,
        details: &requests::DeleteEntry,
    ) -> Result<responses::Entry, ClientError> {
        let response = self.post("delete_entry", details).await?;
        ok_body(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
