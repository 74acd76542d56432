//! Production platform client over HTTP.
//!
//! Binds one bot credential to the platform API and routes every call
//! through the shared [`RateLimitedTransport`]. Request bodies are
//! rebuilt per attempt so throttle retries can resend them.

use super::service::PackService;
use super::types::{
    AssetFormat, ChatId, MessageId, NewPackAsset, PackInfo, SentMessage, UploadedAsset, UserId,
};
use super::PlatformError;
use crate::progress::{CancelKey, StatusMessenger};
use crate::transport::{ApiResponse, RateLimitedTransport, RawResponse, TransportError};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// HTTP request timeout. Generous because asset uploads carry binaries.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Platform API client bound to one bot credential.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    transport: Arc<RateLimitedTransport>,
}

impl PlatformClient {
    /// Creates a client for `base_url` with the given credential.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        transport: Arc<RateLimitedTransport>,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                PlatformError::Transport(TransportError::Http(format!(
                    "failed to create HTTP client: {e}"
                )))
            })?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            transport,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.token, method)
    }

    /// Sends a built request and lowers it to a [`RawResponse`].
    async fn send(req: reqwest::RequestBuilder) -> Result<RawResponse, TransportError> {
        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Http(format!("request failed: {e}")))?;

        let status = resp.status().as_u16();
        let retry_after_header = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Http(format!("failed to read response: {e}")))?
            .to_vec();

        trace!(status, bytes = body.len(), "platform response received");
        Ok(RawResponse {
            status,
            retry_after_header,
            body,
        })
    }

    /// Executes a JSON-bodied method through the transport.
    async fn call_json<T: DeserializeOwned>(
        &self,
        method: &'static str,
        payload: serde_json::Value,
    ) -> Result<ApiResponse<T>, TransportError> {
        let url = self.endpoint(method);
        self.transport
            .execute(method, || {
                Self::send(self.http.post(&url).json(&payload))
            })
            .await
    }

    fn unwrap_result<T>(
        resp: ApiResponse<T>,
        method: &'static str,
    ) -> Result<T, PlatformError> {
        if resp.ok {
            resp.result.ok_or(PlatformError::EmptyResult { method })
        } else {
            Err(PlatformError::Api {
                method,
                code: resp.error_code,
                description: resp.description.unwrap_or_default(),
            })
        }
    }

    fn expect_ok<T>(resp: ApiResponse<T>, method: &'static str) -> Result<(), PlatformError> {
        if resp.ok {
            Ok(())
        } else {
            Err(PlatformError::Api {
                method,
                code: resp.error_code,
                description: resp.description.unwrap_or_default(),
            })
        }
    }
}

impl PackService for PlatformClient {
    async fn upload_asset(
        &self,
        owner: UserId,
        data: Vec<u8>,
        file_name: &str,
        format: AssetFormat,
    ) -> Result<UploadedAsset, PlatformError> {
        let url = self.endpoint("uploadAsset");
        let owner_field = owner.to_string();
        let resp: ApiResponse<UploadedAsset> = self
            .transport
            .execute("uploadAsset", || {
                let form = Form::new()
                    .text("owner_id", owner_field.clone())
                    .text("format", format.as_str())
                    .part(
                        "asset",
                        Part::bytes(data.clone()).file_name(file_name.to_string()),
                    );
                Self::send(self.http.post(&url).multipart(form))
            })
            .await?;
        Self::unwrap_result(resp, "uploadAsset")
    }

    async fn create_pack(
        &self,
        owner: UserId,
        link: &str,
        title: &str,
        assets: &[NewPackAsset],
    ) -> Result<(), PlatformError> {
        let resp: ApiResponse<bool> = self
            .call_json(
                "createPack",
                json!({
                    "owner_id": owner,
                    "name": link,
                    "title": title,
                    "type": "custom_emoji",
                    "assets": assets,
                }),
            )
            .await?;
        Self::expect_ok(resp, "createPack")
    }

    async fn add_to_pack(
        &self,
        owner: UserId,
        link: &str,
        asset: &NewPackAsset,
    ) -> Result<(), PlatformError> {
        let resp: ApiResponse<bool> = self
            .call_json(
                "addToPack",
                json!({
                    "owner_id": owner,
                    "name": link,
                    "asset": asset,
                }),
            )
            .await?;
        Self::expect_ok(resp, "addToPack")
    }

    async fn get_pack(&self, link: &str) -> Result<PackInfo, PlatformError> {
        let resp: ApiResponse<PackInfo> = self
            .call_json("getPack", json!({ "name": link }))
            .await?;
        Self::unwrap_result(resp, "getPack")
    }

    async fn delete_pack(&self, link: &str) -> Result<(), PlatformError> {
        let resp: ApiResponse<bool> = self
            .call_json("deletePack", json!({ "name": link }))
            .await?;
        Self::expect_ok(resp, "deletePack")
    }
}

impl StatusMessenger for PlatformClient {
    async fn send_status(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
        cancel_key: &CancelKey,
    ) -> Result<SentMessage, PlatformError> {
        let resp: ApiResponse<SentMessage> = self
            .call_json(
                "sendMessage",
                json!({
                    "chat_id": chat,
                    "text": text,
                    "reply_to_message_id": reply_to,
                    "reply_markup": cancel_markup(cancel_key),
                }),
            )
            .await?;
        Self::unwrap_result(resp, "sendMessage")
    }

    async fn update_status(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        cancel_key: &CancelKey,
    ) -> Result<(), PlatformError> {
        let resp: ApiResponse<bool> = self
            .call_json(
                "editMessageText",
                json!({
                    "chat_id": chat,
                    "message_id": message,
                    "text": text,
                    "reply_markup": cancel_markup(cancel_key),
                }),
            )
            .await?;
        Self::expect_ok(resp, "editMessageText")
    }

    async fn delete_status(&self, chat: ChatId, message: MessageId) -> Result<(), PlatformError> {
        let resp: ApiResponse<bool> = self
            .call_json(
                "deleteMessage",
                json!({
                    "chat_id": chat,
                    "message_id": message,
                }),
            )
            .await?;
        Self::expect_ok(resp, "deleteMessage")
    }
}

/// Inline action markup carrying the cancel key.
fn cancel_markup(key: &CancelKey) -> serde_json::Value {
    json!({
        "inline_keyboard": [[{
            "text": "Cancel",
            "callback_data": format!("cancel:{key}"),
        }]]
    })
}
