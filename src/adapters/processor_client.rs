use {
    crate::domain::{
        error::ReconError,
        gateway::{
            CancelOutcome, CaptureOutcome, RefundOutcome, RemoteCard, RemoteProcessorGateway,
            RemoteTransaction,
        },
    },
    serde::{Deserialize, Serialize},
    std::{future::Future, pin::Pin},
};

type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ReconError>> + Send + 'a>>;

/// HTTP client for the remote processor's REST API. Bearer-token auth; every
/// response is normalized into the domain outcome types before it leaves
/// this module.
pub struct ProcessorClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ProcessorClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ReconError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ReconError::Gateway(format!("processor request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ReconError::Gateway(format!(
                "processor returned {} for {path}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ReconError::Gateway(format!("processor response undecodable: {e}")))
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ReconError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ReconError::Gateway(format!("processor request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ReconError::Gateway(format!(
                "processor returned {} for {path}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ReconError::Gateway(format!("processor response undecodable: {e}")))
    }
}

#[derive(Serialize)]
struct CaptureRequest {
    amount: i64,
}

#[derive(Serialize)]
struct CancelRequest<'a> {
    reference: &'a str,
}

#[derive(Serialize)]
struct RefundRequest<'a> {
    amount: i64,
    reference: &'a str,
}

#[derive(Serialize)]
struct CardPatch {
    is_active: bool,
}

impl RemoteProcessorGateway for ProcessorClient {
    fn get_transaction(&self, id: &str) -> ClientFuture<'_, RemoteTransaction> {
        let path = format!("/transactions/{id}");
        Box::pin(async move { self.get_json(&path).await })
    }

    fn capture_transaction(&self, id: &str, amount_minor: i64) -> ClientFuture<'_, CaptureOutcome> {
        let path = format!("/transactions/{id}/captures");
        Box::pin(async move {
            self.post_json(&path, &CaptureRequest {
                amount: amount_minor,
            })
            .await
        })
    }

    fn cancel_transaction(&self, id: &str, reference: &str) -> ClientFuture<'_, CancelOutcome> {
        let path = format!("/transactions/{id}/cancels");
        let reference = reference.to_string();
        Box::pin(async move {
            self.post_json(&path, &CancelRequest {
                reference: &reference,
            })
            .await
        })
    }

    fn refund_transaction(
        &self,
        id: &str,
        amount_minor: i64,
        reference: &str,
    ) -> ClientFuture<'_, RefundOutcome> {
        let path = format!("/transactions/{id}/refunds");
        let reference = reference.to_string();
        Box::pin(async move {
            self.post_json(&path, &RefundRequest {
                amount: amount_minor,
                reference: &reference,
            })
            .await
        })
    }

    fn get_card(&self, card_id: &str) -> ClientFuture<'_, RemoteCard> {
        let path = format!("/cards/{card_id}");
        Box::pin(async move { self.get_json(&path).await })
    }

    fn update_card(&self, card_id: &str, is_active: bool) -> ClientFuture<'_, ()> {
        let path = format!("/cards/{card_id}");
        Box::pin(async move {
            let response = self
                .client
                .patch(format!("{}{path}", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&CardPatch { is_active })
                .send()
                .await
                .map_err(|e| ReconError::Gateway(format!("processor request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(ReconError::Gateway(format!(
                    "processor returned {} for {path}",
                    response.status()
                )));
            }
            Ok(())
        })
    }
}
