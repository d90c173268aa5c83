//! JSON bridge implementation of the remote collaborators.
//!
//! Every operation is a `POST {url}/{operation}` with a JSON body; the bridge
//! answers with a JSON object. The bridge owns the wallet, chain, proving and
//! pinning SDKs, this client only moves JSON.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::metrics;

use super::error::CollaboratorError;
use super::traits::{
    ChainClient, Pinner, ProvingService, StateVerifier, TokenBuilder, WalletConnector,
};
use super::types::{
    DeployRequest, DeploymentKeys, JobResult, MintTransactionRequest, PinStatus,
    SignedTransaction, TokenAddresses, TxStatus, UnsignedTransaction, WalletConnection,
};

/// Bridge client shared by every remote collaborator.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| CollaboratorError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn operation_url(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url, operation)
    }

    async fn call<B, R>(&self, operation: &str, body: &B) -> Result<R, CollaboratorError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let result = self.send(operation, body).await;
        let label = if result.is_ok() { "ok" } else { "error" };
        metrics::GATEWAY_REQUEST_DURATION
            .with_label_values(&[operation, label])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn send<B, R>(&self, operation: &str, body: &B) -> Result<R, CollaboratorError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.operation_url(operation);
        debug!(operation = operation, "Calling gateway");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let text = response.text().await.map_err(map_transport_error)?;
        decode(&text)
    }
}

fn map_transport_error(e: reqwest::Error) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout
    } else if e.is_connect() {
        CollaboratorError::ConnectionFailed(e.to_string())
    } else {
        CollaboratorError::Api(e.to_string())
    }
}

fn decode<R: DeserializeOwned>(text: &str) -> Result<R, CollaboratorError> {
    serde_json::from_str(text)
        .map_err(|e| CollaboratorError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

// Reply shapes

#[derive(Debug, Deserialize)]
struct PublishReply {
    #[serde(default)]
    hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxStatusReply {
    #[serde(default)]
    status: Option<String>,
}

impl TxStatusReply {
    fn into_status(self) -> Option<TxStatus> {
        self.status
            .filter(|s| !s.is_empty())
            .map(|s| TxStatus::parse(&s))
    }
}

#[derive(Debug, Deserialize)]
struct NonceReply {
    nonce: u64,
}

#[derive(Debug, Deserialize)]
struct SendReply {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SendReply {
    fn into_hash(self) -> Result<String, CollaboratorError> {
        match (self.hash, self.error) {
            (Some(hash), _) if !hash.is_empty() => Ok(hash),
            (_, Some(error)) => Err(CollaboratorError::Rejected(error)),
            _ => Err(CollaboratorError::InvalidResponse(
                "send reply carried no transaction hash".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReply {
    #[serde(default)]
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobReply {
    status: String,
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl JobReply {
    fn into_result(self) -> Result<Option<JobResult>, CollaboratorError> {
        match self.status.as_str() {
            "running" | "pending" | "queued" => Ok(None),
            "completed" | "done" => match self.transaction {
                Some(tx) => Ok(Some(JobResult::Completed(SignedTransaction(tx)))),
                None => Err(CollaboratorError::InvalidResponse(
                    "completed job carried no transaction".to_string(),
                )),
            },
            "failed" | "error" => Ok(Some(JobResult::Failed(
                self.error.unwrap_or_else(|| "proving job failed".to_string()),
            ))),
            other => Err(CollaboratorError::InvalidResponse(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionReply {
    transaction: String,
}

#[derive(Debug, Deserialize)]
struct VerifyReply {
    verified: bool,
}

#[async_trait]
impl WalletConnector for HttpGateway {
    async fn connect(&self) -> Result<WalletConnection, CollaboratorError> {
        self.call("wallet/connect", &json!({})).await
    }
}

#[async_trait]
impl Pinner for HttpGateway {
    async fn publish(&self, content: &str) -> Result<Option<String>, CollaboratorError> {
        let reply: PublishReply = self
            .call("pin/publish", &json!({ "content": content }))
            .await?;
        Ok(reply.hash.filter(|h| !h.is_empty()))
    }

    async fn status(&self, hash: &str) -> Result<PinStatus, CollaboratorError> {
        self.call("pin/status", &json!({ "hash": hash })).await
    }
}

#[async_trait]
impl ChainClient for HttpGateway {
    async fn tx_status(&self, hash: &str) -> Result<Option<TxStatus>, CollaboratorError> {
        let reply: TxStatusReply = self.call("chain/tx-status", &json!({ "hash": hash })).await?;
        Ok(reply.into_status())
    }

    async fn account_nonce(&self, address: &str) -> Result<u64, CollaboratorError> {
        let reply: NonceReply = self
            .call("chain/nonce", &json!({ "address": address }))
            .await?;
        Ok(reply.nonce)
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, CollaboratorError> {
        let reply: SendReply = self
            .call("chain/send", &json!({ "transaction": tx }))
            .await?;
        reply.into_hash()
    }
}

#[async_trait]
impl ProvingService for HttpGateway {
    async fn submit(&self, tx: &UnsignedTransaction) -> Result<Option<String>, CollaboratorError> {
        let reply: SubmitReply = self
            .call("prover/submit", &json!({ "transaction": tx }))
            .await?;
        Ok(reply.job_id.filter(|id| !id.is_empty()))
    }

    async fn result(&self, job_id: &str) -> Result<Option<JobResult>, CollaboratorError> {
        let reply: JobReply = self
            .call("prover/result", &json!({ "jobId": job_id }))
            .await?;
        reply.into_result()
    }
}

#[async_trait]
impl TokenBuilder for HttpGateway {
    async fn generate_deploy_keys(&self) -> Result<DeploymentKeys, CollaboratorError> {
        self.call("builder/keys", &json!({})).await
    }

    async fn build_deploy(
        &self,
        request: &DeployRequest,
    ) -> Result<UnsignedTransaction, CollaboratorError> {
        let reply: TransactionReply = self.call("builder/deploy", request).await?;
        Ok(UnsignedTransaction(reply.transaction))
    }

    async fn build_mint(
        &self,
        request: &MintTransactionRequest,
    ) -> Result<UnsignedTransaction, CollaboratorError> {
        let reply: TransactionReply = self.call("builder/mint", request).await?;
        Ok(UnsignedTransaction(reply.transaction))
    }

    async fn prove(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, CollaboratorError> {
        let reply: TransactionReply = self
            .call("builder/prove", &json!({ "transaction": tx }))
            .await?;
        Ok(SignedTransaction(reply.transaction))
    }
}

#[async_trait]
impl StateVerifier for HttpGateway {
    async fn verify(&self, addresses: &TokenAddresses) -> Result<bool, CollaboratorError> {
        let reply: VerifyReply = self.call("state/verify", addresses).await?;
        Ok(reply.verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(url: &str) -> HttpGateway {
        HttpGateway::new(&GatewayConfig {
            url: url.to_string(),
            api_key: Some(String::new()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_operation_url_trims_trailing_slash() {
        let gw = gateway("http://localhost:3001/");
        assert_eq!(
            gw.operation_url("chain/nonce"),
            "http://localhost:3001/chain/nonce"
        );
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let gw = gateway("http://localhost:3001");
        assert!(gw.api_key.is_none());
    }

    #[test]
    fn test_tx_status_reply() {
        let reply: TxStatusReply = decode(r#"{"status":"applied"}"#).unwrap();
        assert_eq!(reply.into_status(), Some(TxStatus::Applied));

        let reply: TxStatusReply = decode(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(reply.into_status(), Some(TxStatus::Pending));

        let reply: TxStatusReply = decode(r#"{}"#).unwrap();
        assert_eq!(reply.into_status(), None);

        let reply: TxStatusReply = decode(r#"{"status":"Failed_InsufficientFee"}"#).unwrap();
        assert_eq!(
            reply.into_status(),
            Some(TxStatus::Failed("Failed_InsufficientFee".to_string()))
        );
    }

    #[test]
    fn test_send_reply() {
        let reply: SendReply = decode(r#"{"hash":"5Jabc"}"#).unwrap();
        assert_eq!(reply.into_hash().unwrap(), "5Jabc");

        let reply: SendReply = decode(r#"{"error":"nonce too low"}"#).unwrap();
        assert!(matches!(
            reply.into_hash(),
            Err(CollaboratorError::Rejected(msg)) if msg == "nonce too low"
        ));

        let reply: SendReply = decode(r#"{"hash":""}"#).unwrap();
        assert!(matches!(
            reply.into_hash(),
            Err(CollaboratorError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_job_reply() {
        let reply: JobReply = decode(r#"{"status":"running"}"#).unwrap();
        assert_eq!(reply.into_result().unwrap(), None);

        let reply: JobReply = decode(r#"{"status":"completed","transaction":"signed"}"#).unwrap();
        assert_eq!(
            reply.into_result().unwrap(),
            Some(JobResult::Completed(SignedTransaction("signed".to_string())))
        );

        let reply: JobReply = decode(r#"{"status":"failed","error":"out of memory"}"#).unwrap();
        assert_eq!(
            reply.into_result().unwrap(),
            Some(JobResult::Failed("out of memory".to_string()))
        );

        let reply: JobReply = decode(r#"{"status":"completed"}"#).unwrap();
        assert!(reply.into_result().is_err());
    }

    #[test]
    fn test_decode_invalid_json() {
        let result: Result<NonceReply, _> = decode("not json");
        assert!(matches!(result, Err(CollaboratorError::InvalidResponse(_))));
    }

    #[test]
    fn test_decode_deployment_keys() {
        let keys: DeploymentKeys = decode(
            r#"{"tokenAddress":"B62a","adminContractAddress":"B62b","tokenPrivateKey":"EK1","adminContractPrivateKey":"EK2"}"#,
        )
        .unwrap();
        assert_eq!(keys.token_address, "B62a");
        assert_eq!(keys.admin_contract_private_key, "EK2");
    }

    #[tokio::test]
    async fn test_unreachable_bridge_maps_to_connection_failed() {
        // Port 1 is reserved and closed on test hosts.
        let gw = gateway("http://127.0.0.1:1");
        let result = gw.account_nonce("B62a").await;
        assert!(matches!(
            result,
            Err(CollaboratorError::ConnectionFailed(_))
        ));
    }
}
