use std::{future::Future, time::Duration};

use anyhow::Context as _;
use async_trait::async_trait;
use common::{
    Account, Block, Contract, Event, StorageItem, Transaction, TransactionStatus,
    address::ensure_non_prefixed_address, block::BlockHeight, config::BasicAuth,
};
use futures::{StreamExt as _, TryStreamExt as _, stream};
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio_retry::{RetryIf, strategy::FibonacciBackoff};
use url::Url;

use crate::{
    BackoffConfig, BlockContents, GatewayClient, GatewayResult,
    cadence::{address_argument, decode_base64_json, decode_value, encode_base64},
    error::GatewayError,
    rest::{
        RestAccount, RestBlock, RestCollection, RestScriptRequest, RestTransaction,
        RestTransactionResult, storage_items,
    },
};

const GET_ACCOUNT_STORAGE_SCRIPT: &str = include_str!("scripts/get_account_storage.cdc");

/// Gateway over the Access REST API.
///
/// Transient failures are retried with a Fibonacci backoff, the whole call including
/// retries is bounded by `request_timeout`. At most `max_concurrent_requests` requests are
/// in flight at once, however many callers share the client.
pub struct HttpGatewayClient {
    client: Client,
    addr: Url,
    auth: Option<BasicAuth>,
    backoff: BackoffConfig,
    request_timeout: Duration,
    max_concurrent_requests: usize,
    request_permits: Semaphore,
}

impl HttpGatewayClient {
    pub fn new(
        addr: Url,
        auth: Option<BasicAuth>,
        backoff: BackoffConfig,
        request_timeout: Duration,
        max_concurrent_requests: usize,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let max_concurrent_requests = max_concurrent_requests.max(1);

        Ok(Self {
            client,
            addr,
            auth,
            backoff,
            request_timeout,
            max_concurrent_requests,
            request_permits: Semaphore::new(max_concurrent_requests),
        })
    }

    /// Sends one attempt of a request, holding a permit until the body is read.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> GatewayResult<T> {
        let _permit = self
            .request_permits
            .acquire()
            .await
            .map_err(|_| GatewayError::decode("gateway client is shut down"))?;
        read_json(request.send().await?, what).await
    }

    fn endpoint(&self, path: &str) -> GatewayResult<Url> {
        self.addr
            .join(path)
            .map_err(|err| GatewayError::decode(format!("invalid endpoint {path:?}: {err}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(auth) => request.basic_auth(&auth.username, auth.password.as_ref()),
            None => request,
        }
    }

    async fn with_retries<T, F, Fut>(&self, what: &str, action: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let strategy = FibonacciBackoff::from_millis(self.backoff.start_delay_millis)
            .take(self.backoff.max_retries);

        let attempts = RetryIf::spawn(strategy, action, |err: &GatewayError| {
            let transient = err.is_transient();
            if transient {
                warn!("Gateway request {what} failed, retrying: {err:#}");
            }
            transient
        });

        tokio::time::timeout(self.request_timeout, attempts)
            .await
            .map_err(|_| GatewayError::Timeout(self.request_timeout))?
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GatewayResult<T> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");

        self.with_retries(path, || {
            let request = self.authorize(self.client.get(url.clone()).query(query));
            self.send_json(request, path)
        })
        .await
    }

    async fn execute_script(
        &self,
        script: &str,
        arguments: &[serde_json::Value],
    ) -> GatewayResult<serde_json::Value> {
        let url = self.endpoint("v1/scripts")?;
        let body = RestScriptRequest {
            script: encode_base64(script.as_bytes()),
            arguments: arguments
                .iter()
                .map(|argument| encode_base64(argument.to_string().as_bytes()))
                .collect(),
        };

        let encoded: String = self
            .with_retries("v1/scripts", || {
                let request = self.authorize(
                    self.client
                        .post(url.clone())
                        .query(&[("block_height", "sealed")])
                        .json(&body),
                );
                self.send_json(request, "v1/scripts")
            })
            .await?;

        Ok(decode_value(&decode_base64_json(&encoded)?))
    }

    async fn get_block_by_id(&self, block_id: &str) -> GatewayResult<RestBlock> {
        let blocks: Vec<RestBlock> = self
            .get_json(&format!("v1/blocks/{block_id}"), &[("expand", "payload")])
            .await?;
        blocks
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound(format!("block {block_id}")))
    }

    async fn get_transaction_result(
        &self,
        transaction_id: &str,
    ) -> GatewayResult<RestTransactionResult> {
        self.get_json(&format!("v1/transaction_results/{transaction_id}"), &[])
            .await
    }

    /// Transactions of a block in execution order, with their results.
    ///
    /// Every collection and transaction result is requested once.
    async fn block_transactions(
        &self,
        block_id: &str,
    ) -> GatewayResult<Vec<(RestTransaction, RestTransactionResult)>> {
        let block = self.get_block_by_id(block_id).await?;

        let mut transactions = vec![];
        for guarantee in block.payload.unwrap_or_default().collection_guarantees {
            let collection: RestCollection = self
                .get_json(
                    &format!("v1/collections/{}", guarantee.collection_id),
                    &[("expand", "transactions")],
                )
                .await?;
            transactions.extend(collection.transactions);
        }

        stream::iter(transactions)
            .map(|transaction| async move {
                let result = self.get_transaction_result(&transaction.id).await?;
                Ok::<_, GatewayError>((transaction, result))
            })
            .buffered(self.max_concurrent_requests)
            .try_collect()
            .await
    }

    async fn get_rest_account(&self, address: &str, expand: &str) -> GatewayResult<RestAccount> {
        let address = ensure_non_prefixed_address(address);
        self.get_json(&format!("v1/accounts/{address}"), &[("expand", expand)])
            .await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> GatewayResult<T> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(GatewayError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| GatewayError::decode(format!("{what}: {err}")))
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn get_latest_block_height(&self) -> GatewayResult<BlockHeight> {
        let blocks: Vec<RestBlock> = self.get_json("v1/blocks", &[("height", "sealed")]).await?;
        blocks
            .first()
            .map(|block| block.header.height)
            .ok_or_else(|| GatewayError::NotFound("sealed block".to_string()))
    }

    async fn get_block_by_height(&self, height: BlockHeight) -> GatewayResult<Block> {
        let height_param = height.to_string();
        let blocks: Vec<RestBlock> = self
            .get_json(
                "v1/blocks",
                &[("height", height_param.as_str()), ("expand", "payload")],
            )
            .await?;

        blocks
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound(format!("block at height {height}")))?
            .try_into()
    }

    async fn get_transactions_in_block(&self, block_id: &str) -> GatewayResult<Vec<Transaction>> {
        Ok(self.get_block_contents(block_id).await?.transactions)
    }

    async fn get_events_in_block(&self, block_id: &str) -> GatewayResult<Vec<Event>> {
        Ok(self.get_block_contents(block_id).await?.events)
    }

    async fn get_block_contents(&self, block_id: &str) -> GatewayResult<BlockContents> {
        let mut contents = BlockContents::default();
        for (transaction, result) in self.block_transactions(block_id).await? {
            let status = result.status()?;
            for event in result.events {
                contents.events.push(event.into_event(block_id)?);
            }
            contents
                .transactions
                .push(transaction.into_transaction(block_id, status)?);
        }
        Ok(contents)
    }

    async fn get_transaction_status(
        &self,
        transaction_id: &str,
    ) -> GatewayResult<TransactionStatus> {
        self.get_transaction_result(transaction_id).await?.status()
    }

    async fn get_account(&self, address: &str) -> GatewayResult<Account> {
        Ok(self.get_rest_account(address, "keys").await?.to_account())
    }

    async fn get_account_contracts(&self, address: &str) -> GatewayResult<Vec<Contract>> {
        self.get_rest_account(address, "contracts").await?.contracts()
    }

    async fn get_account_storage(&self, address: &str) -> GatewayResult<Vec<StorageItem>> {
        let listing = self
            .execute_script(GET_ACCOUNT_STORAGE_SCRIPT, &[address_argument(address)])
            .await?;
        storage_items(address, &listing)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::{Value, json};

    use super::*;

    fn client(addr: &str) -> HttpGatewayClient {
        HttpGatewayClient::new(
            Url::parse(addr).unwrap(),
            Some("flow:secret".parse().unwrap()),
            BackoffConfig::default(),
            Duration::from_secs(1),
            8,
        )
        .unwrap()
    }

    fn rest_transaction(id: &str) -> Value {
        json!({
            "id": id,
            "script": encode_base64(b"transaction {}"),
            "arguments": [],
            "reference_block_id": "b0",
            "gas_limit": "9999",
            "payer": "f8d6e0586b0a20c7",
            "proposal_key": { "address": "f8d6e0586b0a20c7", "key_index": "0", "sequence_number": "0" },
            "authorizers": ["f8d6e0586b0a20c7"]
        })
    }

    fn rest_result(events: Value) -> Value {
        json!({ "block_id": "b1", "status": "Sealed", "status_code": 0, "events": events })
    }

    /// Block `b1` with one collection holding `transaction_ids`. Only the first
    /// transaction emits an event. Results are answered after `result_delay`.
    async fn serve_block<'a>(
        server: &'a MockServer,
        transaction_ids: &[&str],
        result_delay: Duration,
    ) -> Vec<httpmock::Mock<'a>> {
        let block = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/blocks/b1")
                    .query_param("expand", "payload");
                then.status(200).json_body(json!([{
                    "header": {
                        "id": "b1",
                        "parent_id": "b0",
                        "height": "1",
                        "timestamp": "2024-01-01T00:00:01Z"
                    },
                    "payload": { "collection_guarantees": [ { "collection_id": "c1" } ] }
                }]));
            })
            .await;
        let transactions: Vec<_> = transaction_ids
            .iter()
            .map(|id| rest_transaction(id))
            .collect();
        let collection = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/collections/c1")
                    .query_param("expand", "transactions");
                then.status(200)
                    .json_body(json!({ "transactions": transactions }));
            })
            .await;

        let mut mocks = vec![block, collection];
        for (index, id) in transaction_ids.iter().enumerate() {
            let events = if index == 0 {
                json!([{
                    "type": "A.01.Dummy.Ping",
                    "transaction_id": id,
                    "transaction_index": "0",
                    "event_index": "0",
                    "payload": encode_base64(br#"{"type":"Void"}"#)
                }])
            } else {
                json!([])
            };
            let result = server
                .mock_async(|when, then| {
                    when.method(GET).path(format!("/v1/transaction_results/{id}"));
                    then.status(200)
                        .delay(result_delay)
                        .json_body(rest_result(events));
                })
                .await;
            mocks.push(result);
        }
        mocks
    }

    #[test]
    fn endpoints_are_relative_to_base_url() {
        let client = client("http://localhost:8888/");
        assert_eq!(
            client.endpoint("v1/blocks").unwrap().as_str(),
            "http://localhost:8888/v1/blocks"
        );
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transient() {
        let client = HttpGatewayClient::new(
            Url::parse("http://127.0.0.1:9/").unwrap(),
            None,
            BackoffConfig {
                start_delay_millis: 1,
                max_retries: 1,
            },
            Duration::from_secs(5),
            8,
        )
        .unwrap();

        let err = client.get_latest_block_height().await.unwrap_err();
        assert!(err.is_transient(), "{err:#}");
    }

    #[tokio::test]
    async fn block_contents_fetch_every_remote_object_once() {
        let server = MockServer::start_async().await;
        let mocks = serve_block(&server, &["tx1", "tx2"], Duration::ZERO).await;
        let client = client(&server.base_url());

        let contents = client.get_block_contents("b1").await.unwrap();

        let ids: Vec<_> = contents.transactions.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(ids, vec!["tx1", "tx2"]);
        assert!(contents.transactions.iter().all(|tx| tx.block_id == "b1"));
        assert_eq!(contents.events.len(), 1);
        assert_eq!(contents.events[0].id, "tx1.0");
        for mock in &mocks {
            assert_eq!(mock.hits_async().await, 1);
        }
    }

    #[tokio::test]
    async fn requests_respect_concurrency_limit() {
        let server = MockServer::start_async().await;
        let delay = Duration::from_millis(100);
        let _mocks = serve_block(&server, &["tx1", "tx2", "tx3"], delay).await;
        let client = HttpGatewayClient::new(
            Url::parse(&server.base_url()).unwrap(),
            None,
            BackoffConfig::default(),
            Duration::from_secs(5),
            1,
        )
        .unwrap();

        let started = std::time::Instant::now();
        let contents = client.get_block_contents("b1").await.unwrap();

        assert_eq!(contents.transactions.len(), 3);
        // One permit serializes the three delayed results.
        assert!(started.elapsed() >= delay * 3, "{:?}", started.elapsed());
    }
}
