//! Read-only HTTP surface over the resource indexes.

use actix_web::{HttpResponse, ResponseError, Scope, http::StatusCode, web};
use common::{
    Account, Block, Contract, Event, Resource, StorageItem, Transaction,
    address::ensure_prefixed_address,
};
use indexer_core::store::IndexerReaders;
use indexer_service_protocol::{PollingQuery, PollingResponse};
use serde::Serialize;
use storage::{ReadOnlyIndex, error::IndexError};

type Readers = web::Data<IndexerReaders>;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Index(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            ServiceError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

/// Resource kinds served over HTTP, with the index each one lives in.
pub trait Served: Resource + Serialize {
    fn index(readers: &IndexerReaders) -> &ReadOnlyIndex<Self>;
}

impl Served for Account {
    fn index(readers: &IndexerReaders) -> &ReadOnlyIndex<Self> {
        &readers.accounts
    }
}

impl Served for Block {
    fn index(readers: &IndexerReaders) -> &ReadOnlyIndex<Self> {
        &readers.blocks
    }
}

impl Served for Transaction {
    fn index(readers: &IndexerReaders) -> &ReadOnlyIndex<Self> {
        &readers.transactions
    }
}

impl Served for Event {
    fn index(readers: &IndexerReaders) -> &ReadOnlyIndex<Self> {
        &readers.events
    }
}

impl Served for Contract {
    fn index(readers: &IndexerReaders) -> &ReadOnlyIndex<Self> {
        &readers.contracts
    }
}

impl Served for StorageItem {
    fn index(readers: &IndexerReaders) -> &ReadOnlyIndex<Self> {
        &readers.storage
    }
}

async fn list<R: Served>(readers: Readers) -> HttpResponse {
    HttpResponse::Ok().json(R::index(&readers).find_all().await)
}

async fn find_one<R: Served>(
    readers: Readers,
    id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let resource = R::index(&readers).find_one(&id).await?;
    Ok(HttpResponse::Ok().json(resource))
}

async fn poll<R: Served>(readers: Readers, query: web::Query<PollingQuery>) -> HttpResponse {
    let data = R::index(&readers)
        .find_changed_after(query.timestamp)
        .await;
    HttpResponse::Ok().json(PollingResponse::new(data))
}

/// Polls the slice of `R` selected by `filter`.
async fn poll_where<R: Served>(
    readers: &IndexerReaders,
    query: PollingQuery,
    filter: impl Fn(&R) -> bool,
) -> HttpResponse {
    let data = R::index(readers)
        .find_where(|resource| resource.last_changed_at() > query.timestamp && filter(resource))
        .await;
    HttpResponse::Ok().json(PollingResponse::new(data))
}

async fn poll_account_storage(
    readers: Readers,
    address: web::Path<String>,
    query: web::Query<PollingQuery>,
) -> HttpResponse {
    let address = ensure_prefixed_address(&address);
    poll_where::<StorageItem>(&readers, *query, |item| item.address == address).await
}

async fn poll_account_contracts(
    readers: Readers,
    address: web::Path<String>,
    query: web::Query<PollingQuery>,
) -> HttpResponse {
    let address = ensure_prefixed_address(&address);
    poll_where::<Contract>(&readers, *query, |contract| contract.address == address).await
}

async fn poll_account_transactions(
    readers: Readers,
    address: web::Path<String>,
    query: web::Query<PollingQuery>,
) -> HttpResponse {
    let address = ensure_prefixed_address(&address);
    poll_where::<Transaction>(&readers, *query, |transaction| {
        transaction
            .participant_addresses()
            .any(|participant| participant == address)
    })
    .await
}

async fn poll_block_transactions(
    readers: Readers,
    block_id: web::Path<String>,
    query: web::Query<PollingQuery>,
) -> HttpResponse {
    poll_where::<Transaction>(&readers, *query, |transaction| {
        transaction.block_id == *block_id
    })
    .await
}

async fn poll_transaction_events(
    readers: Readers,
    transaction_id: web::Path<String>,
    query: web::Query<PollingQuery>,
) -> HttpResponse {
    poll_where::<Event>(&readers, *query, |event| {
        event.transaction_id == *transaction_id
    })
    .await
}

/// `GET <path>`, `GET <path>/polling` and `GET <path>/<id>`, with `nested` routes
/// registered before the id catch-all.
fn resource_scope<R: Served>(path: &str, nested: impl FnOnce(Scope) -> Scope) -> Scope {
    let scope = web::scope(path)
        .route("", web::get().to(list::<R>))
        .route("/polling", web::get().to(poll::<R>));

    nested(scope).route("/{id:.*}", web::get().to(find_one::<R>))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(resource_scope::<Account>("/accounts", |scope| {
        scope
            .route(
                "/{address}/storage/polling",
                web::get().to(poll_account_storage),
            )
            .route(
                "/{address}/contracts/polling",
                web::get().to(poll_account_contracts),
            )
            .route(
                "/{address}/transactions/polling",
                web::get().to(poll_account_transactions),
            )
    }))
    .service(resource_scope::<Block>("/blocks", |scope| {
        scope.route(
            "/{id}/transactions/polling",
            web::get().to(poll_block_transactions),
        )
    }))
    .service(resource_scope::<Transaction>("/transactions", |scope| {
        scope.route(
            "/{id}/events/polling",
            web::get().to(poll_transaction_events),
        )
    }))
    .service(resource_scope::<Event>("/events", |scope| scope))
    .service(resource_scope::<Contract>("/contracts", |scope| scope))
    .service(resource_scope::<StorageItem>("/storage", |scope| scope));
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};
    use common::{
        Timestamps,
        test_utils::{
            produce_dummy_account, produce_dummy_block, produce_dummy_contract,
            produce_dummy_event, produce_dummy_storage_item, produce_dummy_transaction,
        },
    };
    use indexer_core::store::IndexerStore;
    use indexer_service_protocol::PollingMeta;

    use super::*;

    async fn seeded_store() -> IndexerStore {
        let store = IndexerStore::new();
        let block = produce_dummy_block(1);
        store
            .transactions
            .add(produce_dummy_transaction("tx-1", &block.id, "0x01"))
            .await
            .unwrap();
        store
            .transactions
            .add(produce_dummy_transaction("tx-2", &block.id, "0x02"))
            .await
            .unwrap();
        store
            .events
            .add(produce_dummy_event("tx-1", 0, "A.01.Dummy.Ping"))
            .await
            .unwrap();
        store.blocks.add(block).await.unwrap();
        store
            .accounts
            .add(produce_dummy_account("0x01", 10))
            .await
            .unwrap();
        store
            .contracts
            .add(produce_dummy_contract("0x01", "HelloWorld"))
            .await
            .unwrap();
        store
            .storage
            .add(produce_dummy_storage_item("0x01", "/storage/vault"))
            .await
            .unwrap();
        store
            .storage
            .add(produce_dummy_storage_item("0x02", "/storage/vault"))
            .await
            .unwrap();
        store
    }

    macro_rules! init_app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($store.readers()))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_list_and_find_one() {
        let store = seeded_store().await;
        let app = init_app!(store);

        let request = test::TestRequest::get().uri("/blocks").to_request();
        let blocks: Vec<Block> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(blocks.len(), 1);

        let request = test::TestRequest::get().uri("/blocks/block-1").to_request();
        let block: Block = test::call_and_read_body_json(&app, request).await;
        assert_eq!(block.height, 1);

        let request = test::TestRequest::get()
            .uri("/storage/0x01./storage/vault")
            .to_request();
        let item: StorageItem = test::call_and_read_body_json(&app, request).await;
        assert_eq!(item.address, "0x01");
    }

    #[actix_web::test]
    async fn test_unknown_id_is_not_found() {
        let store = seeded_store().await;
        let app = init_app!(store);

        let request = test::TestRequest::get()
            .uri("/transactions/unknown")
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_polling_without_timestamp_returns_everything() {
        let store = seeded_store().await;
        let app = init_app!(store);

        let request = test::TestRequest::get()
            .uri("/transactions/polling")
            .to_request();
        let response: PollingResponse<Transaction> =
            test::call_and_read_body_json(&app, request).await;

        assert_eq!(response.data.len(), 2);
        let latest = response
            .data
            .iter()
            .map(|transaction| transaction.timestamps.last_changed_at())
            .max()
            .unwrap();
        assert_eq!(
            response.meta,
            PollingMeta {
                latest_timestamp: latest
            }
        );
    }

    #[actix_web::test]
    async fn test_polling_with_cursor_is_strict() {
        let store = seeded_store().await;
        let app = init_app!(store);
        let transactions = store.transactions.find_all().await;
        let first = transactions[0].timestamps;

        let request = test::TestRequest::get()
            .uri(&format!(
                "/transactions/polling?timestamp={}",
                first.last_changed_at()
            ))
            .to_request();
        let response: PollingResponse<Transaction> =
            test::call_and_read_body_json(&app, request).await;

        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].id, transactions[1].id);
    }

    #[actix_web::test]
    async fn test_empty_poll_has_zero_cursor() {
        let store = IndexerStore::new();
        let app = init_app!(store);

        let request = test::TestRequest::get()
            .uri("/events/polling?timestamp=0")
            .to_request();
        let response: PollingResponse<Event> = test::call_and_read_body_json(&app, request).await;

        assert!(response.data.is_empty());
        assert_eq!(response.meta.latest_timestamp, 0);
    }

    #[actix_web::test]
    async fn test_filtered_slices() {
        let store = seeded_store().await;
        let app = init_app!(store);

        let request = test::TestRequest::get()
            .uri("/accounts/0x01/storage/polling")
            .to_request();
        let storage: PollingResponse<StorageItem> =
            test::call_and_read_body_json(&app, request).await;
        assert_eq!(storage.data.len(), 1);
        assert_eq!(storage.data[0].address, "0x01");

        let request = test::TestRequest::get()
            .uri("/accounts/0x02/transactions/polling")
            .to_request();
        let transactions: PollingResponse<Transaction> =
            test::call_and_read_body_json(&app, request).await;
        assert_eq!(transactions.data.len(), 1);
        assert_eq!(transactions.data[0].id, "tx-2");

        let request = test::TestRequest::get()
            .uri("/accounts/0x01/contracts/polling")
            .to_request();
        let contracts: PollingResponse<Contract> =
            test::call_and_read_body_json(&app, request).await;
        assert_eq!(contracts.data.len(), 1);

        let request = test::TestRequest::get()
            .uri("/blocks/block-1/transactions/polling")
            .to_request();
        let transactions: PollingResponse<Transaction> =
            test::call_and_read_body_json(&app, request).await;
        assert_eq!(transactions.data.len(), 2);

        let request = test::TestRequest::get()
            .uri("/transactions/tx-1/events/polling")
            .to_request();
        let events: PollingResponse<Event> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(events.data.len(), 1);
        assert_eq!(
            events.meta.latest_timestamp,
            events.data[0].timestamps.last_changed_at()
        );
    }

    #[actix_web::test]
    async fn test_filtered_slice_respects_cursor() {
        let store = seeded_store().await;
        let app = init_app!(store);
        let Timestamps { updated_at, .. } = store
            .storage
            .find_one("0x01./storage/vault")
            .await
            .unwrap()
            .timestamps;

        let request = test::TestRequest::get()
            .uri(&format!("/accounts/0x01/storage/polling?timestamp={updated_at}"))
            .to_request();
        let storage: PollingResponse<StorageItem> =
            test::call_and_read_body_json(&app, request).await;

        assert!(storage.data.is_empty());
        assert_eq!(storage.meta.latest_timestamp, 0);
    }
}
