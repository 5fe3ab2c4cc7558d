use std::collections::BTreeSet;

use anyhow::Result;
use common::{
    Contract, StorageItem,
    test_utils::{produce_dummy_account, produce_dummy_contract, produce_dummy_storage_item},
};
use gateway_client::mock::MockGateway;
use integration_tests::{PAYER, TestContext, push_block, wait_until};
use tokio::test;

async fn stored_paths(ctx: &TestContext) -> Result<BTreeSet<String>> {
    let items: Vec<StorageItem> = ctx.get("storage").await?;
    Ok(items.into_iter().map(|item| item.path).collect())
}

fn paths(paths: &[&str]) -> BTreeSet<String> {
    paths.iter().map(|path| path.to_string()).collect()
}

#[test]
async fn storage_follows_remote_listing() -> Result<()> {
    let gateway = MockGateway::new();
    gateway.set_account(
        produce_dummy_account(PAYER, 100),
        vec![produce_dummy_contract(PAYER, "HelloWorld")],
    );
    gateway.set_storage(
        PAYER,
        vec![
            produce_dummy_storage_item(PAYER, "/storage/vault"),
            produce_dummy_storage_item(PAYER, "/public/receiver"),
        ],
    );
    push_block(&gateway, 1);

    let ctx = TestContext::new(gateway).await?;

    let expected = paths(&["/storage/vault", "/public/receiver"]);
    wait_until(|| async {
        Ok((stored_paths(&ctx).await? == expected).then_some(()))
    })
    .await?;

    let contracts = ctx
        .poll::<Contract>(&format!("accounts/{PAYER}/contracts/polling"), 0)
        .await?;
    assert_eq!(contracts.data.len(), 1);
    assert_eq!(contracts.data[0].name, "HelloWorld");

    let cursor = ctx
        .poll::<StorageItem>(&format!("accounts/{PAYER}/storage/polling"), 0)
        .await?
        .meta
        .latest_timestamp;

    ctx.gateway().set_storage(
        PAYER,
        vec![
            produce_dummy_storage_item(PAYER, "/storage/vault"),
            produce_dummy_storage_item(PAYER, "/storage/flowTokenVault"),
        ],
    );

    let expected = paths(&["/storage/vault", "/storage/flowTokenVault"]);
    wait_until(|| async {
        Ok((stored_paths(&ctx).await? == expected).then_some(()))
    })
    .await?;

    // Only the new item changed, the untouched one is not redelivered.
    let changed = ctx
        .poll::<StorageItem>(&format!("accounts/{PAYER}/storage/polling"), cursor)
        .await?;
    let changed: Vec<_> = changed.data.into_iter().map(|item| item.path).collect();
    assert_eq!(changed, vec!["/storage/flowTokenVault".to_string()]);

    ctx.shutdown().await
}

#[test]
async fn storage_resync_recovers_after_failures() -> Result<()> {
    let gateway = MockGateway::new();
    gateway.set_account(produce_dummy_account(PAYER, 100), vec![]);
    gateway.set_storage(
        PAYER,
        vec![produce_dummy_storage_item(PAYER, "/storage/vault")],
    );
    gateway.fail_storage(PAYER);
    push_block(&gateway, 1);

    let ctx = TestContext::new(gateway).await?;

    wait_until(|| async { Ok((ctx.gateway().storage_requests() >= 2).then_some(())) }).await?;
    assert!(stored_paths(&ctx).await?.is_empty());

    ctx.gateway().recover_storage(PAYER);

    let expected = paths(&["/storage/vault"]);
    wait_until(|| async {
        Ok((stored_paths(&ctx).await? == expected).then_some(()))
    })
    .await?;

    ctx.shutdown().await
}
