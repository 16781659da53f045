mod common;

use assert_matches::assert_matches;
use common::{kinds, TestContext};
use order_ledger::{entities::address::AddressType, errors::ServiceError, events::Event};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn updating_a_cart_recomputes_its_order_total() {
    let ctx = TestContext::new().await;
    let profile = ctx.profile("sync@example.com").await;
    let cart = ctx.cart(dec!(40.00)).await;
    let (order, _) = ctx
        .services
        .ledger
        .get_or_create_active_order(profile.id, cart.id)
        .await
        .unwrap();
    assert_eq!(order.total, dec!(49.99));

    let (cart, synced) = ctx
        .services
        .carts
        .update_total(cart.id, dec!(55.50))
        .await
        .unwrap();

    assert_eq!(cart.total, dec!(55.50));
    let synced = synced.expect("single order should be recomputed");
    assert_eq!(synced.id, order.id);
    assert_eq!(synced.total, dec!(65.49));
    assert_eq!(ctx.reload(order.id).await.total, dec!(65.49));
}

#[tokio::test]
async fn creating_a_cart_touches_no_order() {
    let mut ctx = TestContext::new().await;
    let cart = ctx.cart(dec!(10.00)).await;

    assert!(ctx
        .services
        .ledger
        .list_orders_for_cart(cart.id)
        .await
        .unwrap()
        .is_empty());
    assert!(ctx.drain_events().is_empty());
}

#[tokio::test]
async fn cart_without_orders_is_skipped_quietly() {
    let mut ctx = TestContext::new().await;
    let cart = ctx.cart(dec!(10.00)).await;

    let (_, synced) = ctx
        .services
        .carts
        .update_total(cart.id, dec!(11.00))
        .await
        .unwrap();
    assert!(synced.is_none());
    assert!(ctx.drain_events().is_empty());
}

#[tokio::test]
async fn cart_shared_by_several_orders_is_skipped() {
    let mut ctx = TestContext::new().await;
    let alice = ctx.profile("a@example.com").await;
    let bob = ctx.profile("b@example.com").await;
    let cart = ctx.cart(dec!(40.00)).await;
    let ledger = &ctx.services.ledger;

    let (first, _) = ledger
        .get_or_create_active_order(alice.id, cart.id)
        .await
        .unwrap();
    let (second, _) = ledger
        .get_or_create_active_order(bob.id, cart.id)
        .await
        .unwrap();
    ctx.drain_events();

    let (_, synced) = ctx
        .services
        .carts
        .update_total(cart.id, dec!(100.00))
        .await
        .unwrap();

    assert!(synced.is_none());
    assert_eq!(ctx.reload(first.id).await.total, dec!(49.99));
    assert_eq!(ctx.reload(second.id).await.total, dec!(49.99));

    let events = ctx.drain_events();
    assert_eq!(events.len(), 1);
    assert_matches!(
        &events[0],
        Event::CartOrderMappingSkipped { cart_id, matching_orders: 2, .. } if *cart_id == cart.id
    );
}

#[tokio::test]
async fn direct_sync_matches_the_cart_service_path() {
    let ctx = TestContext::new().await;
    let profile = ctx.profile("direct@example.com").await;
    let cart = ctx.cart(dec!(0.01)).await;
    let (order, _) = ctx
        .services
        .ledger
        .get_or_create_active_order(profile.id, cart.id)
        .await
        .unwrap();
    assert_eq!(order.total, dec!(10.00));

    let synced = ctx.services.ledger.sync_cart_total(cart.id).await.unwrap();
    assert_eq!(synced.map(|o| o.total), Some(dec!(10.00)));
}

#[tokio::test]
async fn negative_cart_total_is_rejected() {
    let ctx = TestContext::new().await;
    let cart = ctx.cart(dec!(5.00)).await;

    let err = ctx
        .services
        .carts
        .update_total(cart.id, dec!(-1.00))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = ctx
        .services
        .carts
        .update_total(Uuid::new_v4(), dec!(1.00))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn orders_survive_deletion_of_their_references() {
    let mut ctx = TestContext::new().await;
    let profile = ctx.profile("gone@example.com").await;
    let cart = ctx.cart(dec!(40.00)).await;
    let (order, _) = ctx
        .services
        .ledger
        .get_or_create_active_order(profile.id, cart.id)
        .await
        .unwrap();
    let shipping = ctx.address(profile.id, AddressType::Shipping).await;
    ctx.services
        .ledger
        .attach_shipping_address(order.id, shipping.id)
        .await
        .unwrap();
    ctx.drain_events();

    ctx.services.carts.delete_cart(cart.id).await.unwrap();
    ctx.services.billing.delete_address(shipping.id).await.unwrap();
    ctx.services.billing.delete_profile(profile.id).await.unwrap();

    let order = ctx.reload(order.id).await;
    assert_eq!(order.cart_id, None);
    assert_eq!(order.shipping_address_id, None);
    assert_eq!(order.billing_profile_id, None);
    assert_eq!(order.total, dec!(49.99));
    assert!(kinds(&ctx.drain_events()).is_empty());
}

#[tokio::test]
async fn cart_totals_must_fit_the_amount_column() {
    let ctx = TestContext::new().await;
    let carts = &ctx.services.carts;

    let err = carts.create_cart(dec!(123456789.00)).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    let err = carts.create_cart(dec!(1.005)).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let cart = ctx.cart(dec!(1.00)).await;
    let err = carts.update_total(cart.id, dec!(0.001)).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    let stored = carts.get_cart(cart.id).await.unwrap().unwrap();
    assert_eq!(stored.total, dec!(1.00));
}

#[tokio::test]
async fn order_total_overflow_rolls_back_the_cart_update() {
    let mut ctx = TestContext::new().await;
    let profile = ctx.profile("big@example.com").await;
    let cart = ctx.cart(dec!(40.00)).await;
    let (order, _) = ctx
        .services
        .ledger
        .get_or_create_active_order(profile.id, cart.id)
        .await
        .unwrap();
    ctx.drain_events();

    // fits the cart column, but adding shipping does not
    let err = ctx
        .services
        .carts
        .update_total(cart.id, dec!(9999999.99))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DataIntegrity(_));

    let stored = ctx.services.carts.get_cart(cart.id).await.unwrap().unwrap();
    assert_eq!(stored.total, dec!(40.00));
    assert_eq!(ctx.reload(order.id).await.total, dec!(49.99));
    assert!(ctx.drain_events().is_empty());
}

#[tokio::test]
async fn oversized_order_total_creates_no_order() {
    let mut ctx = TestContext::new().await;
    let profile = ctx.profile("huge@example.com").await;
    let cart = ctx.cart(dec!(9999995.00)).await;

    let err = ctx
        .services
        .ledger
        .get_or_create_active_order(profile.id, cart.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DataIntegrity(_));
    assert!(ctx
        .services
        .ledger
        .list_orders_for_cart(cart.id)
        .await
        .unwrap()
        .is_empty());
    assert!(ctx.drain_events().is_empty());
}
