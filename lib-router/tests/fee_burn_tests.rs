//! Router fee accumulation, conversion and burning across swaps

use anyhow::Result;
use lib_router::testing::TestRuntime;
use lib_router::{
    Address, AssetLedger, Capabilities, PoolAnchorConverter, PoolLiquidity, Router, RouterConfig, RouterError,
    RouterEvent, RouterStore, SwapRequest, TokenId, MIN_BURN_THRESHOLD,
};

const N: TokenId = TokenId::NATIVE;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn admin() -> Address {
    Address::new([0xad; 32])
}

fn fee_account() -> Address {
    Address::new([0xfe; 32])
}

fn alice() -> Address {
    Address::new([0xa1; 32])
}

fn token(id: u8) -> TokenId {
    TokenId::new([id; 32])
}

fn request(from: TokenId, to: TokenId, amount_in: u128) -> SwapRequest {
    SwapRequest {
        who: alice(),
        from,
        to,
        amount_in,
        min_amount_out: 0,
        deadline: 1_000,
    }
}

fn burned_events(events: &[RouterEvent]) -> Vec<(TokenId, u128, u128)> {
    events
        .iter()
        .filter_map(|e| match e {
            RouterEvent::FeeBurned {
                asset, flushed, burned, ..
            } => Some((*asset, *flushed, *burned)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_anchor_fees_burn_at_threshold() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    rt.create_pool(&N, &f, 10_000_000, 10_000_000, 0)?;
    rt.mint(&N, &alice(), 200_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(RouterConfig::new(admin(), fee_account()))?;

    router.swap(request(N, f, 100_000), 1)?;
    assert_eq!(router.fee_buffer(&N), 500);
    assert_eq!(router.total_burned(), 0);

    router.swap(request(N, f, 100_000), 2)?;
    assert_eq!(router.fee_buffer(&N), 0);
    assert_eq!(router.total_burned(), MIN_BURN_THRESHOLD);
    assert_eq!(rt.balance_of(&N, &fee_account()), 0);
    assert_eq!(rt.total_issuance(&N), 10_200_000 - 1_000);
    assert_eq!(burned_events(&rt.events()), vec![(N, 1_000, 1_000)]);
    Ok(())
}

#[test]
fn test_foreign_fees_converted_before_burn() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    rt.create_pool(&N, &f, 10_000_000, 10_000_000, 0)?;
    rt.mint(&f, &alice(), 200_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(RouterConfig::new(admin(), fee_account()))?;

    router.swap(request(f, N, 100_000), 1)?;
    router.swap(request(f, N, 100_000), 2)?;

    let burns = burned_events(&rt.events());
    assert_eq!(burns.len(), 1);
    let (asset, flushed, burned) = burns[0];
    assert_eq!(asset, f);
    assert_eq!(flushed, 1_000);
    assert!(burned > 0 && burned < 1_000);
    assert_eq!(router.total_burned(), burned);
    assert_eq!(router.fee_buffer(&f), 0);
    assert_eq!(rt.balance_of(&f, &fee_account()), 0);
    assert_eq!(rt.balance_of(&N, &fee_account()), 0);
    Ok(())
}

#[test]
fn test_conversion_deferred_until_anchor_pool_exists() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    let b = token(2);
    rt.create_pool(&f, &b, 1_000_000, 1_000_000, 0)?;
    rt.mint(&f, &alice(), 400_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(RouterConfig::new(admin(), fee_account()))?;

    router.swap(request(f, b, 100_000), 1)?;
    // Conversion fails without an f/anchor pool but the swap still settles
    let outcome = router.swap(request(f, b, 100_000), 2)?;
    assert!(outcome.amount_out > 0);
    assert_eq!(router.fee_buffer(&f), 1_000);
    assert_eq!(router.total_burned(), 0);
    assert_eq!(rt.balance_of(&f, &fee_account()), 1_000);
    assert!(rt
        .events()
        .iter()
        .any(|e| matches!(e, RouterEvent::FeeConversionDeferred { buffered: 1_000, .. })));

    rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0)?;
    // The pool exists but f has no oracle price until a swap refreshes it
    router.swap(request(f, b, 100_000), 3)?;
    assert_eq!(router.fee_buffer(&f), 1_500);
    assert!(rt.price_state(&f).is_some());

    router.swap(request(f, b, 100_000), 4)?;
    assert_eq!(router.fee_buffer(&f), 0);
    assert!(router.total_burned() > 0);
    assert_eq!(rt.balance_of(&f, &fee_account()), 0);
    Ok(())
}

#[test]
fn test_skewed_pool_defers_fee_conversion() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    let bob = Address::new([0xb0; 32]);
    let pool_id = rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0)?;
    rt.mint(&f, &alice(), 200_000);
    rt.mint(&f, &bob, 1_000_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(RouterConfig::new(admin(), fee_account()))?;

    router.swap(request(f, N, 100_000), 1)?;
    let reference = rt.price_state(&f).expect("price stored after swap");

    // Dump f into the pool outside the router right before the flush
    rt.swap_exact_in(&bob, &pool_id, &f, &N, 1_000_000, 0)?;
    let result = router.swap(request(f, N, 100_000), 2);

    assert!(matches!(result, Err(RouterError::ExcessivePriceDeviation { .. })));
    assert_eq!(router.fee_buffer(&f), 1_000);
    assert_eq!(router.total_burned(), 0);
    assert_eq!(rt.balance_of(&f, &fee_account()), 1_000);
    assert_eq!(rt.price_state(&f), Some(reference));
    assert!(rt.events().iter().any(|e| matches!(
        e,
        RouterEvent::FeeConversionDeferred { buffered: 1_000, .. }
    )));
    Ok(())
}

#[test]
fn test_fee_conservation_across_swaps() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    rt.create_pool(&N, &f, 100_000_000, 100_000_000, 0)?;
    rt.mint(&N, &alice(), 1_000_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(RouterConfig::new(admin(), fee_account()))?;

    let mut collected = 0;
    for (block, amount) in [30_000u128, 45_000, 120_000, 9_000, 61_000, 200_000].into_iter().enumerate() {
        let outcome = router.swap(request(N, f, amount), block as u64 + 1)?;
        collected += outcome.router_fee;
        assert_eq!(router.total_burned() + router.fee_buffer(&N), collected);
    }
    assert_eq!(rt.balance_of(&N, &fee_account()), router.fee_buffer(&N));
    Ok(())
}
