//! End-to-end swap scenarios against the in-memory runtime

use anyhow::Result;
use lib_router::testing::{LinearMintCurve, TestRuntime};
use lib_router::{
    Address, AssetLedger, Capabilities, FixedU128, Mechanism, PathSelector, PoolAnchorConverter, PoolLiquidity, Router,
    RouterConfig, RouterError, RouterEvent, RouterState, RouterStore, SwapRequest, TokenId, TokenPriceState,
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

fn config() -> RouterConfig {
    RouterConfig::new(admin(), fee_account())
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

/// Flat curve crediting the whole mint to the buyer at `anchor_per_foreign`
fn fixed_rate_curve(anchor_per_foreign: FixedU128) -> LinearMintCurve {
    LinearMintCurve {
        initial_price: FixedU128::one().saturating_div(anchor_per_foreign).into_inner(),
        slope: 0,
        supply: 0,
        user_allocation_bps: 10_000,
        reserve_account: Address::new([0xee; 32]),
        protocol_account: Address::new([0xef; 32]),
    }
}

#[test]
fn test_curve_beats_undervalued_pool() -> Result<()> {
    init_tracing();
    // Pool values F at 0.5 N, the curve mints 1.02 N per F
    let rt = TestRuntime::new();
    let f = token(1);
    rt.create_pool(&N, &f, 500_000, 1_000_000, 0)?;
    rt.create_curve(&f, fixed_rate_curve(FixedU128::checked_from_rational(102, 100).unwrap()));

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config().with_router_fee_bps(30))?;

    let quote = router.quote(f, N, 1_000)?;

    assert_eq!(quote.router_fee, 3);
    assert_eq!(quote.route.amount_in(), 997);
    assert_eq!(quote.route.hops.len(), 1);
    assert_eq!(quote.route.hops[0].mechanism, Mechanism::CurveMint);
    assert_eq!(quote.expected_output, 1_016);
    Ok(())
}

#[test]
fn test_swap_through_curve_settles() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0)?;
    let curve = fixed_rate_curve(FixedU128::checked_from_rational(102, 100).unwrap());
    rt.create_curve(&f, curve.clone());
    rt.mint(&f, &alice(), 1_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config().with_router_fee_bps(30))?;

    let outcome = router.swap(request(f, N, 1_000), 10)?;

    assert_eq!(outcome.amount_out, 1_016);
    assert!(outcome.route.uses_curve());
    assert_eq!(rt.balance_of(&N, &alice()), 1_016);
    assert_eq!(rt.balance_of(&f, &alice()), 0);
    assert_eq!(rt.balance_of(&f, &curve.reserve_account), 997);
    assert_eq!(rt.balance_of(&f, &fee_account()), 3);
    assert_eq!(rt.curve(&f).unwrap().supply, 1_016);

    let swaps: Vec<RouterEvent> = rt
        .events()
        .into_iter()
        .filter(|e| e.event_type() == "swap_executed")
        .collect();
    assert_eq!(swaps.len(), 1);
    match &swaps[0] {
        RouterEvent::SwapExecuted {
            mechanisms,
            amount_out,
            router_fee,
            block_height,
            ..
        } => {
            assert_eq!(mechanisms, &vec![Mechanism::CurveMint]);
            assert_eq!(*amount_out, 1_016);
            assert_eq!(*router_fee, 3);
            assert_eq!(*block_height, 10);
        }
        other => panic!("unexpected event {:?}", other),
    }
    Ok(())
}

#[test]
fn test_no_route_keeps_fee() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let a = token(1);
    let b = token(2);
    rt.mint(&a, &alice(), 10_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config())?;

    let result = router.swap(request(a, b, 10_000), 1);

    assert_eq!(result, Err(RouterError::NoRouteFound { from: a, to: b }));
    assert_eq!(rt.balance_of(&a, &alice()), 9_950);
    assert_eq!(rt.balance_of(&a, &fee_account()), 50);
    assert_eq!(router.fee_buffer(&a), 50);
    assert!(rt.events().iter().all(|e| e.event_type() != "swap_executed"));
    Ok(())
}

#[test]
fn test_deviation_from_oracle_rejected() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    let pool_id = rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0)?;
    rt.mint(&f, &alice(), 20_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config())?;

    // Oracle says 0.8; the pool pays about 0.99, which is 24% above
    rt.put_price_state(
        &f,
        TokenPriceState {
            price: FixedU128::checked_from_rational(8, 10).unwrap(),
            liquidity_weight: 2_000_000,
            last_update: 5,
        },
    );
    let result = router.swap(request(f, N, 10_000), 5);
    assert!(matches!(
        result,
        Err(RouterError::ExcessivePriceDeviation {
            max_deviation_bps: 2_000,
            ..
        })
    ));
    assert_eq!(rt.pool(&pool_id).unwrap().reserve_a, 1_000_000);
    assert_eq!(rt.balance_of(&f, &alice()), 19_950);

    // Oracle says 0.86; about 15% off is tolerated
    rt.put_price_state(
        &f,
        TokenPriceState {
            price: FixedU128::checked_from_rational(86, 100).unwrap(),
            liquidity_weight: 2_000_000,
            last_update: 5,
        },
    );
    let outcome = router.swap(request(f, N, 10_000), 5)?;
    assert!(outcome.amount_out > 9_000);
    Ok(())
}

#[test]
fn test_slippage_rolls_back_execution() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    let pool_id = rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0)?;
    rt.mint(&f, &alice(), 10_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config())?;

    let mut req = request(f, N, 10_000);
    req.min_amount_out = 9_852;
    let result = router.swap(req, 1);

    assert_eq!(
        result,
        Err(RouterError::SlippageExceeded {
            amount_out: 9_851,
            min_amount_out: 9_852
        })
    );
    assert_eq!(rt.balance_of(&N, &alice()), 0);
    assert_eq!(rt.balance_of(&f, &alice()), 9_950);
    assert_eq!(rt.pool(&pool_id).unwrap().reserve_a, 1_000_000);
    assert!(rt.price_state(&f).is_none());
    assert_eq!(rt.transaction_depth(), 0);

    req.min_amount_out = 9_800;
    req.amount_in = 9_950;
    let outcome = router.swap(req, 2)?;
    assert!(outcome.amount_out >= 9_800);
    Ok(())
}

#[test]
fn test_swap_output_matches_best_quote() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let a = token(1);
    let b = token(2);
    rt.create_pool(&a, &b, 50_000, 50_000, 0)?;
    rt.create_pool(&a, &N, 1_000_000, 1_000_000, 0)?;
    rt.create_pool(&N, &b, 1_000_000, 1_000_000, 0)?;
    rt.mint(&a, &alice(), 40_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config())?;
    let selector = PathSelector::new(&rt, &rt, N);

    for amount in [100u128, 1_000, 10_000, 40_000] {
        let quote = router.quote(a, b, amount)?;
        let net = quote.route.amount_in();
        for path in [vec![a, b], vec![a, N, b]] {
            if let Some(candidate) = selector.route_for_path(&path, net) {
                assert!(quote.expected_output >= candidate.expected_output);
            }
        }
        assert!(quote.route.is_consistent());
    }

    let quote = router.quote(a, b, 40_000)?;
    let outcome = router.swap(request(a, b, 40_000), 3)?;
    assert_eq!(outcome.amount_out, quote.expected_output);
    assert_eq!(outcome.route, quote.route);
    assert_eq!(rt.balance_of(&b, &alice()), outcome.amount_out);
    Ok(())
}

#[test]
fn test_curve_never_used_out_of_anchor() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0)?;
    rt.create_curve(&f, fixed_rate_curve(FixedU128::from_integer(5)));
    rt.mint(&N, &alice(), 10_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config())?;

    let outcome = router.swap(request(N, f, 10_000), 1)?;
    assert!(!outcome.route.uses_curve());
    assert!(outcome
        .route
        .hops
        .iter()
        .all(|h| matches!(h.mechanism, Mechanism::PoolSwap { .. })));
    assert_eq!(rt.curve(&f).unwrap().supply, 0);
    Ok(())
}

#[test]
fn test_oracle_follows_swaps() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    let pool_id = rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0)?;
    rt.mint(&f, &alice(), 100_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config())?;

    router.swap(request(f, N, 50_000), 10)?;
    let first = rt.price_state(&f).unwrap();
    assert_eq!(first.last_update, 10);
    // Selling F pushes its price below 1.0
    assert!(first.price < FixedU128::one());

    let reserves = rt.pool_reserves(&pool_id).unwrap();
    assert_eq!(first.liquidity_weight, 2 * reserves.reserve_a);

    router.swap(request(f, N, 40_000), 20)?;
    let second = rt.price_state(&f).unwrap();
    assert!(second.price < first.price);
    assert_eq!(router.get_price(&f, 20)?, second.price);
    Ok(())
}

#[test]
fn test_initialize_from_toml_and_snapshot_state() -> Result<()> {
    init_tracing();
    let raw = format!(
        "router_fee_bps = 25\nadmin = \"{}\"\nfee_account = \"{}\"\n",
        admin(),
        fee_account()
    );
    let config = RouterConfig::from_toml_str(&raw)?;

    let rt = TestRuntime::new();
    let f = token(1);
    rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0)?;
    rt.mint(&f, &alice(), 10_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config)?;
    let outcome = router.swap(request(f, N, 10_000), 1)?;
    assert_eq!(outcome.router_fee, 25);

    let state = rt.router_state();
    let restored = RouterState::decode(&state.encode()?)?;
    assert_eq!(restored, state);
    assert_eq!(restored.config, Some(config));
    assert_eq!(restored.fee_buffer(&f), 25);
    assert!(restored.prices.contains_key(&f));
    Ok(())
}

#[test]
fn test_deep_pool_swap_passes_deviation_check() -> Result<()> {
    init_tracing();
    let rt = TestRuntime::new();
    let f = token(1);
    let deep = 10u128.pow(27);
    rt.create_pool(&N, &f, deep, deep, 0)?;
    rt.mint(&f, &alice(), 1_000_000);

    let converter = PoolAnchorConverter::new(&rt, &rt, N);
    let router = Router::new(Capabilities::from_host(&rt, &converter));
    router.initialize(config())?;

    assert_eq!(router.get_price(&f, 1)?, FixedU128::one());
    let outcome = router.swap(request(f, N, 1_000_000), 1)?;
    // 995,000 net against 1e27 reserves
    assert_eq!(outcome.amount_out, 994_999);

    let stored = rt.price_state(&f).expect("price stored after swap");
    assert!(stored.price > FixedU128::from_inner(999_999_000_000));
    assert!(stored.price <= FixedU128::one());
    Ok(())
}
