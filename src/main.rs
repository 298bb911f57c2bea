//! Folio portfolio valuation service
//!
//! Watches one wallet and keeps a live USD valuation of it:
//! - Spot holdings (static allow-list + discovered tokens)
//! - Staking pools and AMM liquidity positions read on chain
//! - Lending and collection positions from the position feed
//! - Tiered pricing through the external quoter and the in-ecosystem AMM

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use folio_api::PortfolioApiClient;
use folio_chain::{ChainReader, ProviderManager};
use folio_core::{
    AppConfig, ExternalReader, HoldingsReader, LiquidityReader, PortfolioService, PriceResolver,
    PricingContext, SchedulerSettings, StakingReader, TokenRegistry, VisibilityFilter,
};

/// Environment variable names.
mod env {
    pub const WALLET: &str = "FOLIO_WALLET";
    pub const HIDE: &str = "FOLIO_HIDE";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();
    init_tracing();

    // FOLIO_CONFIG selects a TOML file, otherwise FOLIO_PROFILE a built-in profile
    let config = AppConfig::load().context("Failed to load configuration")?;
    config.log_config();

    let service = Arc::new(initialize_service(&config).await?);
    let visibility = load_visibility(&config)?;
    let handles = service.start();

    match std::env::var(env::WALLET).ok().map(|w| w.trim().parse::<Address>()) {
        Some(Ok(wallet)) => service.connect(wallet),
        Some(Err(e)) => warn!(error = %e, "Invalid {}; no wallet connected", env::WALLET),
        None => warn!("{} not set; no wallet connected", env::WALLET),
    }

    let mut views = service.subscribe();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                match view {
                    Some(view) => {
                        let snapshot = &view.valuation.snapshot;
                        info!(
                            wallet = %snapshot.wallet,
                            total_usd = %snapshot.total_usd.round_dp(2),
                            visible_holdings_usd = %view.valuation.visible_holdings_usd(&visibility).round_dp(2),
                            unpriced = snapshot.unpriced_count,
                            data_unavailable = view.data_unavailable,
                            healthy = view.network.as_ref().map(|n| n.is_healthy),
                            "Portfolio updated"
                        );
                    }
                    None => info!("Portfolio view cleared"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    service.shutdown();
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Polling task ended abnormally");
        }
    }
    info!("Stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,folio_core=debug,folio_chain=debug"));
    let json = std::env::var(env::LOG_FORMAT).is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

async fn initialize_service(config: &AppConfig) -> Result<PortfolioService> {
    info!("Initializing components...");

    let provider = Arc::new(
        ProviderManager::new(
            &config.chain.rpc_url,
            config.chain.multicall,
            config.chain.batch_size,
            config.chain.call_timeout(),
        )
        .await
        .context("Failed to connect to RPC")?,
    );
    let chain_id = provider.chain_id().await?;
    if chain_id != config.chain.chain_id {
        warn!(
            expected = config.chain.chain_id,
            actual = chain_id,
            "RPC chain id differs from configuration"
        );
    }
    let chain: Arc<dyn ChainReader> = provider.clone();

    let api = Arc::new(PortfolioApiClient::new(
        config.api.discovery_url.clone(),
        config.api.positions_url.clone(),
        config.api.request_timeout(),
    )?);
    info!(discovery = api.discovery_url(), "API client initialized");

    // Reference stable and base asset metadata; quotes are scaled by their decimals
    let static_tokens = config.static_tokens();
    let native = config.native_token();
    let registry = TokenRegistry::from_static(&static_tokens, native.clone());
    let reference = registry
        .anchor(chain.as_ref(), config.pricing.reference_stablecoin)
        .await
        .with_context(|| {
            format!(
                "Reference stablecoin {} has unreadable decimals; list it under [[tokens]]",
                config.pricing.reference_stablecoin
            )
        })?;
    let base = match config.pricing.base_asset {
        Some(base) => Some(registry.anchor(chain.as_ref(), base).await.with_context(|| {
            format!("Base asset {base} has unreadable decimals; list it under [[tokens]]")
        })?),
        None => None,
    };
    info!(
        reference = %reference.symbol,
        reference_decimals = reference.decimals,
        base = ?base.as_ref().map(|b| b.symbol.as_str()),
        "Pricing anchors resolved"
    );

    let context = PricingContext::new(&config.pricing, reference, base);
    let resolver = Arc::new(PriceResolver::new(
        chain.clone(),
        context,
        config.contracts.quoter,
        config.contracts.ecosystem_factory,
        config.pricing.max_concurrent_quotes,
    ));

    let mut service = PortfolioService::new(
        chain.clone(),
        api.clone(),
        resolver,
        HoldingsReader::new(chain.clone(), config.chain.multicall),
        static_tokens,
        native,
        SchedulerSettings::from(config),
    )
    .with_provider(provider);

    if let Some(staking) = config.contracts.staking {
        service = service.with_staking(StakingReader::new(chain.clone(), staking));
        info!(%staking, "Staking reader enabled");
    }
    if let Some(factory) = config.contracts.ecosystem_factory {
        service = service.with_liquidity(LiquidityReader::new(
            chain.clone(),
            factory,
            config.liquidity.max_pairs,
            config.liquidity.only_held,
        ));
        info!(%factory, "Liquidity reader enabled");
    }
    if config.api.positions_url.is_some() {
        service = service.with_external(ExternalReader::new(api));
        info!("Position feed enabled");
    }

    info!("All components initialized");
    Ok(service)
}

/// Load the hidden-token list; addresses in FOLIO_HIDE are added and persisted.
fn load_visibility(config: &AppConfig) -> Result<VisibilityFilter> {
    let mut visibility = VisibilityFilter::load(&config.visibility_file)?;
    let Ok(list) = std::env::var(env::HIDE) else {
        return Ok(visibility);
    };

    let mut added = 0usize;
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.parse::<Address>() {
            Ok(token) => {
                if visibility.hide(token) {
                    added += 1;
                }
            }
            Err(e) => warn!(entry, error = %e, "Ignoring invalid address in {}", env::HIDE),
        }
    }
    if added > 0 {
        visibility.save()?;
    }
    info!(hidden = visibility.hidden().count(), "Visibility filter ready");
    Ok(visibility)
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ┌─┐┌─┐┬  ┬┌─┐
    ├┤ │ ││  ││ │
    └  └─┘┴─┘┴└─┘
    Portfolio Valuation v0.1.0
    "#
    );
}
