//! Polling service for one connected wallet.
//!
//! Two interval loops drive everything:
//! - discovery: refreshes the token registry from the discovery service
//! - on-chain: reads positions, resolves prices and publishes a
//!   [`PortfolioView`]
//!
//! Consumers hold a `watch::Receiver` and keep seeing the previous view until
//! a new one is published. Each cycle captures the wallet it started with and
//! drops its results if the connected wallet changed in the meantime.
//!
//! The registry records the wallet it belongs to. Switching wallets replaces
//! it before the new wallet is announced, and every registry write or view
//! publish checks that owner under the registry lock.

use alloy::primitives::Address;
use chrono::Utc;
use folio_api::TokenDiscovery;
use folio_chain::{ChainReader, NetworkStatus, ProviderManager};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::{AppConfig, PollingConfig};
use crate::external::{ExternalPositions, ExternalReader};
use crate::holdings::HoldingsReader;
use crate::liquidity::LiquidityReader;
use crate::position::{Holding, LiquidityPair, StakingPool};
use crate::pricing::PriceResolver;
use crate::registry::TokenRegistry;
use crate::staking::StakingReader;
use crate::token::TokenDescriptor;
use crate::valuation::{compute_snapshot, PortfolioValuation, ValuationInputs};

/// What consumers receive after every successful on-chain cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioView {
    pub valuation: PortfolioValuation,
    /// Token discovery has failed repeatedly; holdings may be incomplete
    pub data_unavailable: bool,
    pub network: Option<NetworkStatus>,
}

/// Scheduler timing.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub discovery_interval: Duration,
    pub onchain_interval: Duration,
    /// Upper bound for one reader family per cycle
    pub settle_timeout: Duration,
    /// Consecutive discovery failures before `data_unavailable` is set
    pub unavailable_after: u32,
    pub max_block_age: Duration,
}

impl SchedulerSettings {
    pub fn from_config(polling: &PollingConfig, max_block_age: Duration) -> Self {
        Self {
            discovery_interval: polling.discovery_interval(),
            onchain_interval: polling.onchain_interval(),
            settle_timeout: polling.settle_timeout(),
            unavailable_after: polling.unavailable_after_failures.max(1),
            max_block_age,
        }
    }
}

impl From<&AppConfig> for SchedulerSettings {
    fn from(config: &AppConfig) -> Self {
        Self::from_config(&config.polling, config.chain.max_block_age())
    }
}

/// Token registry together with the wallet it was built for.
#[derive(Debug)]
struct WalletRegistry {
    wallet: Option<Address>,
    tokens: Arc<TokenRegistry>,
}

/// Wallet portfolio polling service.
#[derive(Debug)]
pub struct PortfolioService {
    chain: Arc<dyn ChainReader>,
    discovery: Arc<dyn TokenDiscovery>,
    resolver: Arc<PriceResolver>,
    holdings: HoldingsReader,
    staking: Option<StakingReader>,
    liquidity: Option<LiquidityReader>,
    external: Option<ExternalReader>,
    provider: Option<Arc<ProviderManager>>,
    static_tokens: Vec<TokenDescriptor>,
    native: TokenDescriptor,
    settings: SchedulerSettings,

    registry: RwLock<WalletRegistry>,
    discovery_failures: AtomicU32,
    /// Bumped on every registry refresh
    registry_version: watch::Sender<u64>,
    wallet_tx: watch::Sender<Option<Address>>,
    view_tx: watch::Sender<Option<Arc<PortfolioView>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl PortfolioService {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        discovery: Arc<dyn TokenDiscovery>,
        resolver: Arc<PriceResolver>,
        holdings: HoldingsReader,
        static_tokens: Vec<TokenDescriptor>,
        native: TokenDescriptor,
        settings: SchedulerSettings,
    ) -> Self {
        let registry = TokenRegistry::from_static(&static_tokens, native.clone());
        Self {
            chain,
            discovery,
            resolver,
            holdings,
            staking: None,
            liquidity: None,
            external: None,
            provider: None,
            static_tokens,
            native,
            settings,
            registry: RwLock::new(WalletRegistry {
                wallet: None,
                tokens: Arc::new(registry),
            }),
            discovery_failures: AtomicU32::new(0),
            registry_version: watch::Sender::new(0),
            wallet_tx: watch::Sender::new(None),
            view_tx: watch::Sender::new(None),
            shutdown_tx: watch::Sender::new(false),
        }
    }

    pub fn with_staking(mut self, reader: StakingReader) -> Self {
        self.staking = Some(reader);
        self
    }

    pub fn with_liquidity(mut self, reader: LiquidityReader) -> Self {
        self.liquidity = Some(reader);
        self
    }

    pub fn with_external(mut self, reader: ExternalReader) -> Self {
        self.external = Some(reader);
        self
    }

    /// Attach a provider for the informational network status probe.
    pub fn with_provider(mut self, provider: Arc<ProviderManager>) -> Self {
        self.provider = Some(provider);
        self
    }

    // Session control

    /// Connect a wallet. Switching wallets clears the view and drops
    /// everything learned about the previous wallet.
    pub fn connect(&self, wallet: Address) {
        if self.wallet() == Some(wallet) {
            return;
        }
        self.reset_session(Some(wallet));
        self.wallet_tx.send_replace(Some(wallet));
        info!(%wallet, "Wallet connected");
    }

    /// Disconnect: publish no view and stop polling.
    pub fn disconnect(&self) {
        if self.wallet().is_none() {
            return;
        }
        self.reset_session(None);
        self.wallet_tx.send_replace(None);
        info!("Wallet disconnected");
    }

    /// Hand the registry to `wallet` and clear the view. Runs before the
    /// wallet is published so loops never see the new wallet with old tokens.
    fn reset_session(&self, wallet: Option<Address>) {
        {
            let mut registry = self.registry.write();
            registry.wallet = wallet;
            registry.tokens = Arc::new(TokenRegistry::from_static(
                &self.static_tokens,
                self.native.clone(),
            ));
            self.discovery_failures.store(0, Ordering::SeqCst);
        }
        // registry lock released first; a cycle publishing takes it under the view lock
        self.view_tx.send_replace(None);
    }

    pub fn wallet(&self) -> Option<Address> {
        *self.wallet_tx.borrow()
    }

    /// Latest published view; `None` until the first cycle completes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PortfolioView>>> {
        self.view_tx.subscribe()
    }

    pub fn registry(&self) -> Arc<TokenRegistry> {
        Arc::clone(&self.registry.read().tokens)
    }

    /// The registry, if it currently belongs to `wallet`.
    fn registry_for(&self, wallet: Address) -> Option<Arc<TokenRegistry>> {
        let registry = self.registry.read();
        (registry.wallet == Some(wallet)).then(|| Arc::clone(&registry.tokens))
    }

    pub fn is_data_unavailable(&self) -> bool {
        self.discovery_failures.load(Ordering::SeqCst) >= self.settings.unavailable_after
    }

    /// Spawn both polling loops.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            discovery_interval = ?self.settings.discovery_interval,
            onchain_interval = ?self.settings.onchain_interval,
            settle_timeout = ?self.settings.settle_timeout,
            "Starting portfolio service"
        );
        vec![
            tokio::spawn(Arc::clone(self).discovery_loop()),
            tokio::spawn(Arc::clone(self).onchain_loop()),
        ]
    }

    /// Stop both loops after their current cycle.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    fn is_current(&self, wallet: Address) -> bool {
        self.registry.read().wallet == Some(wallet)
    }

    // Background loops

    async fn discovery_loop(self: Arc<Self>) {
        let mut ticker = interval(self.settings.discovery_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut wallet_rx = self.wallet_tx.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = wallet_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    ticker.reset();
                }
                _ = shutdown_rx.changed() => {}
            }
            if *shutdown_rx.borrow() {
                break;
            }
            let wallet = *wallet_rx.borrow_and_update();
            if let Some(wallet) = wallet {
                self.refresh_registry(wallet).await;
            }
        }
        debug!("Discovery loop stopped");
    }

    async fn onchain_loop(self: Arc<Self>) {
        let mut ticker = interval(self.settings.onchain_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut wallet_rx = self.wallet_tx.subscribe();
        let mut registry_rx = self.registry_version.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = wallet_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    ticker.reset();
                }
                changed = registry_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {}
            }
            if *shutdown_rx.borrow() {
                break;
            }
            let wallet = *wallet_rx.borrow_and_update();
            if let Some(wallet) = wallet {
                self.run_onchain_cycle(wallet).await;
            }
        }
        debug!("On-chain loop stopped");
    }

    // Cycles

    /// Rebuild the registry from the discovery service. On failure the prior
    /// registry is kept and the failure streak grows.
    #[instrument(skip(self), fields(wallet = %wallet))]
    pub async fn refresh_registry(&self, wallet: Address) -> bool {
        let discovered = match self.discovery.discover_tokens(wallet).await {
            Ok(tokens) => tokens,
            Err(e) => {
                // counted under the registry lock so a wallet switch cannot inherit the streak
                let streak = {
                    let registry = self.registry.read();
                    (registry.wallet == Some(wallet))
                        .then(|| self.discovery_failures.fetch_add(1, Ordering::SeqCst) + 1)
                };
                match streak {
                    Some(streak) => {
                        warn!(error = %e, transient = e.is_transient(), streak, "Token discovery failed")
                    }
                    None => debug!("Wallet changed during discovery, ignoring failure"),
                }
                return false;
            }
        };

        let registry = TokenRegistry::merge(
            &self.static_tokens,
            &discovered,
            self.native.clone(),
            self.chain.as_ref(),
        )
        .await;

        let size = registry.len();
        {
            let mut current = self.registry.write();
            if current.wallet != Some(wallet) {
                debug!("Wallet changed during discovery, discarding registry");
                return false;
            }
            current.tokens = Arc::new(registry);
            self.discovery_failures.store(0, Ordering::SeqCst);
        }
        self.registry_version.send_modify(|version| *version += 1);
        info!(discovered = discovered.len(), tokens = size, "Token registry refreshed");
        true
    }

    /// Read every position family, price the token set, value and publish.
    /// Returns whether a view was published.
    #[instrument(skip(self), fields(wallet = %wallet))]
    pub async fn run_onchain_cycle(&self, wallet: Address) -> bool {
        let started = Instant::now();
        let Some(registry) = self.registry_for(wallet) else {
            debug!("Registry belongs to another wallet, skipping cycle");
            return false;
        };
        let chain = self.chain.as_ref();
        let settle = self.settings.settle_timeout;

        let (holdings, staking, liquidity, external, network) = tokio::join!(
            settled(settle, "holdings", self.holdings.read_holdings(wallet, &registry)),
            async {
                match &self.staking {
                    Some(reader) => settled(settle, "staking", reader.read_pools(wallet)).await,
                    None => Vec::new(),
                }
            },
            async {
                match &self.liquidity {
                    Some(reader) => settled(settle, "liquidity", reader.read_pairs(wallet)).await,
                    None => Vec::new(),
                }
            },
            async {
                match &self.external {
                    Some(reader) => {
                        settled(settle, "external", reader.read(wallet, &registry, chain)).await
                    }
                    None => ExternalPositions::default(),
                }
            },
            self.network_status(),
        );

        if !self.is_current(wallet) {
            debug!("Wallet changed during position reads, discarding cycle");
            return false;
        }

        let position_tokens: Vec<Address> = staking
            .iter()
            .flat_map(|p| [p.staking_token, p.rewards_token])
            .chain(liquidity.iter().flat_map(|p| [p.token0, p.token1]))
            .collect();
        let tokens = registry.describe(chain, position_tokens).await;
        let to_price = tokens_to_price(&holdings, &staking, &liquidity, &external, &tokens);

        let prices = self.resolver.resolve_all(&to_price).await;

        let inputs = ValuationInputs {
            wallet,
            holdings,
            staking,
            liquidity,
            lending: external.lending,
            collections: external.collections,
            tokens,
            prices,
            as_of: Utc::now(),
        };
        let valuation = compute_snapshot(&inputs);

        let snapshot = &valuation.snapshot;
        info!(
            total_usd = %snapshot.total_usd.round_dp(2),
            holdings_usd = %snapshot.holdings_usd.round_dp(2),
            staking_usd = %snapshot.staking_usd.round_dp(2),
            liquidity_usd = %snapshot.liquidity_usd.round_dp(2),
            lending_net_usd = %snapshot.lending_net_usd.round_dp(2),
            collections_usd = %snapshot.collections_usd.round_dp(2),
            assets = snapshot.asset_count,
            positions = snapshot.position_count,
            unpriced = snapshot.unpriced_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Portfolio cycle complete"
        );

        let view = Arc::new(PortfolioView {
            valuation,
            data_unavailable: self.is_data_unavailable(),
            network,
        });
        // Owner check under the view lock; reset_session() clears the view after switching owner
        let published = self.view_tx.send_if_modified(|slot| {
            if self.is_current(wallet) {
                *slot = Some(Arc::clone(&view));
                true
            } else {
                false
            }
        });
        if !published {
            debug!("Wallet changed during pricing, discarding cycle");
        }
        published
    }

    async fn network_status(&self) -> Option<NetworkStatus> {
        let provider = self.provider.as_ref()?;
        match provider.network_status(self.settings.max_block_age).await {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(error = %e, "Network status probe failed");
                None
            }
        }
    }
}

/// Distinct tokens that carry a non-zero amount somewhere in the portfolio.
fn tokens_to_price(
    holdings: &[Holding],
    staking: &[StakingPool],
    liquidity: &[LiquidityPair],
    external: &ExternalPositions,
    described: &HashMap<Address, TokenDescriptor>,
) -> Vec<TokenDescriptor> {
    let mut to_price: Vec<TokenDescriptor> = Vec::new();
    let mut seen = HashSet::new();
    let mut want = |token: &TokenDescriptor| {
        if seen.insert(token.address) {
            to_price.push(token.clone());
        }
    };

    holdings
        .iter()
        .filter(|h| !h.raw_balance.is_zero())
        .for_each(|h| want(&h.token));
    for pool in staking
        .iter()
        .filter(|p| !p.user_staked.is_zero() || !p.user_pending_rewards.is_zero())
    {
        for address in [pool.staking_token, pool.rewards_token] {
            if let Some(token) = described.get(&address) {
                want(token);
            }
        }
    }
    for pair in liquidity.iter().filter(|p| !p.user_lp_balance.is_zero()) {
        for address in [pair.token0, pair.token1] {
            if let Some(token) = described.get(&address) {
                want(token);
            }
        }
    }
    for position in &external.lending {
        position
            .collateral
            .iter()
            .chain(position.debt.iter())
            .for_each(|(token, _)| want(token));
    }
    external
        .collections
        .iter()
        .for_each(|item| want(&item.floor_token));
    to_price
}

/// Await a reader family; a timeout counts as a failed read.
async fn settled<T: Default>(limit: Duration, family: &'static str, fut: impl Future<Output = T>) -> T {
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => value,
        Err(_) => {
            warn!(family, timeout = ?limit, "Reader did not settle in time");
            T::default()
        }
    }
}
