//! Token registry: static allow-list merged with discovered tokens.
//!
//! The registry is rebuilt wholesale on every discovery poll and shared as an
//! immutable `Arc<TokenRegistry>`; readers never mutate it.

use alloy::primitives::{Address, U256};
use folio_api::DiscoveredToken;
use folio_chain::{CallBatch, ChainReader, IERC20};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::token::{short_address, TokenDescriptor, NATIVE_ADDRESS};

/// Decimals assumed when a token does not report them.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Metadata read from a token contract. Each field is absent when its call failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub name: Option<String>,
}

impl TokenMetadata {
    fn into_descriptor(self, address: Address) -> TokenDescriptor {
        let symbol = self.symbol.unwrap_or_else(|| short_address(address));
        let display_name = self.name.unwrap_or_else(|| symbol.clone());
        TokenDescriptor::new(
            address,
            symbol,
            self.decimals.unwrap_or(DEFAULT_DECIMALS),
            display_name,
        )
    }
}

/// Read `symbol()`, `decimals()` and `name()` for every address in one batch.
pub async fn introspect(
    chain: &dyn ChainReader,
    addresses: &[Address],
) -> HashMap<Address, TokenMetadata> {
    let targets: Vec<Address> = addresses
        .iter()
        .copied()
        .filter(|a| *a != NATIVE_ADDRESS)
        .collect();
    if targets.is_empty() {
        return HashMap::new();
    }

    let mut batch = CallBatch::with_capacity(targets.len() * 3);
    let slots: Vec<_> = targets
        .iter()
        .map(|&token| {
            (
                token,
                batch.push(token, IERC20::symbolCall {}),
                batch.push(token, IERC20::decimalsCall {}),
                batch.push(token, IERC20::nameCall {}),
            )
        })
        .collect();

    let results = batch.execute(chain).await;
    debug!(
        tokens = targets.len(),
        ok = results.success_count(),
        "Introspected token metadata"
    );

    slots
        .into_iter()
        .map(|(token, symbol, decimals, name)| {
            let meta = TokenMetadata {
                symbol: results.get(symbol).ok().map(|r| r._0).and_then(non_empty),
                decimals: results.get(decimals).ok().map(|r| r._0),
                name: results.get(name).ok().map(|r| r._0).and_then(non_empty),
            };
            (token, meta)
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub descriptor: TokenDescriptor,
    /// Balance last reported by the discovery service
    pub reported_balance: Option<U256>,
}

/// Address-keyed token registry. The native asset is always present.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    entries: BTreeMap<Address, RegistryEntry>,
    native: TokenDescriptor,
}

impl TokenRegistry {
    /// Registry containing only the static allow-list and the native asset.
    pub fn from_static(static_list: &[TokenDescriptor], native: TokenDescriptor) -> Self {
        Self::merge_with(static_list, &[], native, &HashMap::new())
    }

    /// Merge the static allow-list with discovered tokens, introspecting
    /// discovered tokens that lack a symbol or decimals.
    pub async fn merge(
        static_list: &[TokenDescriptor],
        discovered: &[DiscoveredToken],
        native: TokenDescriptor,
        chain: &dyn ChainReader,
    ) -> Self {
        let static_addrs: Vec<Address> = static_list.iter().map(|t| t.address).collect();
        let mut incomplete: Vec<Address> = discovered
            .iter()
            .filter(|d| d.address != native.address && !static_addrs.contains(&d.address))
            .filter(|d| d.symbol.is_none() || d.decimals.is_none())
            .map(|d| d.address)
            .collect();
        incomplete.sort();
        incomplete.dedup();

        let metadata = introspect(chain, &incomplete).await;
        Self::merge_with(static_list, discovered, native, &metadata)
    }

    /// Pure merge given already-introspected metadata.
    ///
    /// - static entries keep symbol, display name and logo
    /// - decimals and balance come from the discovered entry when present
    /// - discovered-only entries fall back to introspected metadata, then to
    ///   a shortened address and 18 decimals
    pub fn merge_with(
        static_list: &[TokenDescriptor],
        discovered: &[DiscoveredToken],
        native: TokenDescriptor,
        metadata: &HashMap<Address, TokenMetadata>,
    ) -> Self {
        let mut entries: BTreeMap<Address, RegistryEntry> = BTreeMap::new();

        for token in static_list {
            entries.entry(token.address).or_insert_with(|| RegistryEntry {
                descriptor: token.clone(),
                reported_balance: None,
            });
        }
        let native = entries
            .entry(native.address)
            .or_insert_with(|| RegistryEntry {
                descriptor: native,
                reported_balance: None,
            })
            .descriptor
            .clone();

        let static_count = entries.len();
        let mut seen: Vec<Address> = Vec::with_capacity(discovered.len());

        for found in discovered {
            if seen.contains(&found.address) {
                debug!(token = %found.address, "Duplicate discovered token ignored");
                continue;
            }
            seen.push(found.address);

            match entries.get_mut(&found.address) {
                Some(entry) => {
                    let curated = &mut entry.descriptor;
                    if let Some(decimals) = found.decimals {
                        curated.decimals = decimals;
                    }
                    if curated.logo_uri.is_none() {
                        curated.logo_uri = found.logo_uri.clone();
                    }
                    entry.reported_balance = Some(found.raw_balance);
                }
                None => {
                    let meta = metadata.get(&found.address).cloned().unwrap_or_default();
                    let merged = TokenMetadata {
                        symbol: found.symbol.clone().or(meta.symbol),
                        decimals: found.decimals.or(meta.decimals),
                        name: found.name.clone().or(meta.name),
                    };
                    let descriptor = merged
                        .into_descriptor(found.address)
                        .with_logo(found.logo_uri.clone());
                    entries.insert(
                        found.address,
                        RegistryEntry {
                            descriptor,
                            reported_balance: Some(found.raw_balance),
                        },
                    );
                }
            }
        }

        debug!(
            static_tokens = static_count,
            discovered = seen.len(),
            total = entries.len(),
            "Token registry merged"
        );

        Self { entries, native }
    }

    pub fn get(&self, address: &Address) -> Option<&TokenDescriptor> {
        self.entries.get(address).map(|e| &e.descriptor)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.entries.contains_key(address)
    }

    /// Balance last reported by the discovery service.
    pub fn reported_balance(&self, address: &Address) -> Option<U256> {
        self.entries.get(address).and_then(|e| e.reported_balance)
    }

    /// All descriptors, ordered by address.
    pub fn tokens(&self) -> impl Iterator<Item = &TokenDescriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    pub fn native(&self) -> &TokenDescriptor {
        &self.native
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors for arbitrary addresses (pool/pair tokens). Registry hits
    /// are returned as-is; misses are introspected in one batch. The registry
    /// itself is not modified.
    pub async fn describe(
        &self,
        chain: &dyn ChainReader,
        addresses: impl IntoIterator<Item = Address>,
    ) -> HashMap<Address, TokenDescriptor> {
        let mut described = HashMap::new();
        let mut missing = Vec::new();

        for address in addresses {
            if described.contains_key(&address) || missing.contains(&address) {
                continue;
            }
            match self.get(&address) {
                Some(descriptor) => {
                    described.insert(address, descriptor.clone());
                }
                None => missing.push(address),
            }
        }

        if !missing.is_empty() {
            let metadata = introspect(chain, &missing).await;
            for address in missing {
                let meta = metadata.get(&address).cloned().unwrap_or_default();
                described.insert(address, meta.into_descriptor(address));
            }
        }

        described
    }

    /// Descriptor for a token quotes are denominated in. Registry hits are
    /// returned as-is; otherwise `decimals()` must be readable on chain, no
    /// default is assumed.
    pub async fn anchor(&self, chain: &dyn ChainReader, address: Address) -> Option<TokenDescriptor> {
        if let Some(descriptor) = self.get(&address) {
            return Some(descriptor.clone());
        }
        let meta = introspect(chain, &[address]).await.remove(&address)?;
        meta.decimals?;
        Some(meta.into_descriptor(address))
    }
}
