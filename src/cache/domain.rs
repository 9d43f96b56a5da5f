//! Domain Wrappers
//!
//! Typed shortcuts for the hot lookups of the marketplace: user profiles,
//! wallet balances, products and search results.

use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::cache::CacheStore;
use crate::error::Result;
use crate::keys::{self, SEARCH_PREFIX};

/// TTL for cached user profiles, in seconds.
pub const USER_PROFILE_TTL: u64 = 600;
/// Balances change often; keep them short-lived.
pub const WALLET_BALANCE_TTL: u64 = 30;
pub const PRODUCT_TTL: u64 = 1800;
pub const SEARCH_RESULTS_TTL: u64 = 300;

impl CacheStore {
    pub async fn cache_user_profile<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        profile: &T,
    ) -> Result<()> {
        self.set_as(&keys::user_key(user_id), profile, Some(USER_PROFILE_TTL))
            .await
    }

    pub async fn get_user_profile<T: DeserializeOwned>(&self, user_id: &str) -> Result<Option<T>> {
        self.get_as(&keys::user_key(user_id)).await
    }

    pub async fn cache_wallet_balance<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        balance: &T,
    ) -> Result<()> {
        self.set_as(&keys::wallet_key(user_id), balance, Some(WALLET_BALANCE_TTL))
            .await
    }

    pub async fn get_wallet_balance<T: DeserializeOwned>(
        &self,
        user_id: &str,
    ) -> Result<Option<T>> {
        self.get_as(&keys::wallet_key(user_id)).await
    }

    pub async fn cache_product<T: Serialize + ?Sized>(
        &self,
        product_id: &str,
        product: &T,
    ) -> Result<()> {
        self.set_as(&keys::product_key(product_id), product, Some(PRODUCT_TTL))
            .await
    }

    pub async fn get_product<T: DeserializeOwned>(&self, product_id: &str) -> Result<Option<T>> {
        self.get_as(&keys::product_key(product_id)).await
    }

    pub async fn cache_search_results<T: Serialize + ?Sized>(
        &self,
        query: &str,
        results: &T,
    ) -> Result<()> {
        self.set_as(&keys::search_key(query), results, Some(SEARCH_RESULTS_TTL))
            .await
    }

    pub async fn get_search_results<T: DeserializeOwned>(&self, query: &str) -> Result<Option<T>> {
        self.get_as(&keys::search_key(query)).await
    }

    // == Invalidate Product ==
    /// Drops the product and every cached search result.
    ///
    /// Any search may have listed the product, so all of them go. Returns
    /// the number of search entries removed from memory.
    pub async fn invalidate_product(&self, product_id: &str) -> usize {
        self.delete(&keys::product_key(product_id)).await;
        let removed = self.delete_pattern(&format!("{SEARCH_PREFIX}*")).await;
        info!(product_id, removed, "invalidated product and search results");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteTier;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: String,
        price: u64,
    }

    fn store() -> CacheStore {
        CacheStore::new(100, 300, Arc::new(SqliteTier::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_product_roundtrip_uses_prefix_and_ttl() {
        let store = store();
        let product = Product {
            id: "p1".to_string(),
            price: 12_000,
        };

        store.cache_product("p1", &product).await.unwrap();

        assert_eq!(store.get_product::<Product>("p1").await.unwrap(), Some(product));
        let entry = store.peek_entry("product:p1").await.unwrap();
        assert_eq!(entry.expires_at - entry.created_at, PRODUCT_TTL * 1000);
    }

    #[tokio::test]
    async fn test_wallet_balance_ttl() {
        let store = store();
        store.cache_wallet_balance("u1", &5_000u64).await.unwrap();

        let entry = store.peek_entry("wallet:u1").await.unwrap();
        assert_eq!(entry.expires_at - entry.created_at, WALLET_BALANCE_TTL * 1000);
        assert_eq!(store.get_wallet_balance::<u64>("u1").await.unwrap(), Some(5_000));
    }

    #[tokio::test]
    async fn test_user_profile() {
        let store = store();
        store
            .cache_user_profile("u9", &serde_json::json!({"name": "Mariama"}))
            .await
            .unwrap();

        let profile: Option<serde_json::Value> = store.get_user_profile("u9").await.unwrap();
        assert_eq!(profile.unwrap()["name"], "Mariama");
    }

    #[tokio::test]
    async fn test_search_results_share_normalized_key() {
        let store = store();
        store
            .cache_search_results("Phone ", &vec!["p1", "p2"])
            .await
            .unwrap();

        let results: Option<Vec<String>> = store.get_search_results("phone").await.unwrap();
        assert_eq!(results.unwrap(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn test_invalidate_product_clears_all_searches() {
        let store = store();
        let product = Product {
            id: "p1".to_string(),
            price: 1,
        };
        store.cache_product("p1", &product).await.unwrap();
        store.cache_product("p2", &product).await.unwrap();
        store.cache_search_results("phone", &vec!["p1"]).await.unwrap();
        store.cache_search_results("shoes", &vec!["p7"]).await.unwrap();

        let removed = store.invalidate_product("p1").await;

        assert_eq!(removed, 2);
        assert!(store.get_product::<Product>("p1").await.unwrap().is_none());
        assert!(store.get_product::<Product>("p2").await.unwrap().is_some());
        assert!(store
            .get_search_results::<Vec<String>>("shoes")
            .await
            .unwrap()
            .is_none());
    }
}
