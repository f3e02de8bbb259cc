//! HTTP client for the game service.
//!
//! All game logic lives in an external service; this client is the only
//! path to it. Requests go through one helper that applies the configured
//! timeout and up to N transparent retries (network failures and 5xx) with
//! a fixed delay before surfacing an error. Callers never retry.

mod error;
mod types;

pub use error::{ClientError, Result};
pub use types::{
    Balance, CombatRound, DungeonFloor, EquipmentItem, GachaReward, GachaRoll, InventoryItem,
    InventoryPage, LootItem, PlayerProfile, ProfileCreated, ShopItem, ShopPurchase,
    ShopPurchaseItem, StoryBeat, StoryOption, TradeInitiated, TradeResolution, TraderEncounter,
    TraderItem, TraderPurchase,
};

use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::ServiceConfig;

/// Offered or requested side of a trade.
#[derive(Debug, Clone)]
pub struct TradeTerms {
    pub item_id: String,
    pub quantity: u32,
}

/// Client for the game service.
#[derive(Debug, Clone)]
pub struct GameClient {
    base_url: String,
    http: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl GameClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    // ------------------------------------------------------------------------
    // Endpoints
    // ------------------------------------------------------------------------

    /// Resolve the next combat round (or start a new encounter).
    pub async fn resolve_combat(&self, user_id: &str) -> Result<CombatRound> {
        self.post("/combat/resolve", json!({ "user_id": user_id }))
            .await
    }

    /// Generate the next dungeon floor.
    pub async fn generate_floor(&self, user_id: &str) -> Result<DungeonFloor> {
        self.post("/dungeon/generate", json!({ "user_id": user_id }))
            .await
    }

    /// Check for a wandering trader on the current floor.
    pub async fn trader_encounter(&self, user_id: &str) -> Result<TraderEncounter> {
        self.get("/barterer/encounter", &[("user_id", user_id.to_string())])
            .await
    }

    /// Buy an item from the wandering trader.
    pub async fn trader_buy(&self, user_id: &str, item_id: &str) -> Result<TraderPurchase> {
        self.post(
            "/barterer/buy",
            json!({ "user_id": user_id, "item_id": item_id }),
        )
        .await
    }

    /// Fetch one inventory page.
    pub async fn inventory_page(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<InventoryPage> {
        self.get(
            "/item/getInventory",
            &[
                ("user_id", user_id.to_string()),
                ("page", page.to_string()),
                ("pageSize", page_size.to_string()),
            ],
        )
        .await
    }

    /// Spend gold on a gacha roll.
    pub async fn roll_power(&self, user_id: &str, cost: i64) -> Result<GachaRoll> {
        self.post(
            "/gacha/rollPower",
            json!({ "user_id": user_id, "cost": cost }),
        )
        .await
    }

    /// Advance the campaign narrative, optionally following a choice.
    pub async fn progress_story(&self, user_id: &str, choice: Option<&str>) -> Result<StoryBeat> {
        let mut body = json!({ "user_id": user_id });
        if let Some(choice) = choice {
            body["choice"] = Value::String(choice.to_string());
        }
        self.post("/story/progressNarrative", body).await
    }

    /// Propose a trade to another player.
    pub async fn initiate_trade(
        &self,
        from_user: &str,
        to_user: &str,
        offer: &TradeTerms,
        request: &TradeTerms,
    ) -> Result<TradeInitiated> {
        self.post(
            "/trade/initiate",
            json!({
                "from_user": from_user,
                "to_user": to_user,
                "item_offer": { "item_id": offer.item_id, "quantity": offer.quantity },
                "item_request": { "item_id": request.item_id, "quantity": request.quantity },
            }),
        )
        .await
    }

    /// Accept or cancel a pending trade.
    pub async fn resolve_trade(
        &self,
        user_id: &str,
        trade_id: i64,
        accept: bool,
    ) -> Result<TradeResolution> {
        let path = if accept { "/trade/accept" } else { "/trade/cancel" };
        self.post(path, json!({ "user_id": user_id, "trade_id": trade_id }))
            .await
    }

    /// Fetch gold balance and rank progress.
    pub async fn balance(&self, user_id: &str) -> Result<Balance> {
        self.get("/economy/balance", &[("user_id", user_id.to_string())])
            .await
    }

    /// Fetch the character sheet.
    pub async fn player_stats(&self, user_id: &str) -> Result<PlayerProfile> {
        self.get("/player/stats", &[("user_id", user_id.to_string())])
            .await
    }

    /// List the shop catalogue.
    pub async fn shop_items(&self) -> Result<Vec<ShopItem>> {
        self.get("/economy/shop/items", &[]).await
    }

    /// Buy an item from the shop.
    pub async fn shop_buy(&self, user_id: &str, item_id: &str) -> Result<ShopPurchase> {
        self.post(
            "/economy/shop/buy",
            json!({ "user_id": user_id, "item_id": item_id }),
        )
        .await
    }

    /// Create a new game profile.
    pub async fn create_profile(
        &self,
        user_id: &str,
        correlation_id: &str,
    ) -> Result<ProfileCreated> {
        self.post(
            "/sessions/create",
            json!({ "user_id": user_id, "correlation_id": correlation_id }),
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------------

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.request(Method::GET, path, query, None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let mut request = self.http.request(method.clone(), &url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(ref body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt < self.max_retries {
                        attempt += 1;
                        debug!(
                            path = %path,
                            status = status.as_u16(),
                            attempt,
                            "retrying game service request"
                        );
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }
                    if !status.is_success() {
                        return Err(self.api_error(response).await);
                    }
                    return response.json::<T>().await.map_err(ClientError::from_reqwest);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        warn!(
                            path = %path,
                            error = %e,
                            attempt,
                            "game service request failed, retrying"
                        );
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }
                    return Err(ClientError::from_reqwest(e));
                }
            }
        }
    }

    async fn api_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => format!("HTTP {status}"),
        };
        ClientError::Api { status, message }
    }
}

/// Standard error body of the game service.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_config(base_url: &str) -> ServiceConfig {
        ServiceConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn new_trims_trailing_slash() {
        let client = GameClient::new(&service_config("http://localhost:3001/")).unwrap();
        assert_eq!(client.base_url, "http://localhost:3001");
    }

    #[test]
    fn new_preserves_url_without_slash() {
        let client = GameClient::new(&service_config("http://localhost:3001")).unwrap();
        assert_eq!(client.base_url, "http://localhost:3001");
    }
}
