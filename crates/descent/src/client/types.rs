//! Response shapes of the game service endpoints.
//!
//! The service speaks camelCase in response bodies, with a handful of
//! snake_case exceptions (trade and profile endpoints); request bodies are
//! snake_case throughout.

use std::collections::BTreeMap;

use serde::Deserialize;

/// One resolved combat round.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatRound {
    pub success: bool,
    /// Narrative of what happened this round; on failure, the reason.
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub player_hp: i64,
    #[serde(default)]
    pub player_max_hp: i64,
    #[serde(default)]
    pub enemy_hp: i64,
    #[serde(default)]
    pub enemy_max_hp: i64,
    /// Dropped loot, present when the encounter ended in a kill.
    #[serde(default)]
    pub loot: Vec<LootItem>,
    #[serde(default)]
    pub combat_end: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LootItem {
    pub id: String,
    pub name: String,
    pub qty: u32,
}

/// A freshly generated dungeon floor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonFloor {
    pub success: bool,
    #[serde(default)]
    pub floor: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub map_image_url: Option<String>,
    /// A wandering trader spawned on this floor.
    #[serde(default)]
    pub spawn_barterer: bool,
}

/// Trader encounter check.
#[derive(Debug, Clone, Deserialize)]
pub struct TraderEncounter {
    pub spawn: bool,
    #[serde(default)]
    pub items: Vec<TraderItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraderItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
}

/// Result of buying from the wandering trader.
#[derive(Debug, Clone, Deserialize)]
pub struct TraderPurchase {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub item: Option<TraderItem>,
}

/// One page of a player's inventory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPage {
    #[serde(default)]
    pub items: Vec<InventoryItem>,
    #[serde(default)]
    pub total_items: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub is_equipped: bool,
}

/// Result of a gacha roll.
#[derive(Debug, Clone, Deserialize)]
pub struct GachaRoll {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reward: Option<GachaReward>,
    #[serde(default)]
    pub balance: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GachaReward {
    pub name: String,
    pub rarity: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One narrative beat, optionally with branch choices.
#[derive(Debug, Clone, Deserialize)]
pub struct StoryBeat {
    pub success: bool,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub options: Vec<StoryOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoryOption {
    pub id: String,
    pub label: String,
}

/// Result of proposing a trade.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeInitiated {
    pub success: bool,
    #[serde(default)]
    pub trade_id: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of accepting or cancelling a trade.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeResolution {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Gold balance and rank progress.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(default)]
    pub gold: i64,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub next_rank_xp: Option<i64>,
}

/// Character sheet: stats, rank progress and equipment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub success: bool,
    /// Stat name → value; ordered for stable rendering.
    #[serde(default)]
    pub stats: BTreeMap<String, i64>,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub next_rank_xp: i64,
    #[serde(default)]
    pub equipment: Vec<EquipmentItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentItem {
    pub id: String,
    pub name: String,
    pub slot: String,
    #[serde(default)]
    pub is_equipped: bool,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// An item in the shop catalogue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Result of a shop purchase.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopPurchase {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub item: Option<ShopPurchaseItem>,
    #[serde(default)]
    pub balance: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopPurchaseItem {
    pub id: String,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// A freshly created game profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileCreated {
    pub session_id: String,
    #[serde(default)]
    pub dungeon_level: u32,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub gold: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combat_round_maps_camel_case() {
        let json = r#"{
            "success": true,
            "message": "You strike the ghoul.",
            "playerHp": 18, "playerMaxHp": 20,
            "enemyHp": 0, "enemyMaxHp": 15,
            "loot": [{"id": "bone", "name": "Ghoul Bone", "qty": 2}],
            "combatEnd": true
        }"#;

        let round: CombatRound = serde_json::from_str(json).unwrap();
        assert!(round.combat_end);
        assert_eq!(round.player_hp, 18);
        assert_eq!(round.loot.len(), 1);
        assert_eq!(round.loot[0].qty, 2);
    }

    #[test]
    fn dungeon_floor_optional_fields_default() {
        let json = r#"{"success": true, "floor": 7, "description": "A damp corridor", "spawnBarterer": true}"#;
        let floor: DungeonFloor = serde_json::from_str(json).unwrap();
        assert_eq!(floor.floor, 7);
        assert!(floor.spawn_barterer);
        assert!(floor.map_image_url.is_none());
    }

    #[test]
    fn trade_endpoints_stay_snake_case() {
        let json = r#"{"success": true, "trade_id": 42}"#;
        let initiated: TradeInitiated = serde_json::from_str(json).unwrap();
        assert_eq!(initiated.trade_id, Some(42));

        let json = r#"{"session_id": "abc", "dungeon_level": 1, "xp": 0, "gold": 100}"#;
        let profile: ProfileCreated = serde_json::from_str(json).unwrap();
        assert_eq!(profile.session_id, "abc");
        assert_eq!(profile.gold, 100);
    }

    #[test]
    fn player_profile_stats_keep_order() {
        let json = r#"{
            "success": true,
            "stats": {"vitality": 9, "agility": 12, "strength": 14},
            "rank": "B", "xp": 120, "nextRankXp": 500,
            "equipment": [{"id": "sw1", "name": "Rust Sword", "slot": "Weapon", "isEquipped": true}]
        }"#;

        let profile: PlayerProfile = serde_json::from_str(json).unwrap();
        let keys: Vec<_> = profile.stats.keys().cloned().collect();
        assert_eq!(keys, vec!["agility", "strength", "vitality"]);
        assert!(profile.equipment[0].is_equipped);
    }
}
