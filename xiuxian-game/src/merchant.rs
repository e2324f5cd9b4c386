//! The wandering merchant: stock generation and purchases.
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::constants::{MERCHANT_MAX_OFFERS, MERCHANT_MIN_OFFERS, MERCHANT_REALM_PRICE_STEP};
use crate::data::{GameContent, MerchantOffer};
use crate::error::MerchantError;
use crate::items::{Item, materialize_loot};
use crate::numbers::{i64_to_f64, round_f64_to_i64};
use crate::realm::Realm;
use crate::state::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOffer {
    pub offer_id: String,
    pub item: Item,
    pub price: i64,
    pub sold: bool,
}

/// What the merchant lays out for one visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MerchantStock {
    pub realm: Realm,
    pub offers: Vec<StockOffer>,
}

impl MerchantStock {
    #[must_use]
    pub fn offer(&self, offer_id: &str) -> Option<&StockOffer> {
        self.offers.iter().find(|offer| offer.offer_id == offer_id)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.offers.iter().filter(|offer| !offer.sold).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub offer_id: String,
    pub item_name: String,
    pub price: i64,
    pub spirit_stones_left: i64,
    /// The item stacked onto an existing inventory entry.
    pub stacked: bool,
}

fn price_for(offer: &MerchantOffer, item: &Item, realm: Realm) -> i64 {
    let realm_index = i64::try_from(realm.index()).unwrap_or(0);
    let realm_factor = 1.0 + i64_to_f64(realm_index) * MERCHANT_REALM_PRICE_STEP;
    round_f64_to_i64(i64_to_f64(offer.base_price) * item.rarity.multiplier() * realm_factor).max(1)
}

/// Lay out three to five offers the player's realm has unlocked.
pub fn build_merchant_stock<R>(
    content: &GameContent,
    player: &PlayerState,
    rng: &mut R,
) -> MerchantStock
where
    R: Rng + ?Sized,
{
    let eligible: Vec<&MerchantOffer> = content
        .merchant
        .offers
        .iter()
        .filter(|offer| offer.min_realm <= player.realm && offer.weight > 0)
        .collect();
    let wanted = rng
        .gen_range(MERCHANT_MIN_OFFERS..=MERCHANT_MAX_OFFERS)
        .min(eligible.len());
    let picked: Vec<&MerchantOffer> = eligible
        .choose_multiple_weighted(rng, wanted, |offer| f64::from(offer.weight))
        .map(|chosen| chosen.copied().collect())
        .unwrap_or_default();

    let offers = picked
        .into_iter()
        .map(|offer| {
            let item = materialize_loot(&offer.loot, &content.known_items, rng);
            StockOffer {
                offer_id: offer.id.clone(),
                price: price_for(offer, &item, player.realm),
                item,
                sold: false,
            }
        })
        .collect();
    MerchantStock {
        realm: player.realm,
        offers,
    }
}

/// Buy one offer, paying in spirit stones.
///
/// # Errors
///
/// Fails without touching the player when the offer is unknown, already sold
/// or unaffordable.
pub fn purchase(
    state: &mut PlayerState,
    stock: &mut MerchantStock,
    offer_id: &str,
) -> Result<PurchaseReceipt, MerchantError> {
    let offer = stock
        .offers
        .iter_mut()
        .find(|offer| offer.offer_id == offer_id)
        .ok_or_else(|| MerchantError::UnknownOffer(offer_id.to_string()))?;
    if offer.sold {
        return Err(MerchantError::SoldOut(offer_id.to_string()));
    }
    if state.spirit_stones < offer.price {
        return Err(MerchantError::InsufficientFunds {
            price: offer.price,
            available: state.spirit_stones,
        });
    }
    state.spirit_stones -= offer.price;
    offer.sold = true;
    let stacked = state.add_item(offer.item.clone());
    Ok(PurchaseReceipt {
        offer_id: offer.offer_id.clone(),
        item_name: offer.item.name.clone(),
        price: offer.price,
        spirit_stones_left: state.spirit_stones,
        stacked,
    })
}
