//! Reconciles effect bundles against the known-item table.
use rand::Rng;
use rand::seq::SliceRandom;

use super::{ItemType, Rarity, StatBundle};
use crate::constants::{ARTIFACT_JITTER, ARTIFACT_MAX_SYNTH_ATTRIBUTES};
use crate::data::KnownItemCatalog;
use crate::numbers::{roll_between, round_f64_to_i64};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizedEffect {
    pub effect: Option<StatBundle>,
    pub permanent_effect: Option<StatBundle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SynthAttribute {
    Hp,
    Attack,
    Defense,
    SpiritPower,
    Physique,
    Speed,
}

const SYNTH_POOL: [SynthAttribute; 6] = [
    SynthAttribute::Hp,
    SynthAttribute::Attack,
    SynthAttribute::Defense,
    SynthAttribute::SpiritPower,
    SynthAttribute::Physique,
    SynthAttribute::Speed,
];

/// Produce the effect bundles an item should actually carry.
///
/// Known names resolve to their canonical bundles. Unknown names keep what
/// was declared, with equipment bundles moved out of `permanent_effect` and
/// artifacts stripped of experience (and given synthesized attributes when
/// nothing else is left). Normalizing an already-normalized item is a no-op.
#[allow(clippy::too_many_arguments)]
pub fn normalize_item_effect<R>(
    name: &str,
    item_type: ItemType,
    rarity: Rarity,
    is_equippable: bool,
    declared_effect: Option<StatBundle>,
    declared_permanent: Option<StatBundle>,
    catalog: &KnownItemCatalog,
    rng: &mut R,
) -> NormalizedEffect
where
    R: Rng + ?Sized,
{
    let (mut effect, mut permanent) = match catalog.lookup(name) {
        Some(known) => (known.effect, known.permanent_effect),
        None => (declared_effect, declared_permanent),
    };
    effect = effect.filter(|bundle| !bundle.is_empty());
    permanent = permanent.filter(|bundle| !bundle.is_empty());

    if is_equippable {
        if effect.is_none() {
            effect = permanent.map(fold_max_hp);
        }
        permanent = None;
    }

    if item_type == ItemType::Artifact {
        effect = effect.map(strip_exp).filter(|bundle| !bundle.is_empty());
        permanent = permanent.map(strip_exp).filter(|bundle| !bundle.is_empty());
        let has_attributes = effect.is_some_and(|bundle| bundle.has_attributes())
            || permanent.is_some_and(|bundle| bundle.has_attributes());
        if !has_attributes {
            let synthesized = synthesize_artifact_bundle(rarity, rng);
            log::debug!("synthesized artifact bundle for {name}: {synthesized:?}");
            if is_equippable {
                effect = Some(synthesized);
            } else {
                permanent = Some(synthesized);
            }
        }
    }

    NormalizedEffect {
        effect,
        permanent_effect: permanent,
    }
}

/// Equip-time bundles express vitality as `hp`.
fn fold_max_hp(mut bundle: StatBundle) -> StatBundle {
    bundle.hp = bundle.hp.saturating_add(bundle.max_hp);
    bundle.max_hp = 0;
    bundle
}

const fn strip_exp(mut bundle: StatBundle) -> StatBundle {
    bundle.exp = 0;
    bundle
}

/// One to three attributes scaled by rarity tier.
fn synthesize_artifact_bundle<R>(rarity: Rarity, rng: &mut R) -> StatBundle
where
    R: Rng + ?Sized,
{
    let count = rng.gen_range(1..=ARTIFACT_MAX_SYNTH_ATTRIBUTES);
    let scale = rarity.synthesis_base() * rarity.multiplier();
    let mut bundle = StatBundle::default();
    for attribute in SYNTH_POOL.choose_multiple(rng, count) {
        let value = round_f64_to_i64(scale * roll_between(rng, ARTIFACT_JITTER)).max(1);
        let slot = match attribute {
            SynthAttribute::Hp => &mut bundle.hp,
            SynthAttribute::Attack => &mut bundle.attack,
            SynthAttribute::Defense => &mut bundle.defense,
            SynthAttribute::SpiritPower => &mut bundle.spirit_power,
            SynthAttribute::Physique => &mut bundle.physique,
            SynthAttribute::Speed => &mut bundle.speed,
        };
        *slot = value;
    }
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    const SAMPLE_SIZE: u64 = 500;

    fn nonzero_attributes(bundle: &StatBundle) -> Vec<i64> {
        [
            bundle.hp,
            bundle.max_hp,
            bundle.attack,
            bundle.defense,
            bundle.spirit_power,
            bundle.physique,
            bundle.speed,
        ]
        .into_iter()
        .filter(|value| *value != 0)
        .collect()
    }

    #[test]
    fn rare_artifact_without_attributes_is_synthesized_in_band() {
        let catalog = KnownItemCatalog::default();
        let low = round_f64_to_i64(30.0 * 1.2 * 0.8);
        let high = round_f64_to_i64(30.0 * 1.2 * 1.2);
        for seed in 0..SAMPLE_SIZE {
            let mut rng = SmallRng::seed_from_u64(seed);
            let normalized = normalize_item_effect(
                "Nameless Copper Gourd",
                ItemType::Artifact,
                Rarity::Rare,
                true,
                None,
                None,
                &catalog,
                &mut rng,
            );
            assert!(normalized.permanent_effect.is_none());
            let effect = normalized.effect.expect("synthesized effect");
            assert_eq!(effect.exp, 0);
            let values = nonzero_attributes(&effect);
            assert!((1..=3).contains(&values.len()), "seed {seed}: {effect:?}");
            for value in values {
                assert!((low..=high).contains(&value), "seed {seed}: {value}");
                assert!((24..=96).contains(&value));
            }
        }
    }

    #[test]
    fn artifacts_never_grant_experience() {
        let catalog = KnownItemCatalog::default();
        let mut rng = SmallRng::seed_from_u64(11);
        let normalized = normalize_item_effect(
            "Dusty Mirror",
            ItemType::Artifact,
            Rarity::Common,
            true,
            Some(StatBundle {
                exp: 500,
                defense: 4,
                ..StatBundle::default()
            }),
            None,
            &catalog,
            &mut rng,
        );
        let effect = normalized.effect.expect("effect kept");
        assert_eq!(effect.exp, 0);
        assert_eq!(effect.defense, 4);
        assert_eq!(nonzero_attributes(&effect).len(), 1);
    }

    #[test]
    fn equippable_permanent_bundle_moves_into_effect() {
        let catalog = KnownItemCatalog::default();
        let mut rng = SmallRng::seed_from_u64(5);
        let normalized = normalize_item_effect(
            "Wanderer Robe",
            ItemType::Armor,
            Rarity::Common,
            true,
            None,
            Some(StatBundle {
                max_hp: 40,
                defense: 6,
                ..StatBundle::default()
            }),
            &catalog,
            &mut rng,
        );
        assert!(normalized.permanent_effect.is_none());
        let effect = normalized.effect.expect("moved effect");
        assert_eq!(effect.hp, 40);
        assert_eq!(effect.max_hp, 0);
        assert_eq!(effect.defense, 6);
    }

    #[test]
    fn consumables_pass_through_untouched() {
        let catalog = KnownItemCatalog::default();
        let mut rng = SmallRng::seed_from_u64(5);
        let permanent = StatBundle {
            max_hp: 12,
            ..StatBundle::default()
        };
        let normalized = normalize_item_effect(
            "Mystery Tonic",
            ItemType::Consumable,
            Rarity::Common,
            false,
            None,
            Some(permanent),
            &catalog,
            &mut rng,
        );
        assert_eq!(normalized.permanent_effect, Some(permanent));
        assert!(normalized.effect.is_none());
    }

    #[test]
    fn known_items_ignore_declared_drift_and_are_fixed_points() {
        let catalog = KnownItemCatalog::default();
        let known = catalog.items.first().expect("catalog has entries").clone();
        let mut rng = SmallRng::seed_from_u64(9);
        let drifted = StatBundle {
            attack: 9_999,
            ..StatBundle::default()
        };
        let first = normalize_item_effect(
            &known.name,
            known.item_type,
            known.rarity,
            known.item_type.is_equipment(),
            Some(drifted),
            Some(drifted),
            &catalog,
            &mut rng,
        );
        assert_ne!(first.effect, Some(drifted));
        let second = normalize_item_effect(
            &known.name,
            known.item_type,
            known.rarity,
            known.item_type.is_equipment(),
            first.effect,
            first.permanent_effect,
            &catalog,
            &mut rng,
        );
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_items_reach_a_fixed_point_after_one_pass() {
        let catalog = KnownItemCatalog::default();
        let mut rng = SmallRng::seed_from_u64(21);
        let first = normalize_item_effect(
            "Starfall Bead",
            ItemType::Artifact,
            Rarity::Legendary,
            true,
            None,
            Some(StatBundle {
                exp: 30,
                ..StatBundle::default()
            }),
            &catalog,
            &mut rng,
        );
        let second = normalize_item_effect(
            "Starfall Bead",
            ItemType::Artifact,
            Rarity::Legendary,
            true,
            first.effect,
            first.permanent_effect,
            &catalog,
            &mut rng,
        );
        assert_eq!(first, second);
    }
}
