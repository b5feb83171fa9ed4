//! Builds combatants from player progression records and static mob templates.

use crate::core::constants::*;
use crate::progression::ProgressionRecord;

use super::types::Combatant;

/// Static PvE opponent definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobTemplate {
    pub name: &'static str,
    pub min_level: u32,
    pub base_hp: u32,
    pub hp_per_level: u32,
    pub base_attack: u32,
    pub attack_per_level: u32,
    pub defense: u32,
    pub crit_chance: f64,
    pub dodge_chance: f64,
    /// Base XP for defeating this mob, before stage and bonus multipliers
    pub xp_reward: u64,
}

impl MobTemplate {
    fn from_row(row: (&'static str, u32, u32, u32, u32, u32, u32, f64, f64, u64)) -> Self {
        let (
            name,
            min_level,
            base_hp,
            hp_per_level,
            base_attack,
            attack_per_level,
            defense,
            crit_chance,
            dodge_chance,
            xp_reward,
        ) = row;
        Self {
            name,
            min_level,
            base_hp,
            hp_per_level,
            base_attack,
            attack_per_level,
            defense,
            crit_chance,
            dodge_chance,
            xp_reward,
        }
    }

    /// Combatant scaled to the level of the player it is matched against.
    pub fn combatant(&self, level: u32) -> Combatant {
        let over = level.saturating_sub(self.min_level);
        Combatant::new(
            self.name,
            self.base_hp + over * self.hp_per_level,
            self.base_attack + over * self.attack_per_level,
            self.defense,
        )
        .with_chances(self.crit_chance, self.dodge_chance)
    }
}

pub fn all_mob_templates() -> Vec<MobTemplate> {
    MOB_TEMPLATES.iter().copied().map(MobTemplate::from_row).collect()
}

/// Looks up a template by name, case-insensitively.
pub fn mob_template(name: &str) -> Option<MobTemplate> {
    all_mob_templates()
        .into_iter()
        .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}

/// The toughest template a player of `level` qualifies for.
pub fn mob_for_level(level: u32) -> MobTemplate {
    let templates = all_mob_templates();
    let first = templates[0];
    templates
        .into_iter()
        .filter(|t| t.min_level <= level)
        .max_by_key(|t| t.min_level)
        .unwrap_or(first)
}

/// Fresh combatant snapshot for a player at the record's level.
pub fn player_combatant(name: &str, record: &ProgressionRecord) -> Combatant {
    let over = record.level.saturating_sub(1);
    Combatant::new(
        name,
        PLAYER_BASE_HP + over * PLAYER_HP_PER_LEVEL,
        PLAYER_BASE_ATTACK + over * PLAYER_ATTACK_PER_LEVEL,
        PLAYER_BASE_DEFENSE + over / PLAYER_LEVELS_PER_DEFENSE,
    )
    .with_chances(PLAYER_BASE_CRIT_CHANCE, PLAYER_BASE_DODGE_CHANCE)
}
