// XP and leveling
pub const BASE_XP_TO_NEXT: u64 = 200;
pub const DEFAULT_CURVE_FACTOR: f64 = 1.15;
pub const STARTING_LEVEL: u32 = 1;

// Evolution stages: (min_level, name, xp_multiplier), ascending by min_level
pub const EVOLUTION_STAGES: [(u32, &str, f64); 6] = [
    (1, "Hatchling", 1.0),
    (10, "Fledgling", 1.1),
    (25, "Adept", 1.25),
    (45, "Veteran", 1.4),
    (70, "Champion", 1.6),
    (100, "Mythic", 1.85),
];

// Player combatant stats, scaled per level above 1
pub const PLAYER_BASE_HP: u32 = 100;
pub const PLAYER_HP_PER_LEVEL: u32 = 12;
pub const PLAYER_BASE_ATTACK: u32 = 10;
pub const PLAYER_ATTACK_PER_LEVEL: u32 = 2;
pub const PLAYER_BASE_DEFENSE: u32 = 2;
pub const PLAYER_LEVELS_PER_DEFENSE: u32 = 2;
pub const PLAYER_BASE_CRIT_CHANCE: f64 = 0.10;
pub const PLAYER_BASE_DODGE_CHANCE: f64 = 0.25;

// Combat
pub const MAX_CHARGE_STACKS: u8 = 3;
pub const CHARGE_BONUS_PER_STACK: f64 = 0.5;
pub const CRIT_MULTIPLIER: f64 = 1.8;
pub const CRIT_WINDOW_BONUS: f64 = 0.25;
pub const BLOCK_DAMAGE_FACTOR: f64 = 0.35;
pub const PERFECT_BLOCK_REFLECT: f64 = 0.15;
pub const FAILED_DODGE_PENALTY: f64 = 0.20;
pub const DODGE_COUNTER_DAMAGE: u32 = 5;
pub const TIMEOUT_ATTACK_FACTOR: f64 = 0.5;
pub const MAX_TURNS: u32 = 50;
pub const EVENT_LOG_CAPACITY: usize = 50;
pub const MIN_EVENT_LOG_CAPACITY: usize = 40;
pub const MAX_EVENT_LOG_CAPACITY: usize = 60;

// Rating
pub const STARTING_ELO: i64 = 1000;
pub const ELO_K_FACTOR: f64 = 32.0;
pub const ELO_SCALE: f64 = 400.0;
pub const STEAL_PERCENT: f64 = 0.07;
pub const STEAL_FLOOR: u64 = 20;
pub const LOSS_TRANSFER_PERCENT: f64 = 0.05;
pub const SHIELD_DURATION_SECONDS: i64 = 3 * 60 * 60;

// Rating tiers: (min_elo, name), ascending by min_elo
pub const RATING_TIERS: [(i64, &str); 6] = [
    (i64::MIN, "Bronze"),
    (900, "Silver"),
    (1100, "Gold"),
    (1300, "Platinum"),
    (1500, "Diamond"),
    (1700, "Master"),
];

// Synchronous challenge mode
pub const SYNC_TURN_WINDOW_SECONDS: i64 = 25;
pub const SWEEP_INTERVAL_SECONDS: u64 = 5;

// Auto-play weights: (attack, block, dodge, charge)
pub const AUTOPLAY_PRESS_WEIGHTS: [u32; 4] = [80, 5, 5, 10];
pub const AUTOPLAY_DEFENSIVE_WEIGHTS: [u32; 4] = [35, 30, 25, 10];
pub const AUTOPLAY_NEUTRAL_WEIGHTS: [u32; 4] = [60, 12, 13, 15];
pub const AUTOPLAY_HIGH_HP_FRACTION: f64 = 0.6;
pub const AUTOPLAY_LOW_HP_FRACTION: f64 = 0.3;
pub const AUTOPLAY_FINISHER_FRACTION: f64 = 0.35;

// Mob templates: (name, min_level, base_hp, hp_per_level, base_atk, atk_per_level, defense, crit, dodge, xp_reward)
pub const MOB_TEMPLATES: [(&str, u32, u32, u32, u32, u32, u32, f64, f64, u64); 6] = [
    ("Mire Slime", 1, 60, 8, 7, 1, 0, 0.05, 0.10, 40),
    ("Thornback Boar", 5, 110, 10, 12, 2, 3, 0.08, 0.15, 75),
    ("Ashen Wraith", 15, 160, 12, 18, 2, 5, 0.12, 0.30, 140),
    ("Basalt Golem", 30, 320, 14, 24, 3, 12, 0.05, 0.05, 260),
    ("Storm Drake", 50, 420, 16, 34, 3, 14, 0.15, 0.20, 420),
    ("Hollow King", 80, 650, 18, 48, 4, 20, 0.20, 0.20, 700),
];

// Session snapshot file
pub const SNAPSHOT_MAGIC: u64 = 0x534B_524D_5348_0001;
pub const SNAPSHOT_FILE_NAME: &str = "sessions.dat";
