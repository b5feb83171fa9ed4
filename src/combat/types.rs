use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::constants::EVENT_LOG_CAPACITY;
use crate::core::error::EngineError;
use crate::reward::RewardLedger;

const MOB_PREFIX: &str = "mob:";

/// Identity of one side of a session: a player id or a mob template key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn mob(template: &str) -> Self {
        Self(format!("{}{}", MOB_PREFIX, template))
    }

    pub fn is_mob(&self) -> bool {
        self.0.starts_with(MOB_PREFIX)
    }

    /// Template name behind a mob id.
    pub fn mob_template_name(&self) -> Option<&str> {
        self.0.strip_prefix(MOB_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| EngineError::SessionNotFound(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    PvE,
    /// Raid against an offline player whose side is played by the defender AI
    PvPAsync,
    /// Live challenge with strict turn alternation and per-turn deadlines
    PvPSync,
}

impl Mode {
    pub fn is_pvp(self) -> bool {
        matches!(self, Mode::PvPAsync | Mode::PvPSync)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Attack,
    Block,
    Dodge,
    Charge,
    Surrender,
}

impl FromStr for Action {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attack" => Ok(Action::Attack),
            "block" => Ok(Action::Block),
            "dodge" => Ok(Action::Dodge),
            "charge" => Ok(Action::Charge),
            "surrender" | "flee" => Ok(Action::Surrender),
            other => Err(EngineError::invalid_action(format!("unknown action '{}'", other))),
        }
    }
}

/// Position in a session's participant pair. `A` is always the initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Snapshot of one fighter for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub name: String,
    pub hp: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub crit_chance: f64,
    pub dodge_chance: f64,
    pub charge_stacks: u8,
    pub is_blocking: bool,
    pub is_dodging: bool,
    /// Current block was raised while holding charge
    #[serde(default)]
    pub perfect_block: bool,
    /// Armed by a successful dodge; boosts crit chance on the next action only
    #[serde(default)]
    pub crit_window: bool,
}

impl Combatant {
    pub fn new(name: impl Into<String>, max_hp: u32, attack: u32, defense: u32) -> Self {
        Self {
            name: name.into(),
            hp: max_hp,
            max_hp,
            attack,
            defense,
            crit_chance: 0.0,
            dodge_chance: 0.0,
            charge_stacks: 0,
            is_blocking: false,
            is_dodging: false,
            perfect_block: false,
            crit_window: false,
        }
    }

    pub fn with_chances(mut self, crit_chance: f64, dodge_chance: f64) -> Self {
        self.crit_chance = crit_chance.clamp(0.0, 1.0);
        self.dodge_chance = dodge_chance.clamp(0.0, 1.0);
        self
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn hp_fraction(&self) -> f64 {
        if self.max_hp == 0 {
            return 0.0;
        }
        self.hp as f64 / self.max_hp as f64
    }

    /// Applies damage, returning the amount actually removed.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        dealt
    }

    pub fn clear_guard(&mut self) {
        self.is_blocking = false;
        self.is_dodging = false;
        self.perfect_block = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guard {
    Block,
    PerfectBlock,
    Dodge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Knockout,
    Surrender,
    /// Turn cap reached without a knockout; no rewards
    TurnLimit,
    /// Ended from outside the resolver (expiry or admin end)
    Expired,
}

/// Structured outcome of one resolved step, for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    Hit {
        actor: Side,
        damage: u32,
        crit: bool,
        charge_consumed: u8,
    },
    GuardRaised {
        actor: Side,
        guard: Guard,
    },
    Blocked {
        actor: Side,
        absorbed: u32,
    },
    PerfectBlock {
        actor: Side,
        reflected: u32,
    },
    Dodged {
        actor: Side,
    },
    DodgeFailed {
        actor: Side,
        extra_damage: u32,
    },
    CounterHit {
        actor: Side,
        damage: u32,
    },
    Charged {
        actor: Side,
        stacks: u8,
    },
    Surrendered {
        actor: Side,
    },
    /// Fixed strike made by the sweep on behalf of an idle participant
    TimeoutStrike {
        actor: Side,
        damage: u32,
    },
    Knockout {
        loser: Side,
    },
    TurnLimitReached {
        turns: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub turn: u32,
    pub event: CombatEvent,
}

/// Bounded event history, most recent entry first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, turn: u32, event: CombatEvent) {
        self.entries.push_front(LogEntry { turn, event });
        self.entries.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }
}

/// One fight between two participants.
///
/// IMPORTANT: When adding new fields, use `#[serde(default)]` so persisted
/// snapshots from older builds still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub mode: Mode,
    pub participants: [ParticipantId; 2],
    pub combatants: [Combatant; 2],
    /// Round counter, starts at 1
    pub turn: u32,
    pub ended: bool,
    /// `None` while running and for draws
    pub winner: Option<ParticipantId>,
    #[serde(default)]
    pub end_reason: Option<EndReason>,
    pub auto_mode: bool,
    pub event_log: EventLog,
    /// Side expected to act next (synchronous mode only)
    #[serde(default)]
    pub turn_owner: Option<Side>,
    /// Unix seconds after which the sweep acts for `turn_owner`
    #[serde(default)]
    pub turn_deadline: Option<i64>,
    /// Set once a reward is planned; tracks which provider writes landed
    #[serde(default)]
    pub reward: Option<RewardLedger>,
    /// Ended by a sweep timeout strike, so the sweep owns its reward
    #[serde(default)]
    pub ended_by_timeout: bool,
}

impl Session {
    pub fn new(
        mode: Mode,
        participants: [ParticipantId; 2],
        combatants: [Combatant; 2],
        log_capacity: usize,
    ) -> Self {
        Self {
            id: SessionId::new(),
            mode,
            participants,
            combatants,
            turn: 1,
            ended: false,
            winner: None,
            end_reason: None,
            auto_mode: false,
            event_log: EventLog::with_capacity(log_capacity),
            turn_owner: (mode == Mode::PvPSync).then_some(Side::A),
            turn_deadline: None,
            reward: None,
            ended_by_timeout: false,
        }
    }

    pub fn side_of(&self, participant: &ParticipantId) -> Option<Side> {
        if &self.participants[0] == participant {
            Some(Side::A)
        } else if &self.participants[1] == participant {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn participant(&self, side: Side) -> &ParticipantId {
        &self.participants[side.index()]
    }

    pub fn combatant(&self, side: Side) -> &Combatant {
        &self.combatants[side.index()]
    }

    pub fn combatant_mut(&mut self, side: Side) -> &mut Combatant {
        &mut self.combatants[side.index()]
    }

    /// Side B is played by the defender AI everywhere except live challenges.
    pub fn is_ai_controlled(&self, side: Side) -> bool {
        side == Side::B && self.mode != Mode::PvPSync
    }

    /// Participants that hold the one-active-session slot for this session.
    pub fn human_participants(&self) -> Vec<&ParticipantId> {
        [Side::A, Side::B]
            .into_iter()
            .filter(|side| !self.is_ai_controlled(*side))
            .map(|side| self.participant(side))
            .collect()
    }

    pub fn loser(&self) -> Option<&ParticipantId> {
        let winner = self.winner.as_ref()?;
        self.participants.iter().find(|p| *p != winner)
    }

    pub fn is_draw(&self) -> bool {
        self.ended && self.winner.is_none()
    }

    /// True when nothing is owed: no player won, or the reward was fully written.
    pub fn reward_settled(&self) -> bool {
        let owes_reward = self.winner.as_ref().is_some_and(|w| !w.is_mob());
        !owes_reward || self.reward.as_ref().is_some_and(RewardLedger::is_complete)
    }

    pub(crate) fn finish(&mut self, winner: Option<Side>, reason: EndReason) {
        self.ended = true;
        self.winner = winner.map(|side| self.participant(side).clone());
        self.end_reason = Some(reason);
        self.turn_owner = None;
        self.turn_deadline = None;
    }
}
