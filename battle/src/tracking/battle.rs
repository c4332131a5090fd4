//! BattleState - root aggregate for one battle

use duelist_protocol::{GameType, Player, Pokemon};

use crate::types::{BattleActionSet, BattlePokemon, BattleSide, FieldState, LogEntry};

/// Lifecycle of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Phase {
    #[default]
    Setup,
    Preview,
    Battle,
    Ended,
}

/// Progress through a `|split|` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SplitState {
    #[default]
    Inactive,
    /// Next line is the exact view and is applied
    AwaitingExact,
    /// Next line is the redundant public view and is skipped
    SkipPublic,
}

/// Normalized state of one battle, built from the protocol stream
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleState {
    pub phase: Phase,

    /// Current turn number (0 = not started); only `|turn|` changes it
    pub turn: u32,

    pub game_type: GameType,

    /// Indexed by [`Player::index`]
    pub sides: [BattleSide; 2],

    pub field: FieldState,

    pub winner: Option<Player>,
    pub tie: bool,

    /// Entries for the current turn, cleared on every `|turn|`
    pub log: Vec<LogEntry>,
    pub full_log: Vec<LogEntry>,

    /// Side A (p1) owes the simulator a choice
    pub waiting_for_choice: bool,

    /// Side A's legal actions, one entry per active slot
    pub available_actions: Vec<Option<BattleActionSet>>,

    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) split: SplitState,
}

impl BattleState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Setup,
            turn: 0,
            game_type: GameType::Singles,
            sides: [BattleSide::new(Player::P1), BattleSide::new(Player::P2)],
            field: FieldState::new(),
            winner: None,
            tie: false,
            log: Vec::new(),
            full_log: Vec::new(),
            waiting_for_choice: false,
            available_actions: Vec::new(),
            split: SplitState::Inactive,
        }
    }

    pub fn side(&self, player: Player) -> &BattleSide {
        &self.sides[player.index()]
    }

    pub fn side_mut(&mut self, player: Player) -> &mut BattleSide {
        &mut self.sides[player.index()]
    }

    /// Resolve a side by its player name, as used by `|win|`
    pub fn side_by_name(&self, name: &str) -> Option<Player> {
        self.sides
            .iter()
            .find(|s| !s.name.is_empty() && s.name == name)
            .map(|s| s.id)
    }

    /// Set game type and resize every side's active slots accordingly
    pub fn set_game_type(&mut self, game_type: GameType) {
        self.game_type = game_type;
        for side in self.sides.iter_mut() {
            side.set_active_slots(game_type.active_slots());
        }
    }

    /// Look up a pokemon by protocol identifier
    pub fn pokemon(&self, ident: &Pokemon) -> Option<&BattlePokemon> {
        let side = self.side(ident.player);
        let idx = side.find_index(&ident.name, ident.slot())?;
        side.team.get(idx)
    }

    pub fn pokemon_mut(&mut self, ident: &Pokemon) -> Option<&mut BattlePokemon> {
        let side = self.side_mut(ident.player);
        let idx = side.find_index(&ident.name, ident.slot())?;
        side.team.get_mut(idx)
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Terminal value from `perspective`: +1 win, -1 loss, 0 tie or undecided
    pub fn outcome(&self, perspective: Player) -> f64 {
        match self.winner {
            Some(winner) if winner == perspective => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        }
    }

    /// Whether side A can currently be checkpointed
    pub fn can_checkpoint(&self) -> bool {
        self.phase == Phase::Battle && self.waiting_for_choice
    }
}

impl Default for BattleState {
    fn default() -> Self {
        Self::new()
    }
}
