mod choice;

pub use choice::{Choice, SlotAction};

use crate::server::Player;
use serde_json::json;

/// Commands written to the simulator's input stream
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    /// >start {"formatid":FORMAT}
    Start { format_id: String },

    /// >player SIDE {"name":NAME,"team":TEAM}
    Player {
        side: Player,
        name: String,
        team: Option<String>,
    },

    /// >SIDE team DIGITS, lead order for team preview (1-based team positions)
    TeamOrder { side: Player, order: Vec<usize> },

    /// >SIDE CHOICE
    Choose { side: Player, choice: Choice },

    /// Raw line for anything not modelled above
    Raw(String),
}

impl SimCommand {
    /// Serialize command to its input-stream line, without the trailing newline
    pub fn to_protocol_string(&self) -> String {
        match self {
            Self::Start { format_id } => {
                format!(">start {}", json!({ "formatid": format_id }))
            }
            Self::Player { side, name, team } => {
                let options = match team {
                    Some(team) => json!({ "name": name, "team": team }),
                    None => json!({ "name": name }),
                };
                format!(">player {} {}", side, options)
            }
            Self::TeamOrder { side, order } => {
                let digits: String = order.iter().map(|i| i.to_string()).collect();
                format!(">{} team {}", side, digits)
            }
            Self::Choose { side, choice } => format!(">{} {}", side, choice),
            Self::Raw(command) => command.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_command() {
        let cmd = SimCommand::Start {
            format_id: "gen9randombattle".into(),
        };
        assert_eq!(
            cmd.to_protocol_string(),
            r#">start {"formatid":"gen9randombattle"}"#
        );
    }

    #[test]
    fn test_player_command_escapes_team() {
        let cmd = SimCommand::Player {
            side: Player::P1,
            name: "Al \"Ace\"".into(),
            team: Some("Garchomp||||earthquake|||||||]".into()),
        };
        let line = cmd.to_protocol_string();
        assert!(line.starts_with(">player p1 {"));
        let json: serde_json::Value = serde_json::from_str(&line[">player p1 ".len()..]).unwrap();
        assert_eq!(json["name"], "Al \"Ace\"");
        assert_eq!(json["team"], "Garchomp||||earthquake|||||||]");
    }

    #[test]
    fn test_team_order_command() {
        let cmd = SimCommand::TeamOrder {
            side: Player::P2,
            order: vec![3, 1, 2, 4, 5, 6],
        };
        assert_eq!(cmd.to_protocol_string(), ">p2 team 312456");
    }

    #[test]
    fn test_choose_command() {
        let cmd = SimCommand::Choose {
            side: Player::P1,
            choice: Choice::new(vec![SlotAction::Pass, SlotAction::Switch { index: 3 }]),
        };
        assert_eq!(cmd.to_protocol_string(), ">p1 pass, switch 3");
    }
}
