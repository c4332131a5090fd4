use duelist_protocol::Player;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Failed to restore battle snapshot")]
    Snapshot(#[source] anyhow::Error),

    #[error("No legal choices for {0}")]
    NoLegalChoices(Player),

    #[error("Search produced an unparseable choice: {0}")]
    InvalidChoice(String),
}
