use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,      // 一般市民
    Detective,    // 調査役
    Doctor,       // 護衛役
    Mafia,        // マフィア
    SerialKiller, // 単独の殺人者
}

impl Role {
    /// マフィア陣営かどうか
    pub fn is_mafia(&self) -> bool {
        matches!(self, Role::Mafia)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Citizen => write!(f, "citizen"),
            Role::Detective => write!(f, "detective"),
            Role::Doctor => write!(f, "doctor"),
            Role::Mafia => write!(f, "mafia"),
            Role::SerialKiller => write!(f, "serial_killer"),
        }
    }
}
