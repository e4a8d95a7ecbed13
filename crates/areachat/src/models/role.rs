use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The participant a message is attributed to
pub enum Role {
    System,
    User,
    Assistant,
}
