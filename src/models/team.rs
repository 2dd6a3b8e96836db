use serde::{Deserialize, Serialize};

/// The slice of a team joined onto an employee row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeamRef {
    pub team_name: Option<String>,
}
