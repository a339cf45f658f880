use serde::{Deserialize, Serialize};

/// Lifecycle status shared by stops and routes, stored as its integer code.
///
/// Codes 2, 4, 5, 7 and 8 are reserved and are rejected rather than interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    Cancelled,
    #[default]
    Scheduled,
    InProgress,
    Arrived,
    Completed,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Cancelled => 0,
            Status::Scheduled => 1,
            Status::InProgress => 3,
            Status::Arrived => 6,
            Status::Completed => 9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Cancelled => "cancelled",
            Status::Scheduled => "scheduled",
            Status::InProgress => "in_progress",
            Status::Arrived => "arrived",
            Status::Completed => "completed",
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Status::Cancelled),
            1 => Ok(Status::Scheduled),
            3 => Ok(Status::InProgress),
            6 => Ok(Status::Arrived),
            9 => Ok(Status::Completed),
            other => Err(format!("undefined status code {other}")),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.code()
    }
}
