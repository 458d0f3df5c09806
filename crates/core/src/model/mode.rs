use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown tutor mode: {0} (expected socratic or instructional)")]
pub struct TutorModeError(pub String);

/// Teaching style the agents follow for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorMode {
    /// Guide exclusively through questions; never explain.
    #[default]
    Socratic,
    /// Explain concepts directly and correct mistakes.
    Instructional,
}

impl TutorMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TutorMode::Socratic => "socratic",
            TutorMode::Instructional => "instructional",
        }
    }
}

impl fmt::Display for TutorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TutorMode {
    type Err = TutorModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "socratic" => Ok(Self::Socratic),
            "instructional" => Ok(Self::Instructional),
            _ => Err(TutorModeError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Socratic".parse::<TutorMode>().unwrap(), TutorMode::Socratic);
        assert_eq!(
            " instructional ".parse::<TutorMode>().unwrap(),
            TutorMode::Instructional
        );
        assert!("lecture".parse::<TutorMode>().is_err());
    }
}
