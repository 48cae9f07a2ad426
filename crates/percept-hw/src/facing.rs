use serde::{Deserialize, Serialize};

/// Which physical camera a stream is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front-facing ("selfie") camera.
    User,
    /// Rear-facing camera.
    Environment,
}

impl FacingMode {
    /// The other facing mode.
    pub fn flip(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "front" => Ok(FacingMode::User),
            "environment" | "rear" | "back" => Ok(FacingMode::Environment),
            other => Err(format!("unknown facing mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_is_involution() {
        assert_eq!(FacingMode::User.flip(), FacingMode::Environment);
        assert_eq!(FacingMode::User.flip().flip(), FacingMode::User);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("user".parse::<FacingMode>().unwrap(), FacingMode::User);
        assert_eq!("front".parse::<FacingMode>().unwrap(), FacingMode::User);
        assert_eq!(
            "Environment".parse::<FacingMode>().unwrap(),
            FacingMode::Environment
        );
        assert!("sideways".parse::<FacingMode>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for mode in [FacingMode::User, FacingMode::Environment] {
            assert_eq!(mode.to_string().parse::<FacingMode>().unwrap(), mode);
        }
    }
}
