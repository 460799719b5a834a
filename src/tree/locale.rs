use serde::{Deserialize, Serialize};

/// Display language used when resolving node text and actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    /// Korean, the authoring language of most trees.
    #[default]
    Ko,
    /// English.
    En,
}

impl Locale {
    /// The locale consulted after this one and the neutral field.
    pub fn other(self) -> Locale {
        match self {
            Locale::Ko => Locale::En,
            Locale::En => Locale::Ko,
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locale::Ko => write!(f, "ko"),
            Locale::En => write!(f, "en"),
        }
    }
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ko" | "ko-kr" | "kr" => Ok(Locale::Ko),
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            _ => Err(format!("Unknown locale: {}", s)),
        }
    }
}
