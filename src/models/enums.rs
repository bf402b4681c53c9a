use serde::{Deserialize, Serialize};

/// Unrecognized wire value for a string-backed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: {value:?}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(EvidenceKind {
    Audio => "audio",
    Image => "image",
});

str_enum!(RiskLevel {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
    Unknown => "UNKNOWN",
});

impl EvidenceKind {
    /// Content type sent when the file name gives no hint.
    pub fn fallback_mime(&self) -> &'static str {
        match self {
            Self::Audio => "audio/mpeg",
            Self::Image => "image/jpeg",
        }
    }
}

impl RiskLevel {
    /// Parse a level as the risk service spells it; case-insensitive.
    pub fn parse_wire(raw: &str) -> Result<Self, InvalidEnum> {
        raw.trim().to_ascii_uppercase().parse()
    }
}
