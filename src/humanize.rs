//! Human-readable metatile sizes and tile counts

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid metatile size format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Metatile {0} must be > 0")]
    Zero(&'static str),
}

/// Metatiling factors: how many tiles wide and high one unit of seeding work is.
///
/// Parses from `"4x4"`, `"8X2"`, or a bare `"4"` (square), and deserializes
/// from either that string form or a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetaTileSize {
    width: u32,
    height: u32,
}

impl MetaTileSize {
    pub const SINGLE: MetaTileSize = MetaTileSize {
        width: 1,
        height: 1,
    };

    pub fn new(width: u32, height: u32) -> Result<Self, ParseError> {
        if width == 0 {
            return Err(ParseError::Zero("width"));
        }
        if height == 0 {
            return Err(ParseError::Zero("height"));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tiles covered by one full metatile.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl Default for MetaTileSize {
    fn default() -> Self {
        Self {
            width: 4,
            height: 4,
        }
    }
}

impl FromStr for MetaTileSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        match s.split_once('x') {
            Some((w, h)) => Self::new(w.trim().parse()?, h.trim().parse()?),
            None if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
                let side = s.parse()?;
                Self::new(side, side)
            }
            None => Err(ParseError::InvalidFormat(s)),
        }
    }
}

impl fmt::Display for MetaTileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Serialize for MetaTileSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MetaTileSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MetaTileSizeVisitor;

        impl<'de> serde::de::Visitor<'de> for MetaTileSizeVisitor {
            type Value = MetaTileSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a metatile size as string (e.g., \"4x4\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let side = u32::try_from(v).map_err(E::custom)?;
                MetaTileSize::new(side, side).map_err(E::custom)
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let side = u64::try_from(v).map_err(E::custom)?;
                self.visit_u64(side)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<MetaTileSize>().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(MetaTileSizeVisitor)
    }
}

/// Formats a tile count with thousands separators: `1832603271` → `"1,832,603,271"`.
pub fn format_count(count: &BigUint) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metatile_size() {
        assert_eq!("4x4".parse::<MetaTileSize>().unwrap(), MetaTileSize::default());
        assert_eq!(
            "8X2".parse::<MetaTileSize>().unwrap(),
            MetaTileSize::new(8, 2).unwrap()
        );
        assert_eq!(
            " 3 ".parse::<MetaTileSize>().unwrap(),
            MetaTileSize::new(3, 3).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_garbage_and_zero() {
        assert!(matches!(
            "big".parse::<MetaTileSize>(),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            "4xa".parse::<MetaTileSize>(),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            "0x4".parse::<MetaTileSize>(),
            Err(ParseError::Zero("width"))
        ));
        assert!(matches!(
            "4x0".parse::<MetaTileSize>(),
            Err(ParseError::Zero("height"))
        ));
    }

    #[test]
    fn test_deserialize_string_and_number() {
        #[derive(Deserialize)]
        struct TestStruct {
            metatiling: MetaTileSize,
        }
        let parsed: TestStruct = serde_json::from_str(r#"{"metatiling": "2x6"}"#).unwrap();
        assert_eq!(parsed.metatiling.area(), 12);

        let parsed: TestStruct = serde_json::from_str(r#"{"metatiling": 5}"#).unwrap();
        assert_eq!(parsed.metatiling, MetaTileSize::new(5, 5).unwrap());

        assert!(serde_json::from_str::<TestStruct>(r#"{"metatiling": 0}"#).is_err());
    }

    #[test]
    fn test_display_round_trips_through_serialize() {
        let size = MetaTileSize::new(8, 2).unwrap();
        assert_eq!(size.to_string(), "8x2");
        assert_eq!(serde_json::to_value(size).unwrap(), serde_json::json!("8x2"));
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(&BigUint::from(0u32)), "0");
        assert_eq!(format_count(&BigUint::from(999u32)), "999");
        assert_eq!(format_count(&BigUint::from(1000u32)), "1,000");
        assert_eq!(format_count(&BigUint::from(1_832_603_271u64)), "1,832,603,271");
    }
}
