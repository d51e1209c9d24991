//! The fixed planning poker deck.
//!
//! Cards travel on the wire as their face string (`"0"` … `"100"`, `"?"`,
//! `"☕️"`), which is also what the server stores in its vote map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One selectable card of the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Card {
    Zero,
    One,
    Two,
    Three,
    Five,
    Eight,
    Thirteen,
    Twenty,
    Forty,
    Hundred,
    /// "I can't estimate this" (`?`).
    Unknown,
    /// "I need a break" (`☕️`).
    Break,
}

/// The deck in display order.
pub const DECK: [Card; 12] = [
    Card::Zero,
    Card::One,
    Card::Two,
    Card::Three,
    Card::Five,
    Card::Eight,
    Card::Thirteen,
    Card::Twenty,
    Card::Forty,
    Card::Hundred,
    Card::Unknown,
    Card::Break,
];

impl Card {
    /// The face value as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Card::Zero => "0",
            Card::One => "1",
            Card::Two => "2",
            Card::Three => "3",
            Card::Five => "5",
            Card::Eight => "8",
            Card::Thirteen => "13",
            Card::Twenty => "20",
            Card::Forty => "40",
            Card::Hundred => "100",
            Card::Unknown => "?",
            Card::Break => "☕️",
        }
    }

    /// Story points carried by the card, `None` for the two special cards.
    pub fn points(self) -> Option<u8> {
        match self {
            Card::Zero => Some(0),
            Card::One => Some(1),
            Card::Two => Some(2),
            Card::Three => Some(3),
            Card::Five => Some(5),
            Card::Eight => Some(8),
            Card::Thirteen => Some(13),
            Card::Twenty => Some(20),
            Card::Forty => Some(40),
            Card::Hundred => Some(100),
            Card::Unknown | Card::Break => None,
        }
    }

    /// Base name of the card artwork (`cartes_5`, `cartes_interro`, ...).
    pub fn asset_name(self) -> String {
        match self {
            Card::Unknown => "cartes_interro".to_string(),
            Card::Break => "cartes_cafe".to_string(),
            numeric => format!("cartes_{}", numeric.as_str()),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the deck's faces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown card value {0:?}")]
pub struct UnknownCard(pub String);

impl FromStr for Card {
    type Err = UnknownCard;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Some keyboards drop the emoji variation selector.
        if s == "☕" {
            return Ok(Card::Break);
        }
        DECK.iter()
            .copied()
            .find(|card| card.as_str() == s)
            .ok_or_else(|| UnknownCard(s.to_string()))
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn deck_order_matches_faces() {
        let faces: Vec<&str> = DECK.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            faces,
            ["0", "1", "2", "3", "5", "8", "13", "20", "40", "100", "?", "☕️"]
        );
    }

    #[test]
    fn every_face_parses_back_to_its_card() {
        for card in DECK {
            assert_eq!(card.as_str().parse::<Card>().unwrap(), card);
        }
        assert_eq!("☕".parse::<Card>().unwrap(), Card::Break);
    }

    #[test]
    fn unknown_face_is_rejected() {
        let err = "0.5".parse::<Card>().unwrap_err();
        assert_eq!(err, UnknownCard("0.5".into()));
        assert_eq!(err.to_string(), "unknown card value \"0.5\"");
        let _: Box<dyn std::error::Error> = Box::new(err);
        assert!(serde_json::from_str::<Card>("\"7\"").is_err());
    }

    #[test]
    fn special_cards_have_no_points() {
        assert_eq!(Card::Thirteen.points(), Some(13));
        assert_eq!(Card::Unknown.points(), None);
        assert_eq!(Card::Break.points(), None);
    }

    #[test]
    fn asset_names_follow_artwork_files() {
        assert_eq!(Card::Eight.asset_name(), "cartes_8");
        assert_eq!(Card::Unknown.asset_name(), "cartes_interro");
        assert_eq!(Card::Break.asset_name(), "cartes_cafe");
    }

    #[test]
    fn serializes_as_face_string() {
        assert_eq!(serde_json::to_string(&Card::Hundred).unwrap(), "\"100\"");
        assert_eq!(serde_json::to_string(&Card::Break).unwrap(), "\"☕️\"");
    }
}
