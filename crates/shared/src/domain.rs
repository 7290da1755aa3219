use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix reserved for client-synthesized list and item ids that the server has not confirmed yet.
pub const PROVISIONAL_ID_PREFIX: &str = "temp-";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Client-side id for an entry the server has not confirmed yet.
            pub fn provisional() -> Self {
                Self(format!("{PROVISIONAL_ID_PREFIX}{}", Uuid::new_v4()))
            }

            pub fn is_provisional(&self) -> bool {
                self.0.starts_with(PROVISIONAL_ID_PREFIX)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(UserId);
string_id_newtype!(ListId);
string_id_newtype!(ItemId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "movie" => Some(MediaType::Movie),
            "tv" => Some(MediaType::Tv),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub id: ListId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One catalog entry placed into a list.
///
/// Within a settled list the `sort_order` values are exactly `0..n` and match
/// the display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub id: ItemId,
    pub list_id: ListId,
    pub tmdb_id: i64,
    pub media_type: MediaType,
    #[serde(default)]
    pub notes: Option<String>,
    pub sort_order: u32,
    pub added_at: DateTime<Utc>,
}

impl List {
    pub fn is_provisional(&self) -> bool {
        self.id.is_provisional()
    }
}

impl ListItem {
    pub fn is_provisional(&self) -> bool {
        self.id.is_provisional()
    }
}
