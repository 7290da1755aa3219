use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    domain::{ItemId, List, ListItem, MediaType},
    error::{ApiError, ErrorCode},
};

pub const MAX_NOTES_CHARS: usize = 500;
pub const MAX_LIST_NAME_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_USERNAME_CHARS: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(validation("username is required"));
        }
        if username.chars().count() > MAX_USERNAME_CHARS {
            return Err(validation("username too long"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddListItemRequest {
    pub tmdb_id: i64,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AddListItemRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.tmdb_id <= 0 {
            return Err(validation("TMDB ID must be a positive integer"));
        }
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_CHARS {
                return Err(validation("Notes too long"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPosition {
    pub id: ItemId,
    pub sort_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderListItemsRequest {
    pub items: Vec<ItemPosition>,
}

impl ReorderListItemsRequest {
    pub fn from_items(items: &[ListItem]) -> Self {
        Self {
            items: items
                .iter()
                .map(|item| ItemPosition {
                    id: item.id.clone(),
                    sort_order: item.sort_order,
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for position in &self.items {
            if position.id.as_str().trim().is_empty() {
                return Err(validation("Invalid item ID"));
            }
            if position.id.is_provisional() {
                return Err(validation(format!(
                    "item {} has not been saved yet",
                    position.id
                )));
            }
            if !seen.insert(&position.id) {
                return Err(validation(format!("duplicate item ID {}", position.id)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl CreateListRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_list_name(&self.name)?;
        validate_description(self.description.as_deref())
    }
}

/// Partial list update. An absent `description` leaves it untouched, an
/// explicit `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateListRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl UpdateListRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_list_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description.as_deref())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListsResponse {
    pub lists: Vec<List>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub list: List,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemsResponse {
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemResponse {
    pub item: ListItem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn validate_list_name(name: &str) -> Result<(), ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(validation("List name is required"));
    }
    if name.chars().count() > MAX_LIST_NAME_CHARS {
        return Err(validation("Name too long"));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), ApiError> {
    match description {
        Some(text) if text.chars().count() > MAX_DESCRIPTION_CHARS => {
            Err(validation("Description too long"))
        }
        _ => Ok(()),
    }
}

fn validation(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Validation, message)
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
