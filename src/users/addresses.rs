use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::{PrimaryAddress, RecentAddress, SavedAddress, User};
use crate::error::AppError;

/// A location as submitted by a client. Which fields are mandatory depends
/// on the operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressInput {
    pub name: Option<String>,
    pub apartment: Option<String>,
    pub street: Option<String>,
    pub instructions: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_mobile: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub primary_address: Option<PrimaryAddress>,
    /// A single location to push onto the recent list.
    pub multiple_recent_addresses: Option<AddressInput>,
    /// A single location to push onto the saved list.
    pub saved_address: Option<AddressInput>,
}

struct Location {
    lat: f64,
    lon: f64,
    address: String,
}

fn location(input: &AddressInput, message: &str) -> Result<Location, AppError> {
    match (input.lat, input.lon, input.address.as_ref()) {
        (Some(lat), Some(lon), Some(address)) => Ok(Location {
            lat,
            lon,
            address: address.clone(),
        }),
        _ => Err(AppError::ValidationError(message.to_string())),
    }
}

const MISSING_SAVED_FIELDS: &str = "Missing required fields: name, lat, lon, address";

fn required_name(input: &AddressInput) -> Result<String, AppError> {
    input
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::ValidationError(MISSING_SAVED_FIELDS.to_string()))
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn same_place(lat: f64, lon: f64, address: &str, loc: &Location) -> bool {
    lat == loc.lat && lon == loc.lon && address == loc.address
}

/// Applies the profile fields present in `update`. Locations are validated
/// before anything is touched.
pub fn apply_profile_update(user: &mut User, update: ProfileUpdate) -> Result<(), AppError> {
    let recent = update
        .multiple_recent_addresses
        .as_ref()
        .map(|input| location(input, "Invalid recent address data").map(|loc| (input, loc)))
        .transpose()?;
    let saved = update
        .saved_address
        .as_ref()
        .map(|input| location(input, "Invalid saved address data").map(|loc| (input, loc)))
        .transpose()?;

    if let Some(name) = update.name {
        user.name = name;
    }
    if let Some(email) = update.email {
        user.email = email;
    }
    if let Some(primary) = update.primary_address {
        user.primary_address = Some(primary);
    }

    if let Some((input, loc)) = recent {
        user.multiple_recent_addresses
            .retain(|a| !same_place(a.lat, a.lon, &a.address, &loc));
        let entry = RecentAddress {
            id: Uuid::new_v4(),
            address: loc.address,
            lat: loc.lat,
            lon: loc.lon,
            pincode: input.pincode.clone(),
            kind: "recent".to_string(),
            updated_at: Utc::now(),
        };
        user.selected_recent_address = Some(SavedAddress::from(&entry));
        user.multiple_recent_addresses.insert(0, entry);
    }

    if let Some((input, loc)) = saved {
        user.saved_address
            .retain(|a| !same_place(a.lat, a.lon, &a.address, &loc));
        let entry = SavedAddress {
            id: Uuid::new_v4(),
            name: text(&input.name),
            apartment: text(&input.apartment),
            street: text(&input.street),
            instructions: text(&input.instructions),
            kind: text(&input.kind),
            lat: loc.lat,
            lon: loc.lon,
            address: loc.address,
            pincode: text(&input.pincode),
            receiver_name: text(&input.receiver_name),
            receiver_mobile: text(&input.receiver_mobile),
            updated_at: Utc::now(),
        };
        user.selected_recent_address = Some(entry.clone());
        user.saved_address.insert(0, entry);
    }

    Ok(())
}

/// Adds a saved address at the front and selects it. The selected copy
/// carries the full display line.
pub fn add_saved_address(user: &mut User, input: AddressInput) -> Result<SavedAddress, AppError> {
    let name = required_name(&input)?;
    let loc = location(&input, MISSING_SAVED_FIELDS)?;

    let entry = SavedAddress {
        id: Uuid::new_v4(),
        name,
        apartment: text(&input.apartment),
        street: text(&input.street),
        instructions: text(&input.instructions),
        kind: input
            .kind
            .clone()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| "home".to_string()),
        lat: loc.lat,
        lon: loc.lon,
        address: loc.address,
        pincode: text(&input.pincode),
        receiver_name: text(&input.receiver_name),
        receiver_mobile: text(&input.receiver_mobile),
        updated_at: Utc::now(),
    };

    let mut selected = entry.clone();
    selected.address = display_line(&entry);
    selected.instructions = String::new();

    user.saved_address.insert(0, entry.clone());
    user.selected_recent_address = Some(selected);
    Ok(entry)
}

/// `apartment, street, address` with empty parts dropped.
pub fn display_line(address: &SavedAddress) -> String {
    [&address.apartment, &address.street, &address.address]
        .iter()
        .filter(|part| !part.is_empty())
        .map(|part| part.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn update_saved_address(
    user: &mut User,
    id: Uuid,
    input: AddressInput,
) -> Result<SavedAddress, AppError> {
    let name = required_name(&input)?;
    let loc = location(&input, MISSING_SAVED_FIELDS)?;

    let existing = user
        .saved_address
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| AppError::NotFound("Saved address not found".to_string()))?;

    existing.name = name;
    existing.apartment = text(&input.apartment);
    existing.street = text(&input.street);
    existing.instructions = text(&input.instructions);
    existing.kind = text(&input.kind);
    existing.lat = loc.lat;
    existing.lon = loc.lon;
    existing.address = loc.address;
    existing.pincode = text(&input.pincode);
    existing.updated_at = Utc::now();
    let updated = existing.clone();

    if user.selected_recent_address.as_ref().map(|s| s.id) == Some(id) {
        user.selected_recent_address = Some(updated.clone());
    }
    Ok(updated)
}

pub fn delete_saved_address(user: &mut User, id: Uuid) -> Result<(), AppError> {
    let before = user.saved_address.len();
    user.saved_address.retain(|a| a.id != id);
    if user.saved_address.len() == before {
        return Err(AppError::NotFound("Address not found".to_string()));
    }
    reselect_if_deleted(user, id);
    Ok(())
}

pub fn delete_recent_address(user: &mut User, id: Uuid) -> Result<(), AppError> {
    let before = user.multiple_recent_addresses.len();
    user.multiple_recent_addresses.retain(|a| a.id != id);
    if user.multiple_recent_addresses.len() == before {
        return Err(AppError::NotFound("Address not found".to_string()));
    }
    reselect_if_deleted(user, id);
    Ok(())
}

// Saved entries take priority over recent ones.
fn reselect_if_deleted(user: &mut User, deleted: Uuid) {
    if user.selected_recent_address.as_ref().map(|s| s.id) != Some(deleted) {
        return;
    }
    user.selected_recent_address = user
        .saved_address
        .first()
        .cloned()
        .or_else(|| user.multiple_recent_addresses.first().map(SavedAddress::from));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: Option<&str>, lat: f64, lon: f64, address: &str) -> AddressInput {
        AddressInput {
            name: name.map(str::to_string),
            lat: Some(lat),
            lon: Some(lon),
            address: Some(address.to_string()),
            ..Default::default()
        }
    }

    fn user() -> User {
        User::new("+919999900000".to_string())
    }

    #[test]
    fn test_add_saved_address_selects_display_copy() {
        let mut u = user();
        let mut addr = input(Some("Home"), 12.9, 77.6, "MG Road");
        addr.apartment = Some("Flat 4".into());

        let added = add_saved_address(&mut u, addr).unwrap();
        assert_eq!(added.kind, "home");
        assert_eq!(u.saved_address[0].id, added.id);

        let selected = u.selected_recent_address.as_ref().unwrap();
        assert_eq!(selected.id, added.id);
        assert_eq!(selected.address, "Flat 4, MG Road");
    }

    #[test]
    fn test_add_saved_address_requires_name_and_location() {
        let mut u = user();
        let err = add_saved_address(&mut u, input(None, 1.0, 2.0, "x")).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let mut missing_lat = input(Some("Home"), 1.0, 2.0, "x");
        missing_lat.lat = None;
        assert!(add_saved_address(&mut u, missing_lat).is_err());
        assert!(u.saved_address.is_empty());
    }

    #[test]
    fn test_recent_location_replaces_duplicate() {
        let mut u = user();
        let update = || ProfileUpdate {
            multiple_recent_addresses: Some(input(None, 1.0, 2.0, "Same place")),
            ..Default::default()
        };

        apply_profile_update(&mut u, update()).unwrap();
        apply_profile_update(&mut u, update()).unwrap();

        assert_eq!(u.multiple_recent_addresses.len(), 1);
        assert_eq!(u.multiple_recent_addresses[0].kind, "recent");
        assert_eq!(
            u.selected_recent_address.as_ref().map(|s| s.id),
            Some(u.multiple_recent_addresses[0].id)
        );
    }

    #[test]
    fn test_invalid_location_leaves_profile_untouched() {
        let mut u = user();
        let mut bad = input(None, 1.0, 2.0, "x");
        bad.address = None;

        let update = ProfileUpdate {
            name: Some("Asha".into()),
            saved_address: Some(bad),
            ..Default::default()
        };
        assert!(apply_profile_update(&mut u, update).is_err());
        assert_eq!(u.name, "");
    }

    #[test]
    fn test_update_saved_address_refreshes_selection() {
        let mut u = user();
        let added = add_saved_address(&mut u, input(Some("Home"), 1.0, 2.0, "Old")).unwrap();

        let updated =
            update_saved_address(&mut u, added.id, input(Some("Work"), 3.0, 4.0, "New")).unwrap();
        assert_eq!(updated.id, added.id);
        assert_eq!(updated.kind, "");
        assert_eq!(u.selected_recent_address.as_ref().unwrap().address, "New");

        let missing = update_saved_address(&mut u, Uuid::new_v4(), input(Some("X"), 0.0, 0.0, "y"));
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_delete_selected_prefers_saved_then_recent() {
        let mut u = user();
        apply_profile_update(
            &mut u,
            ProfileUpdate {
                multiple_recent_addresses: Some(input(None, 5.0, 5.0, "Recent")),
                ..Default::default()
            },
        )
        .unwrap();
        let first = add_saved_address(&mut u, input(Some("A"), 1.0, 1.0, "A st")).unwrap();
        let second = add_saved_address(&mut u, input(Some("B"), 2.0, 2.0, "B st")).unwrap();

        delete_saved_address(&mut u, second.id).unwrap();
        assert_eq!(u.selected_recent_address.as_ref().map(|s| s.id), Some(first.id));

        delete_saved_address(&mut u, first.id).unwrap();
        let recent_id = u.multiple_recent_addresses[0].id;
        assert_eq!(u.selected_recent_address.as_ref().map(|s| s.id), Some(recent_id));

        delete_recent_address(&mut u, recent_id).unwrap();
        assert!(u.selected_recent_address.is_none());
    }

    #[test]
    fn test_delete_unselected_keeps_selection() {
        let mut u = user();
        let first = add_saved_address(&mut u, input(Some("A"), 1.0, 1.0, "A st")).unwrap();
        let second = add_saved_address(&mut u, input(Some("B"), 2.0, 2.0, "B st")).unwrap();

        delete_saved_address(&mut u, first.id).unwrap();
        assert_eq!(u.selected_recent_address.as_ref().map(|s| s.id), Some(second.id));
        assert!(matches!(
            delete_recent_address(&mut u, first.id),
            Err(AppError::NotFound(_))
        ));
    }
}
