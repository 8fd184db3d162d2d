//! Admin broadcast: a message fanned out into direct chats with every
//! profile that matches a set of demographic filters.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::middleware::{require_admin, AuthUser};
use crate::models::{Gender, NewBroadcast, Profile, RelationshipStatus};
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BroadcastFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_max: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_status: Option<RelationshipStatus>,
}

impl BroadcastFilters {
    /// Trimmed city needle, `None` when blank.
    pub fn city_filter(&self) -> Option<&str> {
        self.city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
    }

    pub fn matches(&self, profile: &Profile, today: NaiveDate) -> bool {
        if let Some(gender) = self.gender {
            if profile.gender.0 != Some(gender) {
                return false;
            }
        }

        if let Some(status) = self.relationship_status {
            if profile.relationship_status.0 != Some(status) {
                return false;
            }
        }

        if let Some(needle) = self.city_filter() {
            let needle = needle.to_lowercase();
            let in_city = profile
                .city
                .as_deref()
                .is_some_and(|city| city.to_lowercase().contains(&needle));
            if !in_city {
                return false;
            }
        }

        // Profiles without a birth date are not excluded by age bounds.
        if let Some(birth_date) = profile.birth_date {
            if self.age_min.is_some() || self.age_max.is_some() {
                let age = age_in_years(birth_date, today);
                if self.age_min.is_some_and(|min| age < i64::from(min)) {
                    return false;
                }
                if self.age_max.is_some_and(|max| age > i64::from(max)) {
                    return false;
                }
            }
        }

        match self.interests.as_deref() {
            Some(wanted) if !wanted.is_empty() => {
                let held: Vec<String> = profile.interests.iter().map(|i| i.to_lowercase()).collect();
                wanted
                    .iter()
                    .any(|interest| held.contains(&interest.to_lowercase()))
            }
            _ => true,
        }
    }
}

/// Whole years between `birth_date` and `today`, on a 365.25-day year.
fn age_in_years(birth_date: NaiveDate, today: NaiveDate) -> i64 {
    let days = (today - birth_date).num_days() as f64;
    (days / 365.25).floor() as i64
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BroadcastRequest {
    #[serde(default)]
    pub filters: Option<BroadcastFilters>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastOutcome {
    pub ok: bool,
    pub sent: usize,
}

#[instrument(skip(state, request), fields(admin_user_id = %admin.user_id))]
pub async fn send_broadcast(
    state: &AppState,
    admin: &AuthUser,
    request: BroadcastRequest,
    now: DateTime<Utc>,
) -> AppResult<BroadcastOutcome> {
    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("message required".to_string()))?;

    require_admin(state, admin).await?;
    let admin_user_id = admin.user_id;

    let filters = request.filters.unwrap_or_default();
    let today = now.date_naive();
    let targets: Vec<Profile> = state
        .store
        .broadcast_candidates(&filters)
        .await?
        .into_iter()
        .filter(|profile| filters.matches(profile, today))
        .collect();

    if targets.is_empty() {
        info!("Broadcast matched no profiles");
        return Ok(BroadcastOutcome { ok: true, sent: 0 });
    }

    let filters_json = serde_json::to_value(&filters)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let broadcast = state
        .store
        .record_broadcast(&NewBroadcast {
            admin_user_id,
            message: message.clone(),
            filters: filters_json,
        })
        .await?;

    for profile in &targets {
        let chat_id = state
            .store
            .get_or_create_direct_chat(admin_user_id, profile.user_id)
            .await?;
        state
            .store
            .insert_chat_message(chat_id, admin_user_id, &message)
            .await?;
        state
            .store
            .add_broadcast_recipient(broadcast.id, profile.user_id)
            .await?;
    }

    info!(broadcast_id = %broadcast.id, sent = targets.len(), "Broadcast delivered");
    Ok(BroadcastOutcome {
        ok: true,
        sent: targets.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{OptionalGender, OptionalRelationship};
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn profile() -> Profile {
        Profile {
            user_id: Uuid::new_v4(),
            email: Some("anna@example.com".to_string()),
            display_name: Some("Anna".to_string()),
            birth_date: NaiveDate::from_ymd_opt(1995, 3, 15),
            gender: OptionalGender(Some(Gender::Female)),
            city: Some("Berlin-Mitte".to_string()),
            interests: vec!["Hiking".to_string(), "Jazz".to_string()],
            relationship_status: OptionalRelationship(Some(RelationshipStatus::Single)),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filters_match_everyone() {
        assert!(BroadcastFilters::default().matches(&profile(), today()));
    }

    #[test]
    fn exact_fields_must_match() {
        let filters = BroadcastFilters {
            gender: Some(Gender::Male),
            ..Default::default()
        };
        assert!(!filters.matches(&profile(), today()));

        let filters = BroadcastFilters {
            gender: Some(Gender::Female),
            relationship_status: Some(RelationshipStatus::InPartnership),
            ..Default::default()
        };
        assert!(!filters.matches(&profile(), today()));

        let mut unknown = profile();
        unknown.gender = OptionalGender(None);
        let filters = BroadcastFilters {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        assert!(!filters.matches(&unknown, today()));
    }

    #[test]
    fn city_is_a_case_insensitive_substring() {
        let filters = BroadcastFilters {
            city: Some("berlin".to_string()),
            ..Default::default()
        };
        assert!(filters.matches(&profile(), today()));

        let filters = BroadcastFilters {
            city: Some("Hamburg".to_string()),
            ..Default::default()
        };
        assert!(!filters.matches(&profile(), today()));

        let filters = BroadcastFilters {
            city: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(filters.matches(&profile(), today()));
    }

    #[test]
    fn age_bounds_apply_only_with_a_birth_date() {
        // Born 1995-03-15, so 30 on 2025-06-01.
        let within = BroadcastFilters {
            age_min: Some(30),
            age_max: Some(30),
            ..Default::default()
        };
        assert!(within.matches(&profile(), today()));

        let too_young = BroadcastFilters {
            age_min: Some(31),
            ..Default::default()
        };
        assert!(!too_young.matches(&profile(), today()));

        let too_old = BroadcastFilters {
            age_max: Some(29),
            ..Default::default()
        };
        assert!(!too_old.matches(&profile(), today()));

        let mut no_birth_date = profile();
        no_birth_date.birth_date = None;
        assert!(too_young.matches(&no_birth_date, today()));
    }

    #[test]
    fn any_shared_interest_is_enough() {
        let filters = BroadcastFilters {
            interests: Some(vec!["cooking".to_string(), "JAZZ".to_string()]),
            ..Default::default()
        };
        assert!(filters.matches(&profile(), today()));

        let filters = BroadcastFilters {
            interests: Some(vec!["cooking".to_string()]),
            ..Default::default()
        };
        assert!(!filters.matches(&profile(), today()));

        let filters = BroadcastFilters {
            interests: Some(Vec::new()),
            ..Default::default()
        };
        assert!(filters.matches(&profile(), today()));
    }

    #[test]
    fn age_uses_a_quarter_day_year() {
        let birth = NaiveDate::from_ymd_opt(2000, 6, 1).unwrap();
        assert_eq!(age_in_years(birth, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()), 24);
        assert_eq!(age_in_years(birth, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()), 25);
    }
}
