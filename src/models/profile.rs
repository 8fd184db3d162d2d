use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

text_enum!(Gender, "gender", {
    Male => "male",
    Female => "female",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    Single,
    InPartnership,
}

text_enum!(RelationshipStatus, "relationship status", {
    Single => "single",
    InPartnership => "in_partnership",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    User,
    Admin,
}

text_enum!(AppRole, "role", {
    User => "user",
    Admin => "admin",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[sqlx(try_from = "Option<String>")]
    pub gender: OptionalGender,
    pub city: Option<String>,
    pub interests: Vec<String>,
    #[sqlx(try_from = "Option<String>")]
    pub relationship_status: OptionalRelationship,
    pub created_at: DateTime<Utc>,
}

/// Nullable enum columns; sqlx's `try_from` needs a concrete target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionalGender(pub Option<Gender>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionalRelationship(pub Option<RelationshipStatus>);

impl TryFrom<Option<String>> for OptionalGender {
    type Error = super::UnknownVariant;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        value.map(|v| v.parse()).transpose().map(OptionalGender)
    }
}

impl TryFrom<Option<String>> for OptionalRelationship {
    type Error = super::UnknownVariant;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        value.map(|v| v.parse()).transpose().map(OptionalRelationship)
    }
}

/// The slice of a profile the survey sweep needs to reach a participant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileContact {
    pub user_id: Uuid,
    pub email: Option<String>,
}
