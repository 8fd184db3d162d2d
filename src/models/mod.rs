/// Raised when a persisted status column holds a value this build does not know.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Generates `as_str`, `Display`, `FromStr` and `TryFrom<String>` for a
/// snake_case text-backed status enum.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub mod chat;
pub mod event;
pub mod feedback;
pub mod notification;
pub mod participant;
pub mod payment;
pub mod profile;

pub use chat::{AdminBroadcast, NewBroadcast};
pub use event::{Event, NewEvent};
pub use feedback::{Feedback, NewFeedback};
pub use notification::{NewNotification, Notification};
pub use participant::{NewParticipant, Participant, ParticipantStatus, RefundStatus};
pub use payment::{NewPayment, Payment, PaymentStatus};
pub use profile::{AppRole, Gender, Profile, ProfileContact, RelationshipStatus};
