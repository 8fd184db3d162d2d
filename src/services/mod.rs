pub mod broadcast;
pub mod feedback;
pub mod notifications;
pub mod participation;
pub mod payment_intents;
pub mod refunds;
pub mod survey;
pub mod webhooks;

pub use refunds::{run_refund_sweep, RefundReport};
pub use survey::{run_survey_sweep, SurveyReport};
