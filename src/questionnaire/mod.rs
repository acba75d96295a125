//! Resumable questionnaire: catalog, ranked answers, progress and routes.

pub mod flow;
pub mod model;
pub mod progress;
pub mod responses;
pub mod routes;

pub use flow::{QuestionnaireFlow, QuestionnaireSnapshot};
pub use model::{Question, QuestionCatalog, QuestionOption};
pub use progress::Position;
pub use responses::{PrioritizedResponses, ResponseModel};
pub use routes::{QuestionnaireRouteState, questionnaire_routes};
