pub mod answer;
pub mod event;
pub mod session;
pub mod user;

pub use answer::{AnswerRecord, QuestionKind, Verdict};
pub use event::{Choice, EventRequest, InboundEvent, RenderRequest, Sender};
pub use session::{ActiveQuiz, Mode, PendingQuestion, QuestionBody, SessionState};
pub use user::{UserProfile, WeakSpot};
