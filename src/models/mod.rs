mod event;
mod event_participant;
mod meal;
mod user;

pub use event::*;
pub use event_participant::*;
pub use meal::*;
pub use user::*;
