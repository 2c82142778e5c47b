pub mod arbiter;
pub mod event;
pub mod participant;
pub mod room;
pub mod settle;
pub use arbiter::{ActionArbiter, Resolution};
pub use event::{GameEvent, Request};
pub use participant::{AutoParticipant, ChannelParticipant, Participant};
pub use room::{HandResult, Room};
