//! Replays a room's tile and instance placement in insertion order and
//! flags structural anomalies as each entity is revealed: ID gaps, authored
//! tints, non-default scale, rotated instances, creation code, and texture
//! regions that reach outside their declared bounds.

pub mod cursor;
pub mod detect;
pub mod events;
pub mod rect;
pub mod room;
pub mod session;

pub use cursor::Cursor;
pub use detect::{AnomalyKind, DetectorConfig};
pub use events::{AnomalyEvent, DecayPolicy, EventLog};
pub use rect::{Colour, ResolvedRect, SourceRect, TextureRef};
pub use room::{EntitySlot, RoomCache};
pub use session::{EntityKind, Session, ViewerConfig, VisibleEntity};
