pub mod code;
pub mod domain;
pub mod fireworks;
pub mod memory;
pub mod ports;
pub mod session;

pub use code::{generate_code, random_code};
pub use domain::{
    Code, NewValentine, RecipientName, Reply, SenderName, ValentineRecord, ValidationError,
};
pub use fireworks::{
    Firework, FireworkId, FireworkSettings, FireworkShow, Particle, ShowEvent, Viewport,
};
pub use memory::InMemoryStore;
pub use ports::{Clipboard, ClipboardError, PortError, PortResult, ValentineStore};
pub use session::{
    create_valentine, CreateError, Effects, EntryContext, EntryError, LinkBuilder, LinkKind,
    Mode, PendingReply, PersistOutcome, Phase, ResultStatus, ResultsView, ShareLinks,
    ViewSession,
};
