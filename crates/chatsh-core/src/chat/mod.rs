pub mod normalize;
pub mod orchestrator;
pub mod spinner;
pub mod terminal;

pub use normalize::normalize_output;
pub use orchestrator::{ChatOrchestrator, TurnEnd, TurnReport};
pub use spinner::Spinner;
pub use terminal::{StdoutTerminal, Terminal};
