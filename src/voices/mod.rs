pub mod catalog;
pub mod resolver;

pub use catalog::VoiceCatalog;
pub use resolver::{ResolveMode, ResolvedVoiceReference, VoiceResolver};
