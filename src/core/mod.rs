pub mod radar;
pub mod transparency;

pub use radar::{CredentialCheck, RadarEngine, SourceStatus};
pub use transparency::TransparencyAssembler;
