mod interface;
mod mock;
mod replay;
mod synthetic;
mod types;

pub use interface::{EmbeddingOracle, FrameSource};
pub use mock::{MockEmbeddingOracle, MockFrameSource};
pub use replay::ReplayOracle;
pub use synthetic::SyntheticFrameSource;
pub use types::Detection;
