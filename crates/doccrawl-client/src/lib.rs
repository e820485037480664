pub mod cleaner;
pub mod fetcher;
pub mod llm;
pub mod robots;
pub mod store;

pub use cleaner::HtmdCleaner;
pub use fetcher::ReqwestFetcher;
pub use llm::{ChatClient, OpenAiExtractor, OpenAiTransformer};
pub use robots::RobotsFetcher;
pub use store::FsArtifactStore;
