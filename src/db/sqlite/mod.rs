mod api_keys;
mod common;
mod completions;
mod embeddings;
mod logs;
mod models;
mod providers;

pub use api_keys::SqliteApiKeyRepo;
pub use completions::SqliteCompletionRepo;
pub use embeddings::SqliteEmbeddingRepo;
pub use logs::SqliteLogRepo;
pub use models::SqliteModelRepo;
pub use providers::SqliteProviderRepo;
