mod api_key;
mod api_key_gen;
mod completion;
mod embedding;
mod log_entry;
mod model;
mod provider;
mod validators;

pub use api_key::*;
pub use api_key_gen::*;
pub use completion::*;
pub use embedding::*;
pub use log_entry::*;
pub use model::*;
pub use provider::*;
pub use validators::*;
