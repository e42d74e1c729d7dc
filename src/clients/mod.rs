pub mod openai;
pub mod routing;
pub mod sse;
pub mod traits;

pub use openai::OpenAiCompatibleClient;
pub use routing::{ModelRoute, ProviderKind, check_model_support};
pub use traits::{CompletionProvider, CompletionRequest, FragmentStream, ProviderError};
