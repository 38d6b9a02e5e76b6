/// LLM decorators for adding functionality to base LLM implementations.
///
/// Decorators implement the [`LLM`](crate::llm::LLM) trait themselves and wrap
/// another implementation, adding their behaviour transparently. They forward
/// the inner provider's type and identifying parameters, so cache keys and
/// serialized configurations are unaffected by decoration.
///
/// # Available Decorators
///
/// - **Retry**: automatic retry with exponential backoff for failed provider calls
pub mod retry;

pub use retry::RetryingLLM;
