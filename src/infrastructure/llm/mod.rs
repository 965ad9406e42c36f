//! Generative model clients

mod http_client;
mod openai;
mod retry;
mod structured;

pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::{OpenAiProvider, DEFAULT_OPENAI_BASE_URL};
pub use retry::{RetryPolicy, MAX_RETRIES};
pub use structured::{decode, StructuredCaller, StructuredOutput};

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
