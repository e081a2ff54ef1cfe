pub mod auth;
pub mod client;
pub mod models;
pub mod probe;
pub mod providers;
pub mod request;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use auth::{
    CredentialLookup, Endpoint, EnvCredentials, ProviderSettings, SettingsManager, SettingsSource,
    StaticCredentials,
};
pub use client::{ChatResult, MittwaldProvider, MittwaldProviderBuilder};
pub use models::{CacheStore, CatalogResolver, MemoryCache, ModelCatalogSource, SetupData};
pub use probe::{HttpRateLimitProbe, Notifier, ProbeWarning, RateLimitProbe};
pub use providers::classify::{ErrorClassification, classify};
pub use providers::compatible::CompatibleTransport;
pub use providers::{AiError, ProviderError, Transport};
pub use request::{PayloadBuilder, RequestPayload, build_payload};
pub use streaming::{ChatStreamAggregator, StreamAggregator, StreamedChat};
pub use types::*;

#[cfg(test)]
pub(crate) mod testing {
    use crate::auth::Endpoint;
    use crate::probe::{Notifier, ProbeWarning, RateLimitProbe};
    use crate::providers::{ChunkStream, ProviderError, Transport};
    use crate::request::RequestPayload;
    use crate::types::*;
    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory transport with canned replies. Records every payload it receives.
    #[derive(Default)]
    pub struct FakeTransport {
        models: Mutex<Vec<ModelDescriptor>>,
        list_error: Mutex<Option<ProviderError>>,
        list_calls: AtomicUsize,
        completion: Mutex<Option<Result<ChatCompletion, ProviderError>>>,
        chunks: Mutex<Vec<Result<ChatMessageChunk, ProviderError>>>,
        embedding: Mutex<Option<EmbeddingResponse>>,
        payloads: Mutex<Vec<RequestPayload>>,
    }

    impl FakeTransport {
        pub fn with_models(models: Vec<ModelDescriptor>) -> Self {
            let t = Self::default();
            t.set_models(models);
            t
        }

        /// The next listing fails with `err`; later ones succeed.
        pub fn failing_list(err: ProviderError) -> Self {
            let t = Self::default();
            *t.list_error.lock().unwrap() = Some(err);
            t
        }

        pub fn set_models(&self, models: Vec<ModelDescriptor>) {
            *self.models.lock().unwrap() = models;
        }

        pub fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        pub fn with_completion(self, completion: ChatCompletion) -> Self {
            *self.completion.lock().unwrap() = Some(Ok(completion));
            self
        }

        pub fn failing_chat(self, err: ProviderError) -> Self {
            *self.completion.lock().unwrap() = Some(Err(err));
            self
        }

        pub fn with_chunks(self, chunks: Vec<Result<ChatMessageChunk, ProviderError>>) -> Self {
            *self.chunks.lock().unwrap() = chunks;
            self
        }

        pub fn with_embedding(self, embedding: EmbeddingResponse) -> Self {
            *self.embedding.lock().unwrap() = Some(embedding);
            self
        }

        pub fn payloads(&self) -> Vec<RequestPayload> {
            self.payloads.lock().unwrap().clone()
        }

        fn record(&self, payload: &RequestPayload) {
            self.payloads.lock().unwrap().push(payload.clone());
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.list_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(self.models.lock().unwrap().clone())
        }

        async fn create_chat_completion(
            &self,
            payload: &RequestPayload,
        ) -> Result<ChatCompletion, ProviderError> {
            self.record(payload);
            self.completion
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ProviderError::Other("no canned completion".into())))
        }

        fn create_chat_completion_streamed(&self, payload: &RequestPayload) -> ChunkStream {
            self.record(payload);
            let chunks = std::mem::take(&mut *self.chunks.lock().unwrap());
            stream::iter(chunks).boxed()
        }

        async fn create_embedding(
            &self,
            payload: &RequestPayload,
        ) -> Result<EmbeddingResponse, ProviderError> {
            self.record(payload);
            self.embedding
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ProviderError::Other("no canned embedding".into()))
        }
    }

    pub struct FakeProbe(Option<ProbeWarning>);

    impl FakeProbe {
        pub fn warning(w: ProbeWarning) -> Self {
            Self(Some(w))
        }

        pub fn quiet() -> Self {
            Self(None)
        }
    }

    #[async_trait]
    impl RateLimitProbe for FakeProbe {
        async fn probe(
            &self,
            _endpoint: &Endpoint,
            _api_key: &str,
        ) -> Result<Option<ProbeWarning>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    pub struct RecordingNotifier(Mutex<Vec<String>>);

    impl RecordingNotifier {
        pub fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn warn(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }
}
