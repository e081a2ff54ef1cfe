use crate::auth::{
    CredentialLookup, Endpoint, EnvCredentials, ProviderSettings, SettingsManager, SettingsSource,
};
use crate::models::{self, CacheStore, CatalogResolver, MemoryCache, ModelCatalogSource, SetupData};
use crate::probe::{HttpRateLimitProbe, Notifier, ProbeWarning, RateLimitProbe, TracingNotifier};
use crate::providers::compatible::CompatibleTransport;
use crate::providers::{AiError, Transport};
use crate::request::{self, PayloadBuilder, RequestPayload};
use crate::streaming::StreamedChat;
use crate::types::*;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Builds the transport once the endpoint and secret are known.
pub type TransportFactory = Arc<dyn Fn(&Endpoint, &str) -> Arc<dyn Transport> + Send + Sync>;

/// Result of a chat call: materialized, or a stream to drain.
pub enum ChatResult {
    Complete(ChatOutput),
    Streamed(StreamedChat),
}

impl ChatResult {
    /// Materialize either variant, draining the stream if needed.
    pub async fn into_output(self) -> Result<ChatOutput, AiError> {
        match self {
            ChatResult::Complete(out) => Ok(out),
            ChatResult::Streamed(s) => s.into_output().await,
        }
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self, ChatResult::Streamed(_))
    }
}

struct LoadedClient {
    endpoint: Endpoint,
    api_key: String,
    options: Map<String, Value>,
    transport: Arc<dyn Transport>,
}

fn init_failure<E>(err: E) -> AiError
where
    E: Display + Into<Box<dyn std::error::Error + Send + Sync>>,
{
    AiError::setup(format!("Failed to initialize mittwald client: {}", err), err)
}

/// The mittwald AI hosting provider. Composes catalog resolution, payload
/// building, streaming aggregation and error classification behind one
/// per-operation surface.
pub struct MittwaldProvider {
    settings: Arc<dyn SettingsSource>,
    credentials: Arc<dyn CredentialLookup>,
    catalog: CatalogResolver,
    probe: Arc<dyn RateLimitProbe>,
    notifier: Arc<dyn Notifier>,
    transport_factory: TransportFactory,
    client: OnceCell<LoadedClient>,
    moderation: OnceLock<bool>,
}

impl MittwaldProvider {
    pub fn builder() -> MittwaldProviderBuilder {
        MittwaldProviderBuilder::new()
    }

    async fn client(&self) -> Result<&LoadedClient, AiError> {
        self.client
            .get_or_try_init(|| async { self.load_client() })
            .await
    }

    fn load_client(&self) -> Result<LoadedClient, AiError> {
        let settings = self.settings.load().map_err(init_failure)?;
        self.moderation.get_or_init(|| settings.moderation);

        let endpoint = settings.endpoint().map_err(init_failure)?;
        let api_key = self.credentials.resolve(&settings.api_key).map_err(init_failure)?;
        let transport = (self.transport_factory)(&endpoint, &api_key);
        info!(endpoint = %endpoint, "mittwald client initialized");

        Ok(LoadedClient {
            endpoint,
            api_key,
            options: settings.options,
            transport,
        })
    }

    /// The endpoint the client talks to. Initializes the client.
    pub async fn endpoint(&self) -> Result<Endpoint, AiError> {
        Ok(self.client().await?.endpoint.clone())
    }

    /// Read once per instance. Unreadable settings count as enabled.
    pub fn moderation_enabled(&self) -> bool {
        *self.moderation.get_or_init(|| match self.settings.load() {
            Ok(s) => s.moderation,
            Err(e) => {
                debug!(error = %e, "settings unreadable, moderation stays enabled");
                ProviderSettings::default().moderation
            }
        })
    }

    pub fn supported_operation_types(&self) -> Vec<OperationType> {
        vec![
            OperationType::Chat,
            OperationType::Embeddings,
            OperationType::Moderation,
        ]
    }

    pub async fn get_configured_models(
        &self,
        operation: OperationType,
        capabilities: &CapabilitySet,
    ) -> Result<Vec<String>, AiError> {
        let client = self.client().await?;
        Ok(self
            .catalog
            .resolve(client.transport.as_ref(), operation, capabilities)
            .await?)
    }

    /// Global settings first, then the call's own options on top.
    fn effective_options(&self, client: &LoadedClient, mut options: RequestOptions) -> RequestOptions {
        let mut base = client.options.clone();
        base.extend(std::mem::take(&mut options.base));
        options.base = base;
        options
    }

    pub async fn chat(
        &self,
        input: ChatInput,
        model_id: &str,
        options: RequestOptions,
    ) -> Result<ChatResult, AiError> {
        let client = self.client().await?;
        let options = self.effective_options(client, options);
        let payload =
            self.build_payload(OperationType::Chat, model_id, &OperationInput::Chat(input), &options)?;

        if options.stream {
            let chunks = client.transport.create_chat_completion_streamed(&payload);
            return Ok(ChatResult::Streamed(StreamedChat::new(chunks)));
        }

        let completion = client.transport.create_chat_completion(&payload).await?;
        Ok(ChatResult::Complete(ChatOutput {
            message: OutputMessage {
                role: completion.role,
                text: completion.content.unwrap_or_default(),
                tool_calls: completion.tool_calls,
            },
            finish_reason: completion.finish_reason,
            usage: completion.usage.unwrap_or_default().to_usage(),
            raw: Some(completion.raw),
        }))
    }

    pub async fn embeddings(
        &self,
        input: EmbeddingsInput,
        model_id: &str,
        options: RequestOptions,
    ) -> Result<EmbeddingsOutput, AiError> {
        let client = self.client().await?;
        let options = self.effective_options(client, options);
        let payload = self.build_payload(
            OperationType::Embeddings,
            model_id,
            &OperationInput::Embeddings(input),
            &options,
        )?;

        let resp = client.transport.create_embedding(&payload).await?;
        Ok(EmbeddingsOutput {
            vector: resp.embedding,
            usage: resp.usage.unwrap_or_default().to_usage(),
            raw: resp.raw,
        })
    }

    pub fn moderation(&self, _input: &str, _model_id: &str) -> Result<Value, AiError> {
        Err(AiError::NotImplemented(OperationType::Moderation))
    }

    pub fn text_to_image(&self, _prompt: &str, _model_id: &str) -> Result<Value, AiError> {
        Err(AiError::NotImplemented(OperationType::TextToImage))
    }

    pub fn text_to_speech(&self, _text: &str, _model_id: &str) -> Result<Value, AiError> {
        Err(AiError::NotImplemented(OperationType::TextToSpeech))
    }

    pub fn speech_to_text(&self, _audio: &[u8], _model_id: &str) -> Result<Value, AiError> {
        Err(AiError::NotImplemented(OperationType::SpeechToText))
    }

    pub fn get_setup_data(&self) -> SetupData {
        models::setup_data()
    }

    pub fn model_settings(&self, model_id: &str, general: Map<String, Value>) -> Map<String, Value> {
        models::model_settings(model_id, general)
    }

    pub fn embeddings_vector_size(&self, model_id: &str) -> usize {
        models::embeddings_vector_size(model_id)
    }

    /// Run the rate-limit probe and hand any warning to the notifier.
    pub async fn post_setup(&self) -> Result<Option<ProbeWarning>, AiError> {
        let client = self.client().await?;
        let warning = self.probe.probe(&client.endpoint, &client.api_key).await?;
        if let Some(w) = &warning {
            self.notifier.warn(&w.to_string());
        }
        Ok(warning)
    }

    /// Check that the configured credential can list models. Returns how many are visible.
    pub async fn verify_setup(&self) -> Result<usize, AiError> {
        let client = self.client().await?;
        let listing = client.transport.list_models().await?;
        Ok(listing.len())
    }
}

#[async_trait]
impl ModelCatalogSource for MittwaldProvider {
    async fn configured_models(
        &self,
        operation: OperationType,
        capabilities: &CapabilitySet,
    ) -> Result<Vec<String>, AiError> {
        self.get_configured_models(operation, capabilities).await
    }
}

impl PayloadBuilder for MittwaldProvider {
    fn build_payload(
        &self,
        operation: OperationType,
        model_id: &str,
        input: &OperationInput,
        options: &RequestOptions,
    ) -> Result<RequestPayload, AiError> {
        request::build_payload(operation, model_id, input, options)
    }
}

pub struct MittwaldProviderBuilder {
    settings: Option<Arc<dyn SettingsSource>>,
    credentials: Option<Arc<dyn CredentialLookup>>,
    cache: Option<Arc<dyn CacheStore>>,
    probe: Option<Arc<dyn RateLimitProbe>>,
    notifier: Option<Arc<dyn Notifier>>,
    transport_factory: Option<TransportFactory>,
}

impl Default for MittwaldProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MittwaldProviderBuilder {
    pub fn new() -> Self {
        Self {
            settings: None,
            credentials: None,
            cache: None,
            probe: None,
            notifier: None,
            transport_factory: None,
        }
    }

    pub fn settings(mut self, settings: impl SettingsSource + 'static) -> Self {
        self.settings = Some(Arc::new(settings));
        self
    }

    pub fn credentials(mut self, credentials: impl CredentialLookup + 'static) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn probe(mut self, probe: impl RateLimitProbe + 'static) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn transport_factory(
        mut self,
        factory: impl Fn(&Endpoint, &str) -> Arc<dyn Transport> + Send + Sync + 'static,
    ) -> Self {
        self.transport_factory = Some(Arc::new(factory));
        self
    }

    /// Use a fixed transport regardless of endpoint and key.
    pub fn transport(self, transport: Arc<dyn Transport>) -> Self {
        self.transport_factory(move |_, _| transport.clone())
    }

    pub fn build(self) -> MittwaldProvider {
        MittwaldProvider {
            settings: self
                .settings
                .unwrap_or_else(|| Arc::new(SettingsManager::default_path())),
            credentials: self.credentials.unwrap_or_else(|| Arc::new(EnvCredentials)),
            catalog: CatalogResolver::new(
                self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new())),
            ),
            probe: self.probe.unwrap_or_else(|| Arc::new(HttpRateLimitProbe::new())),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            transport_factory: self.transport_factory.unwrap_or_else(|| {
                Arc::new(|endpoint: &Endpoint, key: &str| {
                    Arc::new(CompatibleTransport::new(endpoint.as_str(), key)) as Arc<dyn Transport>
                })
            }),
            client: OnceCell::new(),
            moderation: OnceLock::new(),
        }
    }
}
