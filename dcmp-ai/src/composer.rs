//! Composition orchestrator
//!
//! Runs the staged pipeline for each call:
//! prompt → completion → extraction → validation.
//!
//! Each call is one independent round trip. Nothing is remembered between
//! calls: prior plans and tracks are passed in by the caller every time, and
//! there is no retry. The only shared state is the session credential store,
//! which is read once per request.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use dcmp_common::config::{RevisionPolicy, TomlConfig};
use dcmp_common::{ApiKey, CredentialStore, Instrument, Plan, Track, ValidationError};

use crate::client::{ChatMessage, CompletionClient, CompletionRequest, ProviderError, ResponseFormat};
use crate::error::GenerationError;
use crate::extract::extract;
use crate::preview::{truncate_chars, MAX_LOG_PREVIEW_CHARS, RAW_RESPONSE_PREVIEW_CHARS};
use crate::prompt::{build_plan_prompt, build_track_prompt, describe_track_request};
use crate::revision::check_identity;
use crate::validate::{to_plan, to_track};

/// Sampling temperature for every generation request
pub const GENERATION_TEMPERATURE: f32 = 0.6;

/// Longest user request text quoted in error messages
const SUBJECT_PREVIEW_CHARS: usize = 200;

/// Relative gap between planned and bar-implied duration worth a warning
const DURATION_TOLERANCE: f64 = 0.25;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    /// Provider name, used as the credential key
    pub provider: String,
    pub model: String,
    pub revision_policy: RevisionPolicy,
}

impl ComposerSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            provider: config.provider.name.clone(),
            model: config.provider.model.clone(),
            revision_policy: config.generation.revision_policy,
        }
    }
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

/// Plan / Track generation pipeline
#[derive(Clone)]
pub struct Composer {
    client: Arc<dyn CompletionClient>,
    credentials: CredentialStore,
    settings: ComposerSettings,
}

impl Composer {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        credentials: CredentialStore,
        settings: ComposerSettings,
    ) -> Self {
        Self {
            client,
            credentials,
            settings,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    /// Generate a plan, or revise `prior_plan` when given
    ///
    /// `prior_tracks` lists instruments whose parts already exist; the service
    /// is told to keep their identity and the result is checked according to
    /// the configured [`RevisionPolicy`].
    pub async fn produce_plan(
        &self,
        content: &str,
        prior_plan: Option<&Plan>,
        prior_tracks: &[Track],
    ) -> Result<Plan, GenerationError> {
        let subject = truncate_chars(content, SUBJECT_PREVIEW_CHARS);
        info!(
            content_len = content.len(),
            revision = prior_plan.is_some(),
            prior_tracks = prior_tracks.len(),
            "Plan generation requested"
        );

        let messages = vec![
            ChatMessage::system(build_plan_prompt(prior_plan, prior_tracks)),
            ChatMessage::user(content),
        ];
        let raw = self.round_trip(messages, &subject).await?;
        let plan = decode(&raw, &subject, to_plan)?;

        report_plan(&plan);

        if !prior_tracks.is_empty() && self.settings.revision_policy != RevisionPolicy::Ignore {
            let drifts = check_identity(prior_plan, prior_tracks, &plan);
            for drift in &drifts {
                warn!(drift = %drift, "Revised plan deviates from generated instruments");
            }
            if !drifts.is_empty() && self.settings.revision_policy == RevisionPolicy::Reject {
                let err = GenerationError::IdentityDrift { subject, drifts };
                error!(code = err.code(), "Plan generation failed: {}", err);
                return Err(err);
            }
        }

        Ok(plan)
    }

    /// Generate the Track for `target`, using `existing_tracks` as context
    pub async fn produce_track(
        &self,
        plan: &Plan,
        existing_tracks: &[Track],
        target: &Instrument,
    ) -> Result<Track, GenerationError> {
        let subject = target.instrument_name.clone();
        info!(
            instrument = %subject,
            is_drum = target.is_percussion(),
            existing_tracks = existing_tracks.len(),
            "Track generation requested"
        );

        let request = describe_track_request(target);
        let messages = vec![ChatMessage::system(build_track_prompt(
            plan,
            existing_tracks,
            &request,
        ))];
        let raw = self.round_trip(messages, &subject).await?;
        let track = decode(&raw, &subject, to_track)?;

        if !track.matches_instrument(target) {
            warn!(
                instrument = %subject,
                track_instrument = %track.instrument_name,
                expected_program = target.midi_program,
                track_program = track.midi_program,
                "Track identity differs from requested instrument"
            );
        }
        for finding in track.notation_warnings() {
            warn!(instrument = %subject, "Notation: {}", finding);
        }

        info!(
            instrument = %subject,
            clef = ?track.clef,
            notation_chars = track.abc_notes.chars().count(),
            "Track generated"
        );
        Ok(track)
    }

    /// Probe `key` against the provider; store it when accepted
    ///
    /// Never fails: every error (empty key, rejected key, network) is `false`.
    pub async fn validate_api_key(&self, key: &str) -> bool {
        let Some(key) = ApiKey::new(key) else {
            warn!("API key validation failed: key is empty");
            return false;
        };

        match self.client.check_key(&key).await {
            Ok(()) => {
                self.credentials.set(&self.settings.provider, key).await;
                info!(provider = %self.settings.provider, "API key validated and stored");
                true
            }
            Err(e) => {
                warn!(provider = %self.settings.provider, "API key validation failed: {}", e);
                false
            }
        }
    }

    /// Store `key` without probing the provider
    pub async fn set_api_key(&self, key: ApiKey) -> bool {
        self.credentials.set(&self.settings.provider, key).await;
        info!(provider = %self.settings.provider, "API key stored");
        true
    }

    /// One request to the service; returns the first choice's text
    async fn round_trip(
        &self,
        messages: Vec<ChatMessage>,
        subject: &str,
    ) -> Result<String, GenerationError> {
        // Snapshot taken now so a concurrent key change cannot split this request
        let api_key = self.credentials.get(&self.settings.provider).await;

        if tracing::enabled!(tracing::Level::DEBUG) {
            for message in &messages {
                debug!(
                    role = ?message.role,
                    prompt = %truncate_chars(&message.content, MAX_LOG_PREVIEW_CHARS),
                    "Generation prompt"
                );
            }
        }

        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: GENERATION_TEMPERATURE,
            response_format: ResponseFormat::JsonObject,
            api_key,
        };

        let provider_failure = |source: ProviderError| {
            let err = GenerationError::Provider {
                subject: subject.to_string(),
                source,
            };
            error!(code = err.code(), "Generation failed: {}", err);
            err
        };

        let response = self.client.complete(request).await.map_err(provider_failure)?;
        let raw = response
            .first_text()
            .ok_or(ProviderError::EmptyResponse)
            .map_err(provider_failure)?
            .to_string();

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                raw_response = %truncate_chars(&raw, MAX_LOG_PREVIEW_CHARS),
                "Generation raw output"
            );
        }

        Ok(raw)
    }
}

/// Extract and validate raw output, attaching diagnostics on failure
fn decode<T>(
    raw: &str,
    subject: &str,
    convert: fn(&Value) -> Result<T, ValidationError>,
) -> Result<T, GenerationError> {
    let raw_preview = || truncate_chars(raw, RAW_RESPONSE_PREVIEW_CHARS);

    let value = extract(raw).map_err(|source| {
        let err = GenerationError::Extraction {
            subject: subject.to_string(),
            raw_preview: raw_preview(),
            source,
        };
        error!(code = err.code(), "Generation failed: {}", err);
        err
    })?;

    convert(&value).map_err(|source| {
        let err = GenerationError::Validation {
            subject: subject.to_string(),
            raw_preview: raw_preview(),
            source,
        };
        error!(code = err.code(), "Generation failed: {}", err);
        err
    })
}

fn report_plan(plan: &Plan) {
    let total_bars = plan.total_bars();
    let planned = f64::from(plan.song_info.duration_seconds);

    match plan.estimated_duration_seconds() {
        Some(estimated) => {
            if (estimated - planned).abs() > planned * DURATION_TOLERANCE {
                warn!(
                    total_bars,
                    estimated_seconds = estimated,
                    planned_seconds = planned,
                    "Section lengths do not add up to the planned duration"
                );
            }
        }
        None => warn!(
            time_signature = %plan.song_info.time_signature,
            "Unrecognised time signature; duration not checked"
        ),
    }

    info!(
        title = %plan.song_info.title,
        instruments = plan.instrumentation.len(),
        sections = plan.song_structure.len(),
        total_bars,
        "Plan generated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Role, ScriptedCompletionClient};

    const PLAN_JSON: &str = r#"{
        "songInfo": {"title": "Sunny", "mood": ["happy"], "genre": "piano", "bpm": 120, "key": "C Major", "timeSignature": "4/4", "durationSeconds": 30},
        "instrumentation": [{"instrumentName": "Piano", "midiProgram": 0, "role": "solo"}],
        "songStructure": [{"section": "A", "bars": 8, "description": "theme"}, {"section": "B", "bars": 7, "description": "variation"}]
    }"#;

    fn composer(client: Arc<ScriptedCompletionClient>) -> Composer {
        Composer::new(client, CredentialStore::new(), ComposerSettings::default())
    }

    #[tokio::test]
    async fn test_plan_request_shape() {
        let client = Arc::new(ScriptedCompletionClient::new().with_response(PLAN_JSON));
        let composer = composer(client.clone());

        composer.produce_plan("a happy tune", None, &[]).await.unwrap();

        let requests = client.requests().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "deepseek-chat");
        assert_eq!(request.temperature, GENERATION_TEMPERATURE);
        assert_eq!(request.response_format, ResponseFormat::JsonObject);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1], ChatMessage::user("a happy tune"));
        assert!(request.api_key.is_none());
    }

    #[tokio::test]
    async fn test_credential_read_at_call_time() {
        let client = Arc::new(
            ScriptedCompletionClient::new()
                .with_response(PLAN_JSON)
                .with_response(PLAN_JSON),
        );
        let composer = composer(client.clone());

        composer.produce_plan("first", None, &[]).await.unwrap();
        assert!(composer.set_api_key(ApiKey::new("sk-late").unwrap()).await);
        composer.produce_plan("second", None, &[]).await.unwrap();

        let requests = client.requests().await;
        assert!(requests[0].api_key.is_none());
        assert_eq!(requests[1].api_key.as_ref().unwrap().expose(), "sk-late");
    }

    #[tokio::test]
    async fn test_missing_choice_is_provider_error() {
        let client = Arc::new(ScriptedCompletionClient::new());
        let err = composer(client)
            .produce_plan("anything", None, &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::Provider {
                source: ProviderError::EmptyResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_extraction_failure_carries_subject_and_preview() {
        let client = Arc::new(ScriptedCompletionClient::new().with_response("{\"songInfo\":"));
        let err = composer(client)
            .produce_plan("a sad waltz", None, &[])
            .await
            .unwrap_err();

        assert_eq!(err.code(), "EXTRACTION_ERROR");
        let message = err.to_string();
        assert!(message.contains("'a sad waltz'"));
        assert!(message.contains("Raw response: '{\"songInfo\":'"));
    }

    #[tokio::test]
    async fn test_validate_api_key_never_fails() {
        let client = Arc::new(ScriptedCompletionClient::new().accepting_key("sk-good"));
        let composer = composer(client);

        assert!(!composer.validate_api_key("").await);
        assert!(!composer.validate_api_key("sk-bad").await);
        assert!(!composer.credentials().contains("deepseek").await);

        assert!(composer.validate_api_key("sk-good").await);
        let stored = composer.credentials().get("deepseek").await.unwrap();
        assert_eq!(stored.expose(), "sk-good");
    }
}
