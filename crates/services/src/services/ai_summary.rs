//! Generated executive summaries for dossiers, with a deterministic fallback
//! when no model is configured or the model call fails.

use std::{collections::BTreeMap, sync::Arc};

use db::models::{
    ai_summary::{AiSummary, NewAiSummary},
    dossier::{Dossier, DossierType},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    llm_client::{JsonCompletion, LlmError},
    timeline::{TimelineError, TimelineEvent, TimelineRequest, TimelineService},
    validation::{ValidationError, required},
};

pub const CONTEXT_EVENTS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SummaryEntityType {
    Dossier,
    Country,
    Organization,
    Forum,
    Person,
    Engagement,
    Theme,
}

impl SummaryEntityType {
    fn accepts(self, dossier_type: DossierType) -> bool {
        match self {
            Self::Dossier => true,
            Self::Country => dossier_type == DossierType::Country,
            Self::Organization => dossier_type == DossierType::Organization,
            Self::Forum => dossier_type == DossierType::Forum,
            Self::Person => dossier_type == DossierType::Person,
            Self::Engagement => dossier_type == DossierType::Engagement,
            Self::Theme => matches!(dossier_type, DossierType::Theme | DossierType::Topic),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SummaryLength {
    Brief,
    #[default]
    Standard,
    Detailed,
}

impl SummaryLength {
    pub fn words(self) -> u32 {
        match self {
            Self::Brief => 150,
            Self::Standard => 300,
            Self::Detailed => 500,
        }
    }

    pub fn sections(self) -> usize {
        match self {
            Self::Brief => 2,
            Self::Standard => 4,
            Self::Detailed => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SummaryFocus {
    Activity,
    Relationships,
    Commitments,
    Strategic,
    #[default]
    All,
}

impl SummaryFocus {
    fn instruction(self) -> &'static str {
        match self {
            Self::Activity => "Concentrate on recent meetings, interactions and events.",
            Self::Relationships => "Concentrate on key relationships and counterparts.",
            Self::Commitments => "Concentrate on agreements, MoUs and open commitments.",
            Self::Strategic => "Concentrate on strategic importance and outlook.",
            Self::All => "Cover activity, relationships, commitments and strategic importance.",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SummaryLanguage {
    En,
    Ar,
    #[default]
    Both,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct GenerateSummary {
    pub entity_type: Option<SummaryEntityType>,
    pub entity_id: Option<Uuid>,
    pub length: Option<SummaryLength>,
    pub focus: Option<SummaryFocus>,
    pub language: Option<SummaryLanguage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BilingualText {
    pub en: String,
    pub ar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SummarySection {
    pub title_en: String,
    pub title_ar: String,
    pub content_en: String,
    pub content_ar: String,
}

/// Shape the model must return; the fallback produces the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SummaryContent {
    pub executive_summary: BilingualText,
    #[serde(default)]
    pub key_highlights: Vec<BilingualText>,
    #[serde(default)]
    pub sections: Vec<SummarySection>,
}

#[derive(Debug, Error)]
pub enum AiSummaryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("entity not found")]
    NotFound,
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error("summary generation unavailable: {reason}")]
    Unavailable {
        reason: String,
        fallback: Box<SummaryContent>,
    },
}

/// What the summary is built from.
#[derive(Debug, Clone)]
pub struct SummaryContext {
    pub dossier: Dossier,
    pub events: Vec<TimelineEvent>,
}

impl SummaryContext {
    /// Event counts keyed by event type, in a stable order.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.event_type.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

pub fn build_prompt(
    context: &SummaryContext,
    length: SummaryLength,
    focus: SummaryFocus,
    language: SummaryLanguage,
) -> String {
    let dossier = &context.dossier;
    let mut prompt = format!(
        "Write an executive summary of about {} words with {} sections for the {} dossier \"{}\" ({}).\n{}\n",
        length.words(),
        length.sections(),
        dossier.dossier_type,
        dossier.name_en,
        dossier.name_ar,
        focus.instruction(),
    );
    if let Some(description) = &dossier.description_en {
        prompt.push_str(&format!("Description: {description}\n"));
    }
    match language {
        SummaryLanguage::En => prompt.push_str("Write the English text carefully; the Arabic fields may be brief.\n"),
        SummaryLanguage::Ar => prompt.push_str("Write the Arabic text carefully; the English fields may be brief.\n"),
        SummaryLanguage::Both => prompt.push_str("Provide equally complete English and Arabic text.\n"),
    }
    prompt.push_str("\nRecent activity (newest first):\n");
    if context.events.is_empty() {
        prompt.push_str("- none recorded\n");
    }
    for event in &context.events {
        prompt.push_str(&format!(
            "- [{}] {} {}\n",
            event.event_type,
            event.event_date.format("%Y-%m-%d"),
            event.title_en
        ));
    }
    prompt.push_str(
        "\nRespond with JSON only: {\"executive_summary\": {\"en\": \"\", \"ar\": \"\"}, \
         \"key_highlights\": [{\"en\": \"\", \"ar\": \"\"}], \
         \"sections\": [{\"title_en\": \"\", \"title_ar\": \"\", \"content_en\": \"\", \"content_ar\": \"\"}]}",
    );
    prompt
}

const SYSTEM_PROMPT: &str = "You are a diplomatic analyst preparing concise bilingual (English and Arabic) \
    briefings. Only state facts present in the supplied context.";

/// Summary assembled from context counts alone.
pub fn fallback_summary(context: &SummaryContext, length: SummaryLength) -> SummaryContent {
    let dossier = &context.dossier;
    let counts = context.counts();
    let total = context.events.len();

    let executive_summary = BilingualText {
        en: format!(
            "{} is a {} dossier with {} recent recorded activities.",
            dossier.name_en, dossier.dossier_type, total
        ),
        ar: format!("{} ملف يضم {} من الأنشطة المسجلة مؤخرًا.", dossier.name_ar, total),
    };

    let key_highlights = counts
        .iter()
        .map(|(kind, count)| BilingualText {
            en: format!("{count} {kind} events"),
            ar: format!("{count} من أحداث {kind}"),
        })
        .collect();

    let sections = context
        .events
        .iter()
        .take(length.sections())
        .map(|event| SummarySection {
            title_en: event.title_en.clone(),
            title_ar: event.title_ar.clone(),
            content_en: event
                .description_en
                .clone()
                .unwrap_or_else(|| format!("{} on {}", event.event_type, event.event_date.format("%Y-%m-%d"))),
            content_ar: event
                .description_ar
                .clone()
                .unwrap_or_else(|| event.event_date.format("%Y-%m-%d").to_string()),
        })
        .collect();

    SummaryContent { executive_summary, key_highlights, sections }
}

pub struct AiSummaryService {
    pool: PgPool,
    timeline: TimelineService,
    llm: Option<Arc<dyn JsonCompletion>>,
    model: Option<String>,
}

impl AiSummaryService {
    pub fn new(pool: PgPool, llm: Option<Arc<dyn JsonCompletion>>, model: Option<String>) -> Self {
        Self {
            timeline: TimelineService::new(pool.clone()),
            pool,
            llm,
            model,
        }
    }

    pub async fn generate(&self, user_id: Uuid, request: GenerateSummary) -> Result<AiSummary, AiSummaryError> {
        let entity_type = required(request.entity_type, "entity_type")?;
        let entity_id = required(request.entity_id, "entity_id")?;
        let length = request.length.unwrap_or_default();
        let focus = request.focus.unwrap_or_default();
        let language = request.language.unwrap_or_default();

        let dossier = Dossier::find_by_id(&self.pool, entity_id)
            .await?
            .filter(|d| entity_type.accepts(d.dossier_type))
            .ok_or(AiSummaryError::NotFound)?;

        let page = self
            .timeline
            .fetch(TimelineRequest {
                dossier_id: Some(dossier.id),
                dossier_type: Some(dossier.dossier_type),
                filters: Default::default(),
                cursor: None,
                limit: Some(CONTEXT_EVENTS),
            })
            .await?;
        let context = SummaryContext { dossier, events: page.events };

        let content = match self.ask_model(&context, length, focus, language).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, %entity_id, "summary generation failed, returning fallback");
                return Err(AiSummaryError::Unavailable {
                    reason: e.to_string(),
                    fallback: Box::new(fallback_summary(&context, length)),
                });
            }
        };

        let summary = AiSummary::create(
            &self.pool,
            &NewAiSummary {
                entity_type: &entity_type.to_string(),
                entity_id,
                summary_length: &length.to_string(),
                focus: &focus.to_string(),
                content: serde_json::to_value(&content).map_err(|e| AiSummaryError::Unavailable {
                    reason: e.to_string(),
                    fallback: Box::new(fallback_summary(&context, length)),
                })?,
                model: self.model.as_deref(),
                generated_by: user_id,
            },
        )
        .await?;
        info!(summary_id = %summary.id, %entity_id, "stored generated summary");
        Ok(summary)
    }

    async fn ask_model(
        &self,
        context: &SummaryContext,
        length: SummaryLength,
        focus: SummaryFocus,
        language: SummaryLanguage,
    ) -> Result<SummaryContent, LlmError> {
        let llm = self.llm.as_ref().ok_or(LlmError::NotConfigured)?;
        let prompt = build_prompt(context, length, focus, language);
        let max_tokens = length.words() * 8;
        let raw = llm.complete_json(SYSTEM_PROMPT, &prompt, max_tokens).await?;
        serde_json::from_value(raw).map_err(|e| LlmError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use db::models::dossier::DossierStatus;
    use serde_json::json;

    use super::*;
    use crate::services::timeline::TimelineEventType;

    fn context(events: usize) -> SummaryContext {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let dossier = Dossier {
            id: Uuid::new_v4(),
            dossier_type: DossierType::Country,
            name_en: "Japan".into(),
            name_ar: "اليابان".into(),
            description_en: Some("Bilateral relations".into()),
            description_ar: None,
            status: DossierStatus::Active,
            sensitivity_level: 1,
            tags: vec![],
            created_by: None,
            created_at: at,
            updated_at: at,
        };
        let events = (0..events)
            .map(|i| {
                let kind = if i % 2 == 0 { TimelineEventType::Calendar } else { TimelineEventType::Mou };
                let value = json!({
                    "id": format!("{kind}-{i}"),
                    "event_type": kind,
                    "source_table": "x",
                    "source_id": Uuid::new_v4(),
                    "title_en": format!("Event {i}"),
                    "title_ar": format!("حدث {i}"),
                    "description_en": null,
                    "description_ar": null,
                    "event_date": at - Duration::days(i as i64),
                    "priority": null,
                    "status": null,
                    "metadata": {},
                });
                serde_json::from_value(value).unwrap()
            })
            .collect();
        SummaryContext { dossier, events }
    }

    #[test]
    fn test_length_config() {
        assert_eq!((SummaryLength::Brief.words(), SummaryLength::Brief.sections()), (150, 2));
        assert_eq!((SummaryLength::default().words(), SummaryLength::default().sections()), (300, 4));
        assert_eq!((SummaryLength::Detailed.words(), SummaryLength::Detailed.sections()), (500, 6));
    }

    #[test]
    fn test_entity_type_matching() {
        assert!(SummaryEntityType::Dossier.accepts(DossierType::Forum));
        assert!(SummaryEntityType::Theme.accepts(DossierType::Topic));
        assert!(!SummaryEntityType::Person.accepts(DossierType::Country));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let ctx = context(5);
        let first = fallback_summary(&ctx, SummaryLength::Brief);
        assert_eq!(first, fallback_summary(&ctx, SummaryLength::Brief));
        assert_eq!(first.sections.len(), 2);
        assert_eq!(first.key_highlights.len(), 2);
        assert_eq!(first.key_highlights[0].en, "3 calendar events");
        assert!(first.executive_summary.en.contains("5 recent recorded activities"));
    }

    #[test]
    fn test_fallback_without_events() {
        let summary = fallback_summary(&context(0), SummaryLength::Detailed);
        assert!(summary.sections.is_empty());
        assert!(summary.key_highlights.is_empty());
    }

    #[test]
    fn test_prompt_mentions_context() {
        let prompt = build_prompt(&context(2), SummaryLength::Standard, SummaryFocus::Commitments, SummaryLanguage::Both);
        assert!(prompt.contains("about 300 words with 4 sections"));
        assert!(prompt.contains("Japan"));
        assert!(prompt.contains("[mou] 2026-02-28 Event 1"));
        assert!(prompt.contains("open commitments"));
    }

    #[test]
    fn test_model_reply_shape() {
        let reply = json!({
            "executive_summary": { "en": "Summary", "ar": "ملخص" },
            "sections": [{ "title_en": "A", "title_ar": "أ", "content_en": "x", "content_ar": "س" }]
        });
        let content: SummaryContent = serde_json::from_value(reply).unwrap();
        assert!(content.key_highlights.is_empty());
        assert_eq!(content.sections.len(), 1);
    }
}
