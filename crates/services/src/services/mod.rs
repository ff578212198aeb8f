pub mod ai_summary;
pub mod comments;
pub mod database_validator;
pub mod events;
pub mod llm_client;
pub mod markdown;
pub mod meeting_agenda;
pub mod mou_renewal;
pub mod persons;
pub mod renewal_scheduler;
pub mod timeline;
pub mod validation;
pub mod waiting_queue;
pub mod watchlist;
