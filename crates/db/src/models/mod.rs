pub mod ai_summary;
pub mod assignment;
pub mod comment;
pub mod dossier;
pub mod event;
pub mod meeting_agenda;
pub mod mou;
pub mod mou_alert;
pub mod mou_negotiation;
pub mod mou_renewal;
pub mod notification;
pub mod person;
pub mod priority;
pub mod timeline;
pub mod user;
pub mod user_preference;
pub mod watchlist;
