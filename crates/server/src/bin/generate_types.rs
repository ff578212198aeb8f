use std::{env, fs, path::Path};

use anyhow::Context;

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `cargo run --bin generate_types`. Do not edit manually.\n\n";
    let decls: Vec<String> = vec![
        utils::response::ErrorBody::decl(),
        utils::response::ErrorEnvelope::decl(),
        utils::response::DataResponse::<()>::decl(),
        utils::response::MessageResponse::<()>::decl(),
        utils::response::SuccessResponse::decl(),
        utils::response::OffsetPagination::decl(),
        utils::response::PagePagination::decl(),
        utils::response::Paginated::<(), ()>::decl(),
        db::models::priority::Priority::decl(),
        db::models::dossier::DossierType::decl(),
        db::models::dossier::DossierStatus::decl(),
        db::models::dossier::Dossier::decl(),
        db::models::user::UserSummary::decl(),
        db::models::mou::MouWorkflowState::decl(),
        db::models::mou::ExpiringMou::decl(),
        db::models::mou::MouVersion::decl(),
        db::models::mou_renewal::RenewalStatus::decl(),
        db::models::mou_renewal::MouRenewal::decl(),
        db::models::mou_renewal::MouRenewalWithMou::decl(),
        db::models::mou_alert::AlertType::decl(),
        db::models::mou_alert::AlertStatus::decl(),
        db::models::mou_alert::MouExpirationAlert::decl(),
        db::models::mou_negotiation::NegotiationOutcome::decl(),
        db::models::mou_negotiation::MouNegotiation::decl(),
        db::models::mou_negotiation::CreateNegotiation::decl(),
        services::services::mou_renewal::InitiateRenewal::decl(),
        services::services::mou_renewal::UpdateRenewalStatus::decl(),
        services::services::mou_renewal::CompleteRenewal::decl(),
        services::services::mou_renewal::AlertRun::decl(),
        services::services::mou_renewal::ExpiryRun::decl(),
        services::services::timeline::TimelineEvent::decl(),
        services::services::timeline::TimelineFilters::decl(),
        services::services::timeline::TimelineRequest::decl(),
        services::services::timeline::TimelinePage::decl(),
        db::models::assignment::WorkItemType::decl(),
        db::models::assignment::AssignmentStatus::decl(),
        services::services::waiting_queue::AgingBucket::decl(),
        services::services::waiting_queue::QueueSort::decl(),
        services::services::waiting_queue::WaitingQueueItem::decl(),
        services::services::waiting_queue::QueuePagination::decl(),
        services::services::waiting_queue::WaitingQueuePage::decl(),
        db::models::comment::CommentEntityType::decl(),
        db::models::comment::CommentVisibility::decl(),
        db::models::comment::CommentWithAuthor::decl(),
        db::models::comment::ReactionCount::decl(),
        services::services::comments::CreateComment::decl(),
        services::services::comments::UpdateComment::decl(),
        services::services::comments::CommentNode::decl(),
        services::services::comments::CommentListing::decl(),
        services::services::comments::ReactionAction::decl(),
        db::models::watchlist::WatchableEntityType::decl(),
        db::models::watchlist::WatchlistItem::decl(),
        db::models::watchlist::NewWatch::decl(),
        db::models::watchlist::UpdateWatch::decl(),
        db::models::watchlist::WatchSummaryRow::decl(),
        db::models::watchlist::WatchlistEvent::decl(),
        db::models::watchlist::WatchlistTemplate::decl(),
        services::services::watchlist::WatchEntry::decl(),
        services::services::watchlist::WatchlistPage::decl(),
        services::services::watchlist::WatchSummary::decl(),
        services::services::watchlist::WatchCheck::decl(),
        services::services::watchlist::WatchEventsPage::decl(),
        db::models::person::PersonFields::decl(),
        db::models::person::PersonListItem::decl(),
        db::models::person::PersonRole::decl(),
        db::models::person::CreatePersonRole::decl(),
        db::models::person::PersonAffiliation::decl(),
        db::models::person::CreatePersonAffiliation::decl(),
        db::models::person::PersonRelationship::decl(),
        db::models::person::CreatePersonRelationship::decl(),
        services::services::persons::CreatePerson::decl(),
        services::services::persons::UpdatePerson::decl(),
        services::services::persons::PersonDetail::decl(),
        services::services::persons::PersonNetwork::decl(),
        db::models::event::EventType::decl(),
        db::models::event::EventStatus::decl(),
        db::models::event::Event::decl(),
        services::services::events::EventInput::decl(),
        services::services::events::ConflictType::decl(),
        services::services::events::EventConflict::decl(),
        db::models::meeting_agenda::AgendaStatus::decl(),
        db::models::meeting_agenda::AgendaItemType::decl(),
        db::models::meeting_agenda::AgendaItemStatus::decl(),
        db::models::meeting_agenda::TimingStatus::decl(),
        db::models::meeting_agenda::ParticipantType::decl(),
        db::models::meeting_agenda::ParticipantRole::decl(),
        db::models::meeting_agenda::RsvpStatus::decl(),
        db::models::meeting_agenda::AgendaDocumentType::decl(),
        db::models::meeting_agenda::MeetingAgenda::decl(),
        db::models::meeting_agenda::AgendaFilter::decl(),
        db::models::meeting_agenda::AgendaItem::decl(),
        db::models::meeting_agenda::AgendaParticipant::decl(),
        db::models::meeting_agenda::AgendaDocument::decl(),
        services::services::meeting_agenda::AgendaRequest::decl(),
        services::services::meeting_agenda::FullAgenda::decl(),
        services::services::meeting_agenda::AgendaTiming::decl(),
        db::models::ai_summary::AiSummary::decl(),
        services::services::ai_summary::GenerateSummary::decl(),
        services::services::ai_summary::SummaryContent::decl(),
        server::routes::health::HealthStatus::decl(),
        server::routes::ai_summaries::SummaryResponse::decl(),
        server::routes::comments::ReactionResponse::decl(),
        server::routes::watchlist::BulkAdd::decl(),
        server::routes::watchlist::ApplyTemplate::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {}", decl.trim_start_matches("export ")))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{header}{body}\n")
}

fn main() -> anyhow::Result<()> {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("✅ shared/types.ts is up to date.");
            return Ok(());
        }
        eprintln!("❌ shared/types.ts is not up to date. Please run 'cargo run --bin generate_types'.");
        std::process::exit(1);
    }

    fs::create_dir_all(&shared_path).context("creating shared/")?;
    fs::write(&types_path, generated).with_context(|| format!("writing {}", types_path.display()))?;
    println!("✅ TypeScript types generated in {}", types_path.display());
    Ok(())
}
