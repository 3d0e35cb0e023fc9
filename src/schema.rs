use sea_query::Iden;

/// Metadata table - key-value store for database configuration
#[derive(Iden)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Jobs table - one row per audio-synthesis job
///
/// Covers both section-audio jobs (voice_id set) and narration-chunk
/// jobs (voice_id NULL). Terminal rows are kept as history; a re-request
/// for the same key inserts a new row.
#[derive(Iden)]
pub enum Jobs {
    Table,
    Id,
    TargetId,
    VoiceId,
    ParentId,
    ItemIndex,
    Status,
    AudioUrl,
    Error,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}

/// Recovery log table - audit trail of administrative overrides
#[derive(Iden)]
pub enum RecoveryLog {
    Table,
    Id,
    TargetId,
    VoiceId,
    Action,
    PriorStatus,
    NewStatus,
    Detail,
    PerformedAt,
}
