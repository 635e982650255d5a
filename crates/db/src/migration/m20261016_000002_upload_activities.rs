//! Upload audit log.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(UPLOAD_ACTIVITIES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS upload_activities CASCADE;")
            .await?;
        Ok(())
    }
}

const UPLOAD_ACTIVITIES_SQL: &str = r"
-- file_id is not a foreign key: entries outlive deleted files
CREATE TABLE upload_activities (
    id UUID PRIMARY KEY,
    owner_uid VARCHAR(128) NOT NULL,
    action VARCHAR(16) NOT NULL CHECK (action IN ('upload', 'delete', 'set_primary')),
    file_id UUID,
    file_name VARCHAR(255) NOT NULL,
    file_size BIGINT,
    ip_address VARCHAR(45),
    user_agent VARCHAR(500),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_upload_activities_owner ON upload_activities(owner_uid, created_at DESC);
CREATE INDEX idx_upload_activities_file ON upload_activities(file_id) WHERE file_id IS NOT NULL;
";
