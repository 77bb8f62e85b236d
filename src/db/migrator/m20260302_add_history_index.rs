use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_reconcile_history_request")
                    .table(ReconcileHistory::Table)
                    .col(ReconcileHistory::RequestId)
                    .col(ReconcileHistory::RecordedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_season_records_status")
                    .table(SeasonRecords::Table)
                    .col(SeasonRecords::Status)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_season_records_status")
                    .table(SeasonRecords::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_reconcile_history_request")
                    .table(ReconcileHistory::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum ReconcileHistory {
    Table,
    RequestId,
    RecordedAt,
}

#[derive(DeriveIden)]
enum SeasonRecords {
    Table,
    Status,
}
