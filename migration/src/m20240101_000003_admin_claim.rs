use sea_orm_migration::prelude::*;

/// One row per claimable slot. `slot` is the primary key, so a concurrent
/// second insert for the same slot conflicts instead of succeeding.
#[derive(DeriveIden)]
enum AdminClaim {
    Table,
    Slot,
    UserId,
    ClaimedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AdminClaim::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AdminClaim::Slot)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AdminClaim::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(AdminClaim::ClaimedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AdminClaim::Table).if_exists().to_owned())
            .await
    }
}
