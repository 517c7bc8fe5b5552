// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Records of all three partitions
        manager
            .create_table(
                Table::create()
                    .table(PartitionRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PartitionRecords::Partition).string().not_null())
                    .col(ColumnDef::new(PartitionRecords::Pk).string().not_null())
                    .col(ColumnDef::new(PartitionRecords::Sk).string().not_null())
                    .col(ColumnDef::new(PartitionRecords::Data).json().not_null())
                    .col(ColumnDef::new(PartitionRecords::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(PartitionRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(PartitionRecords::Partition)
                            .col(PartitionRecords::Pk)
                            .col(PartitionRecords::Sk),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_partition_records_expires_at")
                    .table(PartitionRecords::Table)
                    .col(PartitionRecords::Partition)
                    .col(PartitionRecords::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        // Secondary index entries
        manager
            .create_table(
                Table::create()
                    .table(PartitionIndexEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PartitionIndexEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PartitionIndexEntries::Partition).string().not_null())
                    .col(ColumnDef::new(PartitionIndexEntries::IndexName).string().not_null())
                    .col(ColumnDef::new(PartitionIndexEntries::HashKey).string().not_null())
                    .col(ColumnDef::new(PartitionIndexEntries::SortKey).string().not_null())
                    .col(ColumnDef::new(PartitionIndexEntries::Pk).string().not_null())
                    .col(ColumnDef::new(PartitionIndexEntries::Sk).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_partition_index_lookup")
                    .table(PartitionIndexEntries::Table)
                    .col(PartitionIndexEntries::Partition)
                    .col(PartitionIndexEntries::IndexName)
                    .col(PartitionIndexEntries::HashKey)
                    .col(PartitionIndexEntries::SortKey)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_partition_index_owner")
                    .table(PartitionIndexEntries::Table)
                    .col(PartitionIndexEntries::Partition)
                    .col(PartitionIndexEntries::Pk)
                    .col(PartitionIndexEntries::Sk)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PartitionIndexEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PartitionRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PartitionRecords {
    Table,
    Partition,
    Pk,
    Sk,
    Data,
    ExpiresAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PartitionIndexEntries {
    Table,
    Id,
    Partition,
    IndexName,
    HashKey,
    SortKey,
    Pk,
    Sk,
}
