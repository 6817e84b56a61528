use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_items_table::Migration),
            Box::new(m20240101_000002_create_users_table::Migration),
            Box::new(m20240101_000003_create_receipts_table::Migration),
            Box::new(m20240101_000004_create_defects_table::Migration),
            Box::new(m20240101_000005_create_photos_table::Migration),
            Box::new(m20240101_000006_create_receipt_sequences_table::Migration),
            Box::new(m20240301_000007_create_product_submissions_table::Migration),
        ]
    }
}

mod m20240101_000001_create_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Items::ItemNo)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Items::ProductName).string().not_null())
                        .col(ColumnDef::new(Items::Description).text().null())
                        .col(ColumnDef::new(Items::Category).string().null())
                        .col(
                            ColumnDef::new(Items::Status)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Items::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Items::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_status")
                        .table(Items::Table)
                        .col(Items::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Items {
        Table,
        Id,
        ItemNo,
        ProductName,
        Description,
        Category,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Users::EmployeeCode)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Phone).string().not_null().default(""))
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(16)
                                .not_null()
                                .default("staff"),
                        )
                        .col(
                            ColumnDef::new(Users::Status)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(64)
                                .null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Users {
        Table,
        Id,
        EmployeeCode,
        Name,
        Phone,
        Role,
        Status,
        Username,
        PasswordHash,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_receipts_table {
    use super::m20240101_000001_create_items_table::Items;
    use super::m20240101_000002_create_users_table::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_receipts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Receipts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Receipts::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Receipts::ReceiptNo)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Receipts::ItemId).uuid().not_null())
                        .col(ColumnDef::new(Receipts::UserId).uuid().not_null())
                        .col(ColumnDef::new(Receipts::QrCode).string().null())
                        .col(ColumnDef::new(Receipts::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(Receipts::DefectQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Receipts::Status)
                                .string_len(16)
                                .not_null()
                                .default("completed"),
                        )
                        .col(ColumnDef::new(Receipts::Location).string().null())
                        .col(ColumnDef::new(Receipts::Notes).text().null())
                        .col(
                            ColumnDef::new(Receipts::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_item_id")
                                .from(Receipts::Table, Receipts::ItemId)
                                .to(Items::Table, Items::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_user_id")
                                .from(Receipts::Table, Receipts::UserId)
                                .to(Users::Table, Users::Id),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_receipts_item_id", Receipts::ItemId),
                ("idx_receipts_user_id", Receipts::UserId),
                ("idx_receipts_status", Receipts::Status),
                ("idx_receipts_received_at", Receipts::ReceivedAt),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Receipts::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Receipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Receipts {
        Table,
        Id,
        ReceiptNo,
        ItemId,
        UserId,
        QrCode,
        Quantity,
        DefectQuantity,
        Status,
        Location,
        Notes,
        ReceivedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_defects_table {
    use super::m20240101_000003_create_receipts_table::Receipts;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_defects_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Defects::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Defects::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Defects::ReceiptId).uuid().not_null())
                        .col(ColumnDef::new(Defects::DefectType).string().not_null())
                        .col(
                            ColumnDef::new(Defects::DefectDescription)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Defects::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Defects::Severity)
                                .string_len(16)
                                .not_null()
                                .default("medium"),
                        )
                        .col(ColumnDef::new(Defects::ChecklistData).json().null())
                        .col(
                            ColumnDef::new(Defects::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_defects_receipt_id")
                                .from(Defects::Table, Defects::ReceiptId)
                                .to(Receipts::Table, Receipts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_defects_receipt_id")
                        .table(Defects::Table)
                        .col(Defects::ReceiptId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Defects::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Defects {
        Table,
        Id,
        ReceiptId,
        DefectType,
        DefectDescription,
        Quantity,
        Severity,
        ChecklistData,
        CreatedAt,
    }
}

mod m20240101_000005_create_photos_table {
    use super::m20240101_000003_create_receipts_table::Receipts;
    use super::m20240101_000004_create_defects_table::Defects;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_photos_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Photos::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Photos::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Photos::ReceiptId).uuid().not_null())
                        .col(ColumnDef::new(Photos::DefectId).uuid().null())
                        .col(ColumnDef::new(Photos::PhotoUrl).text().not_null())
                        .col(
                            ColumnDef::new(Photos::PhotoType)
                                .string_len(16)
                                .not_null()
                                .default("general"),
                        )
                        .col(ColumnDef::new(Photos::FileSize).big_integer().null())
                        .col(ColumnDef::new(Photos::MimeType).string().null())
                        .col(
                            ColumnDef::new(Photos::UploadedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_photos_receipt_id")
                                .from(Photos::Table, Photos::ReceiptId)
                                .to(Receipts::Table, Receipts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_photos_defect_id")
                                .from(Photos::Table, Photos::DefectId)
                                .to(Defects::Table, Defects::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_photos_receipt_id")
                        .table(Photos::Table)
                        .col(Photos::ReceiptId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Photos::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Photos {
        Table,
        Id,
        ReceiptId,
        DefectId,
        PhotoUrl,
        PhotoType,
        FileSize,
        MimeType,
        UploadedAt,
    }
}

mod m20240101_000006_create_receipt_sequences_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_receipt_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReceiptSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReceiptSequences::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ReceiptSequences::IssuedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReceiptSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ReceiptSequences {
        Table,
        Id,
        IssuedAt,
    }
}

mod m20240301_000007_create_product_submissions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_product_submissions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductSubmissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductSubmissions::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProductSubmissions::EmployeeId).uuid().not_null())
                        .col(ColumnDef::new(ProductSubmissions::ItemNo).string_len(64).null())
                        .col(ColumnDef::new(ProductSubmissions::ProductName).string().not_null())
                        .col(
                            ColumnDef::new(ProductSubmissions::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ProductSubmissions::Notes).text().null())
                        .col(ColumnDef::new(ProductSubmissions::PhotoUrl).text().null())
                        .col(
                            ColumnDef::new(ProductSubmissions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_product_submissions_employee_id", ProductSubmissions::EmployeeId),
                ("idx_product_submissions_created_at", ProductSubmissions::CreatedAt),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(ProductSubmissions::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductSubmissions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductSubmissions {
        Table,
        Id,
        EmployeeId,
        ItemNo,
        ProductName,
        Quantity,
        Notes,
        PhotoUrl,
        CreatedAt,
    }
}
