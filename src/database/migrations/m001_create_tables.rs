use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Organizations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Organizations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Organizations::Name).string().not_null())
                    .col(ColumnDef::new(Organizations::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::FirstName).string().not_null())
                    .col(ColumnDef::new(Users::LastName).string().not_null())
                    .col(
                        ColumnDef::new(Users::IsSuperadmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserOrganizations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserOrganizations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserOrganizations::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(UserOrganizations::OrganizationId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserOrganizations::Role).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_organizations_user_id")
                            .from(UserOrganizations::Table, UserOrganizations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_organizations_organization_id")
                            .from(UserOrganizations::Table, UserOrganizations::OrganizationId)
                            .to(Organizations::Table, Organizations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .name("idx_user_organizations_user_org")
                            .table(UserOrganizations::Table)
                            .col(UserOrganizations::UserId)
                            .col(UserOrganizations::OrganizationId)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Campaigns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Campaigns::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Campaigns::OrganizationId).integer().not_null())
                    .col(ColumnDef::new(Campaigns::Title).string().not_null())
                    .col(
                        ColumnDef::new(Campaigns::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Campaigns::IsStarted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Campaigns::IsArchived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Campaigns::LandlinesFiltered)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Campaigns::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Campaigns::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaigns_organization_id")
                            .from(Campaigns::Table, Campaigns::OrganizationId)
                            .to(Organizations::Table, Organizations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(JobRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobRequests::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JobRequests::CampaignId).integer().not_null())
                    .col(ColumnDef::new(JobRequests::JobType).string().not_null())
                    .col(
                        ColumnDef::new(JobRequests::Status)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(JobRequests::ResultMessage)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(JobRequests::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(JobRequests::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_job_requests_campaign_id")
                            .from(JobRequests::Table, JobRequests::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_requests_campaign_type")
                    .table(JobRequests::Table)
                    .col(JobRequests::CampaignId)
                    .col(JobRequests::JobType)
                    .to_owned(),
            )
            .await?;

        // At most one unfinished job of each type per campaign
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_job_requests_one_pending \
                 ON job_requests (campaign_id, job_type) WHERE status < 100",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Campaigns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserOrganizations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Organizations::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Organizations {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
    FirstName,
    LastName,
    IsSuperadmin,
    CreatedAt,
}

#[derive(Iden)]
enum UserOrganizations {
    Table,
    Id,
    UserId,
    OrganizationId,
    Role,
}

#[derive(Iden)]
enum Campaigns {
    Table,
    Id,
    OrganizationId,
    Title,
    Description,
    IsStarted,
    IsArchived,
    LandlinesFiltered,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum JobRequests {
    Table,
    Id,
    CampaignId,
    JobType,
    Status,
    ResultMessage,
    CreatedAt,
    UpdatedAt,
}
