//! 广告投放核心表
//!
//! zones / campaigns / 各类广告源由管理后台维护，这里只负责在空库上
//! 建出投放引擎读写所需的表结构（开发与测试用 SQLite 也走这里）。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // zones
        manager
            .create_table(
                Table::create()
                    .table(Zones::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Zones::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Zones::PublisherId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Zones::ZoneType)
                            .string_len(16)
                            .not_null()
                            .default("vast"),
                    )
                    .col(
                        ColumnDef::new(Zones::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Zones::Impressions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Zones::Clicks)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Zones::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // campaigns
        manager
            .create_table(
                Table::create()
                    .table(Campaigns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Campaigns::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Campaigns::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Campaigns::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Campaigns::Budget).double().null())
                    .col(
                        ColumnDef::new(Campaigns::Spent)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Campaigns::EndDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Campaigns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // vast_campaigns
        manager
            .create_table(
                Table::create()
                    .table(VastCampaigns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VastCampaigns::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VastCampaigns::CampaignId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VastCampaigns::VastUrl).text().not_null())
                    .col(
                        ColumnDef::new(VastCampaigns::ProviderName)
                            .string_len(100)
                            .not_null()
                            .default(""),
                    )
                    .to_owned(),
            )
            .await?;

        // external_campaigns
        manager
            .create_table(
                Table::create()
                    .table(ExternalCampaigns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExternalCampaigns::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExternalCampaigns::CampaignId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExternalCampaigns::EndpointUrl)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExternalCampaigns::EndpointType)
                            .string_len(32)
                            .not_null()
                            .default("custom"),
                    )
                    .col(
                        ColumnDef::new(ExternalCampaigns::ApiKey)
                            .string_len(255)
                            .not_null()
                            .default(""),
                    )
                    .to_owned(),
            )
            .await?;

        // ssp_configs
        manager
            .create_table(
                Table::create()
                    .table(SspConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SspConfigs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SspConfigs::PublisherId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SspConfigs::EndpointUrl).text().not_null())
                    .col(
                        ColumnDef::new(SspConfigs::ApiKey)
                            .string_len(255)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(SspConfigs::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .to_owned(),
            )
            .await?;

        // fallback_ads
        manager
            .create_table(
                Table::create()
                    .table(FallbackAds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FallbackAds::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FallbackAds::ZoneId).big_integer().not_null())
                    .col(ColumnDef::new(FallbackAds::VastUrl).text().not_null())
                    .col(
                        ColumnDef::new(FallbackAds::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FallbackAds::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .to_owned(),
            )
            .await?;

        // impressions
        manager
            .create_table(
                Table::create()
                    .table(Impressions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Impressions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Impressions::ZoneId).big_integer().not_null())
                    .col(ColumnDef::new(Impressions::CampaignId).big_integer().null())
                    .col(
                        ColumnDef::new(Impressions::ImpressionId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Impressions::EventType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Impressions::Source).string_len(16).null())
                    .col(ColumnDef::new(Impressions::UserIp).string_len(45).null())
                    .col(ColumnDef::new(Impressions::UserAgent).text().null())
                    .col(ColumnDef::new(Impressions::Referer).text().null())
                    .col(
                        ColumnDef::new(Impressions::VideoPlayerId)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Impressions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // rtb_bids
        manager
            .create_table(
                Table::create()
                    .table(RtbBids::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RtbBids::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RtbBids::ZoneId).big_integer().not_null())
                    .col(
                        ColumnDef::new(RtbBids::ExternalCampaignId)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(RtbBids::SspConfigId).big_integer().null())
                    .col(
                        ColumnDef::new(RtbBids::BidPrice)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(RtbBids::BidCurrency)
                            .string_len(3)
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(RtbBids::ResponseTimeMs)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(RtbBids::Status).string_len(16).not_null())
                    .col(ColumnDef::new(RtbBids::VastUrlResponse).text().null())
                    .col(
                        ColumnDef::new(RtbBids::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 报表查询按 zone + 时间
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_impressions_zone_created")
                    .table(Impressions::Table)
                    .col(Impressions::ZoneId)
                    .col(Impressions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_rtb_bids_zone_created")
                    .table(RtbBids::Table)
                    .col(RtbBids::ZoneId)
                    .col(RtbBids::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_fallback_ads_zone")
                    .table(FallbackAds::Table)
                    .col(FallbackAds::ZoneId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_fallback_ads_zone").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_rtb_bids_zone_created").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_impressions_zone_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(RtbBids::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Impressions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FallbackAds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SspConfigs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExternalCampaigns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VastCampaigns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Campaigns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Zones::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Zones {
    Table,
    Id,
    PublisherId,
    ZoneType,
    Status,
    Impressions,
    Clicks,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
    Name,
    Status,
    Budget,
    Spent,
    EndDate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum VastCampaigns {
    Table,
    Id,
    CampaignId,
    VastUrl,
    ProviderName,
}

#[derive(DeriveIden)]
enum ExternalCampaigns {
    Table,
    Id,
    CampaignId,
    EndpointUrl,
    EndpointType,
    ApiKey,
}

#[derive(DeriveIden)]
enum SspConfigs {
    Table,
    Id,
    PublisherId,
    EndpointUrl,
    ApiKey,
    Status,
}

#[derive(DeriveIden)]
enum FallbackAds {
    Table,
    Id,
    ZoneId,
    VastUrl,
    Priority,
    Status,
}

#[derive(DeriveIden)]
enum Impressions {
    Table,
    Id,
    ZoneId,
    CampaignId,
    ImpressionId,
    EventType,
    Source,
    UserIp,
    UserAgent,
    Referer,
    VideoPlayerId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RtbBids {
    Table,
    Id,
    ZoneId,
    ExternalCampaignId,
    SspConfigId,
    BidPrice,
    BidCurrency,
    ResponseTimeMs,
    Status,
    VastUrlResponse,
    CreatedAt,
}
