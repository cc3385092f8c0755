use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// active | paused | ended
    pub status: String,
    #[sea_orm(column_type = "Double", nullable)]
    pub budget: Option<f64>,
    #[sea_orm(column_type = "Double")]
    pub spent: f64,
    pub end_date: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vast_campaign::Entity")]
    VastCampaign,
    #[sea_orm(has_many = "super::external_campaign::Entity")]
    ExternalCampaign,
}

impl Related<super::vast_campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VastCampaign.def()
    }
}

impl Related<super::external_campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExternalCampaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
