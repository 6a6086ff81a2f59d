use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const JOB_FILTER_LANDLINES: &str = "filter_landlines";
pub const JOB_UPLOAD_CONTACTS: &str = "upload_contacts";

/// Status value for jobs no runner has picked up yet
pub const STATUS_QUEUED: i32 = 0;
/// Jobs at or above this status are finished
pub const STATUS_DONE: i32 = 100;

/// A unit of background work queued against a campaign
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_requests")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub campaign_id: i32,
    pub job_type: String,
    pub status: i32,
    pub result_message: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaigns::Entity",
        from = "Column::CampaignId",
        to = "super::campaigns::Column::Id"
    )]
    Campaign,
}

impl Related<super::campaigns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Jobs no runner has finished yet
    pub fn find_pending(campaign_id: i32) -> Select<Entity> {
        Self::find()
            .filter(Column::CampaignId.eq(campaign_id))
            .filter(Column::Status.lt(STATUS_DONE))
    }
}
