pub mod campaigns;
pub mod job_requests;
pub mod organizations;
pub mod user_organizations;
pub mod users;
