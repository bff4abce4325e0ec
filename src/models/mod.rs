pub mod action_plan;
pub mod assessment;
pub mod company;
pub mod entitlement;
