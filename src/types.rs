use utoipa::ToSchema;

#[derive(serde::Serialize, ToSchema)]
pub struct AnalyticsResponse {
    pub success: bool,
    pub data: AnalyticsData,
}

/// Field names match what the dashboard front end reads. GA4 reports
/// metric totals as strings and they are passed through as-is.
#[derive(serde::Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub active_users: u64,
    pub total_views: String,
    pub total_users: String,
}

#[derive(serde::Deserialize, ToSchema)]
pub struct SendEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
}

#[derive(serde::Serialize, ToSchema)]
pub struct SendEmailResponse {
    pub success: bool,
    pub otp: String,
}
