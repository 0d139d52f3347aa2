use utoipa::OpenApi;

use crate::types::{
    AnalyticsData, AnalyticsResponse, SendEmailRequest, SendEmailResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::server::analytics_handler,
        crate::server::send_email_handler,
    ),
    components(
        schemas(
            AnalyticsResponse,
            AnalyticsData,
            SendEmailRequest,
            SendEmailResponse
        )
    ),
    tags(
        (name = "lyxenime", description = "LyxeNime backend API endpoints")
    ),
    info(
        title = "LyxeNime API",
        version = "1.0",
        description = "Dashboard analytics readback and OTP email delivery \
            for the LyxeNime streaming site",
        license(
            name = "BSD-3-Clause"
        )
    )
)]
pub struct ApiDoc;
