use crate::error::ApiError;
use crate::http::HttpClient;
use crate::models::{ReportQuery, ReportSummary};

#[derive(Debug, Clone)]
pub struct ReportsService {
    http: HttpClient,
}

impl ReportsService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn summary(&self, query: &ReportQuery) -> Result<ReportSummary, ApiError> {
        self.http.get_query("/reports/summary", query).await
    }
}
