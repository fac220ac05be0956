use confique::Config;

/// UMA ticket, RPT and PCT configuration
#[derive(Debug, Config, Clone)]
pub struct UmaConfig {
    /// Permission ticket lifetime in seconds (default: 3600)
    #[config(env = "AUTHZ_UMA_TICKET_LIFETIME", default = 3600)]
    pub ticket_lifetime: i64,

    /// RPT lifetime in seconds, values <= 0 fall back to 3600
    #[config(env = "AUTHZ_UMA_RPT_LIFETIME", default = 3600)]
    pub rpt_lifetime: i64,

    /// PCT lifetime in seconds, values <= 0 fall back to 3600
    #[config(env = "AUTHZ_UMA_PCT_LIFETIME", default = 3600)]
    pub pct_lifetime: i64,

    /// Base endpoint used to build claims gathering redirects
    #[config(env = "AUTHZ_UMA_BASE_ENDPOINT", default = "https://localhost/authz")]
    pub base_endpoint: String,
}

impl Default for UmaConfig {
    fn default() -> Self {
        Self {
            ticket_lifetime: 3600,
            rpt_lifetime: 3600,
            pct_lifetime: 3600,
            base_endpoint: "https://localhost/authz".to_string(),
        }
    }
}

impl UmaConfig {
    /// Endpoint requesting parties are redirected to for claims gathering
    pub fn gathering_endpoint(&self) -> String {
        format!("{}/uma/gather_claims", self.base_endpoint.trim_end_matches('/'))
    }
}
