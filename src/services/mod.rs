pub mod auth_service;
pub mod banking_service;
pub mod reports_service;
pub mod rules_service;
pub mod subscription_service;

pub use auth_service::{AuthService, LoginRequest, RegisterRequest, User};
pub use banking_service::BankingService;
pub use reports_service::ReportsService;
pub use rules_service::RulesService;
pub use subscription_service::SubscriptionService;
