pub mod account;
pub mod connection;
pub mod report;
pub mod rule;
pub mod subscription;
pub mod transaction;

pub use account::BankAccount;
pub use connection::{
    BankConnection, ConnectionStatusResponse, Connector, ExecutionStatus, ProviderStatus, SyncTrigger,
};
pub use report::{CategoryBreakdown, ReportQuery, ReportSummary};
pub use rule::{CategoryRule, NewRule, RuleType, RuleUpdate};
pub use subscription::{CheckoutSession, Plan, SubscriptionInfo, SubscriptionState, UsageItem, UsageLimits, UsageType};
pub use transaction::{Transaction, TransactionFilter, TransactionType, TransactionUpdate};
