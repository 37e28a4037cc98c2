pub mod clients;
pub mod coupons;
pub mod credentials;
pub mod inference;
pub mod middleware;
pub mod notifications;
pub mod payments;
pub mod prepayments;
pub mod pricing;
pub mod quota;
pub mod rate_limit;
pub mod tokens;
pub mod users;

pub use clients::ClientService;
pub use coupons::CouponService;
pub use credentials::CredentialStore;
pub use middleware::AuthMiddlewareFactory;
pub use prepayments::PrepaymentService;
pub use quota::QuotaService;
pub use rate_limit::LoginRateLimiter;
pub use tokens::TokenService;
pub use users::UserService;
