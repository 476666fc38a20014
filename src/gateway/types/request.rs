use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

/// Body of `/api/user/register` and `/api/user/login`
#[derive(Debug, Deserialize, ToSchema)]
pub struct Credentials {
    #[schema(example = "user111")]
    pub login: String,
    #[schema(example = "password111")]
    pub password: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.login.is_empty() && !self.password.is_empty()
    }
}

/// Body of `POST /api/user/balance/withdraw`
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    #[schema(example = "84410807816")]
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 751)]
    pub sum: Decimal,
}
