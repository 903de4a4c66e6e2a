//! Server profiles, currencies and the read-only catalog built at startup.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::ShopError;
use crate::models::Price;

/// A remote endpoint and the directory holding its shop documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProfile {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub base_path: String,
}

/// A currency that prices can be expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub economy: String,
}

impl Currency {
    pub fn new(id: impl Into<String>, name: Option<String>, economy: impl Into<String>) -> Self {
        let id = id.into();
        let name = name.filter(|n| !n.is_empty()).unwrap_or_else(|| id.clone());
        Self {
            id,
            name,
            economy: economy.into(),
        }
    }
}

/// Login material handed to the remote transport on connect.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Servers and currencies known to this process. Immutable once built.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    servers: Vec<ServerProfile>,
    currencies: Vec<Currency>,
}

impl Catalog {
    pub fn new(servers: Vec<ServerProfile>, currencies: Vec<Currency>) -> Self {
        Self {
            servers,
            currencies,
        }
    }

    pub fn servers(&self) -> &[ServerProfile] {
        &self.servers
    }

    pub fn currencies(&self) -> &[Currency] {
        &self.currencies
    }

    /// Looks up a server profile by id.
    pub fn server(&self, id: &str) -> Result<&ServerProfile, ShopError> {
        self.servers
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ShopError::ServerNotFound(id.to_string()))
    }

    pub fn currency(&self, id: &str) -> Option<&Currency> {
        self.currencies.iter().find(|c| c.id == id)
    }

    /// Builds a price from an editor amount and a currency id.
    ///
    /// No amount, a zero amount, an unknown currency or a currency without an
    /// economy all mean "not for sale" and yield `Ok(None)`.
    pub fn price(&self, amount: Option<f64>, currency_id: &str) -> Result<Option<Price>, ShopError> {
        let amount = match amount {
            Some(a) if a != 0.0 => a,
            _ => return Ok(None),
        };
        if !amount.is_finite() || amount < 0.0 {
            return Err(ShopError::InvalidEntry(format!(
                "price must be a non-negative number, got {}",
                amount
            )));
        }

        let currency = match self.currency(currency_id.trim()) {
            Some(c) if !c.economy.trim().is_empty() => c,
            _ => return Ok(None),
        };

        let number = if amount.fract() == 0.0 && amount <= i64::MAX as f64 {
            Number::from(amount as i64)
        } else {
            Number::from_f64(amount).ok_or_else(|| {
                ShopError::InvalidEntry(format!("price is not representable: {}", amount))
            })?
        };

        Ok(Some(Price::new(
            number,
            currency.economy.trim(),
            currency.id.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![ServerProfile {
                id: "main".into(),
                name: "Main".into(),
                host: "sftp.example.com".into(),
                port: 22,
                base_path: "/shops".into(),
            }],
            vec![
                Currency::new("gold", Some("Gold".into()), "E"),
                Currency::new("tokens", None, "  "),
            ],
        )
    }

    #[test]
    fn test_server_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.server("main").unwrap().port, 22);
        assert_eq!(
            catalog.server("other").unwrap_err(),
            ShopError::ServerNotFound("other".into())
        );
    }

    #[test]
    fn test_currency_name_defaults_to_id() {
        let currency = Currency::new("tokens", None, "E");
        assert_eq!(currency.name, "tokens");
        let currency = Currency::new("tokens", Some(String::new()), "E");
        assert_eq!(currency.name, "tokens");
    }

    #[test]
    fn test_price_integral_amount_is_integer() {
        let price = catalog().price(Some(10.0), "gold").unwrap().unwrap();
        assert_eq!(price.price, Number::from(10));
        assert_eq!(price.economy, "E");
        assert_eq!(price.currency, "gold");
    }

    #[test]
    fn test_price_fractional_amount() {
        let price = catalog().price(Some(2.5), "gold").unwrap().unwrap();
        assert_eq!(price.price.as_f64(), Some(2.5));
    }

    #[test]
    fn test_price_zero_or_missing_is_none() {
        assert!(catalog().price(None, "gold").unwrap().is_none());
        assert!(catalog().price(Some(0.0), "gold").unwrap().is_none());
    }

    #[test]
    fn test_price_unknown_currency_or_blank_economy_is_none() {
        assert!(catalog().price(Some(5.0), "silver").unwrap().is_none());
        assert!(catalog().price(Some(5.0), "tokens").unwrap().is_none());
    }

    #[test]
    fn test_price_negative_is_rejected() {
        let err = catalog().price(Some(-1.0), "gold").unwrap_err();
        assert_eq!(err.kind(), "invalid_entry");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            username: Some("deploy".into()),
            password: Some("hunter2".into()),
        };
        let out = format!("{:?}", creds);
        assert!(out.contains("deploy"));
        assert!(!out.contains("hunter2"));
    }
}
