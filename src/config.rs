//! Gateway configuration.
//!
//! Layered with the `config` crate: defaults, then an optional JSON file,
//! then environment overrides.

use crate::domain::money::Money;
use crate::domain::payment::PaymentMethod;
use crate::error::Result;
use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, File, FileFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Whether a gateway talks to its sandbox or to production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    #[default]
    #[serde(alias = "sandbox")]
    Test,
    Live,
}

impl GatewayMode {
    /// Parse a mode; anything but `live` means test.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "live" => Self::Live,
            _ => Self::Test,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }
}

/// Settings for one payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySettings {
    pub enabled: bool,
    pub mode: GatewayMode,
    /// Upper bound on a single payment, if any.
    pub max_amount: Option<Money>,
    /// Simulated round-trip time of the provider.
    pub latency_ms: u64,
    /// Percentage of simulated charges the provider declines.
    pub decline_rate: u8,
    pub secret_key: Option<String>,
    pub public_key: Option<String>,
    pub client_id: Option<String>,
    pub secret: Option<String>,
    pub processing_time: Option<String>,
}

impl GatewaySettings {
    fn base(latency_ms: u64, decline_rate: u8) -> Self {
        Self {
            enabled: true,
            mode: GatewayMode::Test,
            max_amount: None,
            latency_ms,
            decline_rate,
            secret_key: None,
            public_key: None,
            client_id: None,
            secret: None,
            processing_time: None,
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaysConfig {
    pub credit_card: GatewaySettings,
    pub paypal: GatewaySettings,
    pub bank_transfer: GatewaySettings,
    pub cash_on_delivery: GatewaySettings,
}

impl GatewaysConfig {
    pub fn get(&self, method: PaymentMethod) -> &GatewaySettings {
        match method {
            PaymentMethod::CreditCard => &self.credit_card,
            PaymentMethod::Paypal => &self.paypal,
            PaymentMethod::BankTransfer => &self.bank_transfer,
            PaymentMethod::CashOnDelivery => &self.cash_on_delivery,
        }
    }

    pub fn get_mut(&mut self, method: PaymentMethod) -> &mut GatewaySettings {
        match method {
            PaymentMethod::CreditCard => &mut self.credit_card,
            PaymentMethod::Paypal => &mut self.paypal,
            PaymentMethod::BankTransfer => &mut self.bank_transfer,
            PaymentMethod::CashOnDelivery => &mut self.cash_on_delivery,
        }
    }
}

impl Default for GatewaysConfig {
    fn default() -> Self {
        Self {
            credit_card: GatewaySettings {
                secret_key: Some("secret".to_string()),
                public_key: Some("public".to_string()),
                ..GatewaySettings::base(500, 5)
            },
            paypal: GatewaySettings {
                client_id: Some("client_id".to_string()),
                secret: Some("secret".to_string()),
                ..GatewaySettings::base(700, 10)
            },
            bank_transfer: GatewaySettings {
                processing_time: Some("3-5 business days".to_string()),
                ..GatewaySettings::base(0, 0)
            },
            cash_on_delivery: GatewaySettings {
                max_amount: Some(Money::new(Decimal::from(5000)).unwrap_or_default()),
                ..GatewaySettings::base(0, 0)
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub default_method: PaymentMethod,
    /// Upper bound on a single gateway call before it counts as failed.
    pub gateway_timeout_ms: u64,
    /// Store declined and timed-out attempts as `failed` payments.
    pub record_failed_attempts: bool,
    pub gateways: GatewaysConfig,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            default_method: PaymentMethod::CreditCard,
            gateway_timeout_ms: 5_000,
            record_failed_attempts: false,
            gateways: GatewaysConfig::default(),
        }
    }
}

/// Environment variables and the configuration keys they override.
const ENV_OVERRIDES: [(&str, &str); 15] = [
    ("DEFAULT_PAYMENT_GATEWAY", "default_method"),
    ("GATEWAY_TIMEOUT_MS", "gateway_timeout_ms"),
    ("RECORD_FAILED_PAYMENTS", "record_failed_attempts"),
    ("STRIPE_ENABLED", "gateways.credit_card.enabled"),
    ("STRIPE_MODE", "gateways.credit_card.mode"),
    ("STRIPE_SECRET_KEY", "gateways.credit_card.secret_key"),
    ("STRIPE_PUBLIC_KEY", "gateways.credit_card.public_key"),
    ("PAYPAL_ENABLED", "gateways.paypal.enabled"),
    ("PAYPAL_MODE", "gateways.paypal.mode"),
    ("PAYPAL_CLIENT_ID", "gateways.paypal.client_id"),
    ("PAYPAL_SECRET", "gateways.paypal.secret"),
    ("BANK_TRANSFER_ENABLED", "gateways.bank_transfer.enabled"),
    ("BANK_TRANSFER_PROCESSING_TIME", "gateways.bank_transfer.processing_time"),
    ("COD_ENABLED", "gateways.cash_on_delivery.enabled"),
    ("COD_MAX_AMOUNT", "gateways.cash_on_delivery.max_amount"),
];

impl PaymentConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Json));
        }
        Self::resolve(builder, |key| std::env::var(key).ok())
    }

    /// Parses a JSON document over the defaults, so it only needs the keys
    /// it changes.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::resolve(
            Self::defaults()?.add_source(File::from_str(json, FileFormat::Json)),
            |_| None,
        )
    }

    /// Defaults with environment overrides read through `lookup`.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::resolve(Self::defaults()?, lookup)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder().add_source(Config::try_from(&Self::default())?))
    }

    fn resolve(
        mut builder: ConfigBuilder<DefaultState>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        for (env_key, key) in ENV_OVERRIDES {
            let value = lookup(env_key).map(|value| match key.rsplit('.').next() {
                // Anything but `live` means test.
                Some("mode") => GatewayMode::from_str_case_insensitive(&value)
                    .as_str()
                    .to_string(),
                _ => value.trim().to_string(),
            });
            builder = builder.set_override_option(key, value)?;
        }

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.drop_blank_credentials();
        Ok(config)
    }

    /// An empty credential is a missing one.
    fn drop_blank_credentials(&mut self) {
        for method in PaymentMethod::ALL {
            let settings = self.gateways.get_mut(method);
            for field in [
                &mut settings.secret_key,
                &mut settings.public_key,
                &mut settings.client_id,
                &mut settings.secret,
                &mut settings.processing_time,
            ] {
                if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                    *field = None;
                }
            }
        }
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}
