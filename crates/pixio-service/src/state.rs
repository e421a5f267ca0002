//! Application state.

use std::sync::Arc;
use std::time::Duration;

use pixio_store::Store;

use crate::auth::TokenIssuer;
use crate::clipdrop::{ClipdropClient, ImageProvider};
use crate::config::ServiceConfig;
use crate::mail::{HttpMailer, LogMailer, Mailer};
use crate::razorpay::{PaymentGateway, RazorpayClient};
use crate::workflows::{MeteringWorkflow, OtpWorkflow, SettlementWorkflow};

/// External services the workflows call out to.
#[derive(Clone)]
pub struct Collaborators {
    /// Payment gateway (optional).
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    /// Image provider (optional).
    pub images: Option<Arc<dyn ImageProvider>>,
    /// Verification mail.
    pub mailer: Arc<dyn Mailer>,
}

impl Collaborators {
    /// Build the HTTP clients named by `config`.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        let gateway = config
            .razorpay_key_id
            .as_ref()
            .zip(config.razorpay_key_secret.as_ref())
            .and_then(|(key_id, key_secret)| {
                match RazorpayClient::new(
                    &config.razorpay_api_url,
                    key_id,
                    key_secret,
                    Duration::from_secs(config.gateway_timeout_seconds),
                ) {
                    Ok(client) => {
                        tracing::info!(razorpay_url = %config.razorpay_api_url, "Razorpay integration enabled");
                        Some(Arc::new(client) as Arc<dyn PaymentGateway>)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create Razorpay client");
                        None
                    }
                }
            });

        let images = config.clipdrop_api_key.as_ref().and_then(|key| {
            match ClipdropClient::new(
                &config.clipdrop_api_url,
                key,
                Duration::from_secs(config.provider_timeout_seconds),
            ) {
                Ok(client) => {
                    tracing::info!("ClipDrop integration enabled");
                    Some(Arc::new(client) as Arc<dyn ImageProvider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create ClipDrop client");
                    None
                }
            }
        });

        let relay = config.mail_api_url.as_ref().and_then(|url| {
            match HttpMailer::new(
                url,
                config.mail_api_key.clone(),
                Duration::from_secs(config.provider_timeout_seconds),
            ) {
                Ok(mailer) => Some(Arc::new(mailer) as Arc<dyn Mailer>),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create mail relay client");
                    None
                }
            }
        });
        let mailer = relay.unwrap_or_else(|| {
            tracing::warn!("Mail relay not configured - verification codes will be logged");
            Arc::new(LogMailer)
        });

        Self {
            gateway,
            images,
            mailer,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Session token issuer.
    pub tokens: TokenIssuer,

    /// Image provider (optional).
    pub images: Option<Arc<dyn ImageProvider>>,

    /// Credit purchases (available when the gateway is configured).
    pub settlement: Option<SettlementWorkflow>,

    /// Metered tool calls.
    pub metering: MeteringWorkflow,

    /// Email verification.
    pub otp: OtpWorkflow,
}

impl AppState {
    /// Create a new application state with clients built from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let collaborators = Collaborators::from_config(&config);
        Self::with_collaborators(store, config, collaborators)
    }

    /// Create a new application state around the given collaborators.
    #[must_use]
    pub fn with_collaborators(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators {
            gateway,
            images,
            mailer,
        } = collaborators;

        let settlement = gateway.zip(config.razorpay_key_secret.clone()).map(|(gateway, secret)| {
            SettlementWorkflow::new(
                store.clone(),
                gateway,
                config.razorpay_key_id.clone().unwrap_or_default(),
                secret,
                config.purchase_policy,
            )
        });

        if settlement.is_none() {
            tracing::warn!("Razorpay not configured - payments will not be available");
        }
        if images.is_none() {
            tracing::warn!("ClipDrop not configured - image tools will not be available");
        }

        let metering = MeteringWorkflow::new(
            store.clone(),
            Duration::from_secs(config.provider_timeout_seconds),
        );
        let otp = OtpWorkflow::new(store.clone(), mailer, config.mail_from.clone());

        Self {
            tokens: TokenIssuer::new(&config.jwt_secret),
            store,
            config,
            images,
            settlement,
            metering,
            otp,
        }
    }

    /// Check if payments are configured.
    #[must_use]
    pub fn has_payments(&self) -> bool {
        self.settlement.is_some()
    }

    /// Check if image tools are configured.
    #[must_use]
    pub fn has_images(&self) -> bool {
        self.images.is_some()
    }
}
